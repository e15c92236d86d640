//! Basic usage examples for ResourcePool

use esox_resourcepool::{ExecutionContext, PoolConfiguration, PoolError, ResourcePool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

type Buffer = Mutex<Vec<u8>>;

fn buffer_pool(min_size: usize, max_size: usize) -> ResourcePool<Buffer> {
    ResourcePool::with_config(
        Mutex::new(Vec::with_capacity(256)),
        |template: &Buffer| Mutex::new(Vec::with_capacity(template.lock().capacity())),
        |buffer: &Buffer| buffer.lock().clear(),
        PoolConfiguration::new()
            .with_min_size(min_size)
            .with_max_size(max_size)
            .with_name("buffers"),
    )
    .unwrap()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Acquire and release
    simple_pool().await;

    // Example 2: Capacity limits
    capacity().await;

    // Example 3: Events
    events().await;

    // Example 4: Cascade release
    cascade().await;

    // Example 5: Metrics and health
    metrics_and_health().await;
}

async fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = buffer_pool(2, 4);
    let ctx = ExecutionContext::new();

    let buffer = pool.acquire(&ctx).await.unwrap();
    buffer.lock().extend_from_slice(b"hello");
    println!("   Got buffer {} holding {} bytes", buffer.id(), buffer.lock().len());

    pool.release(&ctx, &buffer).await.unwrap();
    println!("   Available after release: {}\n", pool.available_count());
}

async fn capacity() {
    println!("2. Capacity:");
    let pool = buffer_pool(0, 2);
    let ctx = ExecutionContext::new();

    let _a = pool.acquire(&ctx).await.unwrap();
    let _b = pool.acquire(&ctx).await.unwrap();

    match pool.acquire(&ctx).await {
        Err(PoolError::MaxPoolSizeExceeded { max_size }) => {
            println!("   Third acquire refused: limit is {}", max_size)
        }
        other => println!("   Unexpected: {:?}", other.map(|b| b.id())),
    }
    println!();
}

async fn events() {
    println!("3. Events:");
    let pool = buffer_pool(1, 4);
    let ctx = ExecutionContext::new();

    let subscription = pool.acquired().subscribe(|buffer| {
        println!("   acquired {}", buffer.id());
    });
    let throttled = pool.released().throttle(Duration::from_millis(100));
    let _released = throttled.subscribe(|buffer| {
        println!("   released {} (throttled)", buffer.id());
    });

    for _ in 0..3 {
        let buffer = pool.acquire(&ctx).await.unwrap();
        pool.release(&ctx, &buffer).await.unwrap();
    }

    subscription.dispose();
    let next = pool.acquired().wait_for_next();
    let buffer = pool.acquire(&ctx).await.unwrap();
    if let Some(seen) = next.await {
        println!("   wait_for_next saw {}", seen.id());
    }
    pool.release(&ctx, &buffer).await.unwrap();
    println!();
}

async fn cascade() {
    println!("4. Cascade Release:");
    let sessions = buffer_pool(1, 4);
    let rows = Arc::new(buffer_pool(0, 8));
    let ctx = ExecutionContext::new();

    let session = sessions.acquire(&ctx).await.unwrap();
    sessions.register_child(&session, rows.clone());

    for _ in 0..3 {
        rows.acquire(&ctx).await.unwrap();
    }
    println!("   Rows active before: {}", rows.active_count());

    sessions.release(&ctx, &session).await.unwrap();
    println!("   Rows active after:  {}\n", rows.active_count());
}

async fn metrics_and_health() {
    println!("5. Metrics and Health:");
    let pool = buffer_pool(2, 4);
    let ctx = ExecutionContext::new();

    let _a = pool.acquire(&ctx).await.unwrap();
    let _b = pool.acquire(&ctx).await.unwrap();

    let health = pool.get_health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Utilization: {:.1}%", health.utilization * 100.0);
    println!("   Active: {}, Available: {}", health.active_objects, health.available_objects);

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
