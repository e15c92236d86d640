// EsoxSolutions.ResourcePool
// Bounded resource pool with cascade release and acquire/release events

// This is just a binary wrapper - the actual library is in lib.rs
// Run the demo with: cargo run --example basic

use esox_resourcepool::{ExecutionContext, PoolConfiguration, ResourcePool};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

type Buffer = Mutex<Vec<u8>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("Run: cargo run --example basic");
    println!();

    let pool = match ResourcePool::with_config(
        Mutex::new(Vec::with_capacity(1024)),
        |template: &Buffer| Mutex::new(Vec::with_capacity(template.lock().capacity())),
        |buffer: &Buffer| buffer.lock().clear(),
        PoolConfiguration::new().with_min_size(2).with_max_size(4).with_name("demo"),
    ) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Failed to create pool: {}", e);
            return;
        }
    };

    let ctx = ExecutionContext::new();
    match pool.acquire(&ctx).await {
        Ok(buffer) => {
            buffer.lock().extend_from_slice(b"demo payload");
            println!("  Got buffer {} holding {} bytes", buffer.id(), buffer.lock().len());
            if let Err(e) = pool.release(&ctx, &buffer).await {
                eprintln!("  Release failed: {}", e);
            }
            println!("  Buffer cleared on release: {}", buffer.lock().is_empty());
        }
        Err(e) => eprintln!("  Acquire failed: {}", e),
    }

    println!("  Available after release: {}", pool.available_count());
}
