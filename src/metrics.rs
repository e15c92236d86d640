//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "metrics")]
use serde::{Deserialize, Serialize};

/// Point-in-time metrics for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{ExecutionContext, PoolConfiguration, ResourcePool};
///
/// # #[tokio::main]
/// # async fn main() {
/// let config = PoolConfiguration::new().with_min_size(2).with_max_size(4);
/// let pool = ResourcePool::with_config(0u32, |t: &u32| *t, |_: &u32| {}, config).unwrap();
/// let ctx = ExecutionContext::new();
///
/// let _obj = pool.acquire(&ctx).await.unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.active_count, 1);
/// assert_eq!(metrics.available_count, 1);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "metrics", derive(Serialize, Deserialize))]
pub struct PoolMetrics {
    /// Objects currently checked out
    pub active_count: usize,

    /// Objects ready for reuse
    pub available_count: usize,

    /// Highest `active_count` observed since creation
    pub peak_active: usize,

    pub min_size: usize,

    pub max_size: usize,

    pub total_acquired: usize,

    pub total_released: usize,

    /// Objects produced by the factory, prewarm included
    pub total_created: usize,

    /// Objects discarded at capacity or by draining
    pub total_disposed: usize,

    /// Acquires refused with `MaxPoolSizeExceeded`
    pub capacity_rejections: usize,

    /// Releases of objects that were not active
    pub unknown_releases: usize,

    /// `active_count / max_size` (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("active_count".to_string(), self.active_count.to_string());
        metrics.insert("available_count".to_string(), self.available_count.to_string());
        metrics.insert("peak_active".to_string(), self.peak_active.to_string());
        metrics.insert("min_size".to_string(), self.min_size.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_disposed".to_string(), self.total_disposed.to_string());
        metrics.insert("capacity_rejections".to_string(), self.capacity_rejections.to_string());
        metrics.insert("unknown_releases".to_string(), self.unknown_releases.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// let config = PoolConfiguration::new().with_min_size(1).with_max_size(2);
    /// let pool = ResourcePool::with_config(0u8, |t: &u8| *t, |_: &u8| {}, config).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags));
    /// assert!(output.contains("resourcepool_objects_available"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        match Self::encode(metrics, pool_name, tags) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(pool = pool_name, error = %err, "failed to encode pool metrics");
                String::new()
            }
        }
    }

    #[cfg(feature = "metrics")]
    fn encode(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let labels = Self::labels(pool_name, tags);
        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("resourcepool_objects_active", "Current active objects", metrics.active_count),
            ("resourcepool_objects_available", "Current available objects", metrics.available_count),
            ("resourcepool_objects_peak_active", "Highest number of simultaneously active objects", metrics.peak_active),
            ("resourcepool_max_size", "Configured maximum pool size", metrics.max_size),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(|e| e.to_string())?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(|e| e.to_string())?;
        }

        let utilization = Gauge::with_opts(opts("resourcepool_utilization", "Pool utilization ratio"))
            .map_err(|e| e.to_string())?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(|e| e.to_string())?;

        let counters = [
            ("resourcepool_objects_acquired_total", "Total objects acquired", metrics.total_acquired),
            ("resourcepool_objects_released_total", "Total objects released", metrics.total_released),
            ("resourcepool_objects_created_total", "Total objects created by the factory", metrics.total_created),
            ("resourcepool_objects_disposed_total", "Total objects disposed", metrics.total_disposed),
            ("resourcepool_capacity_rejections_total", "Acquires refused at capacity", metrics.capacity_rejections),
            ("resourcepool_unknown_releases_total", "Releases of objects that were not active", metrics.unknown_releases),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(|e| e.to_string())?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(|e| e.to_string())?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buffer).map_err(|e| e.to_string())
    }

    #[cfg(not(feature = "metrics"))]
    fn encode(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, String> {
        let labels = Self::labels(pool_name, tags)
            .into_iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, value))
            .collect::<Vec<_>>()
            .join(",");

        let series = [
            ("resourcepool_objects_active", "gauge", metrics.active_count.to_string()),
            ("resourcepool_objects_available", "gauge", metrics.available_count.to_string()),
            ("resourcepool_objects_peak_active", "gauge", metrics.peak_active.to_string()),
            ("resourcepool_max_size", "gauge", metrics.max_size.to_string()),
            ("resourcepool_utilization", "gauge", format!("{:.2}", metrics.utilization)),
            ("resourcepool_objects_acquired_total", "counter", metrics.total_acquired.to_string()),
            ("resourcepool_objects_released_total", "counter", metrics.total_released.to_string()),
            ("resourcepool_objects_created_total", "counter", metrics.total_created.to_string()),
            ("resourcepool_objects_disposed_total", "counter", metrics.total_disposed.to_string()),
            ("resourcepool_capacity_rejections_total", "counter", metrics.capacity_rejections.to_string()),
            ("resourcepool_unknown_releases_total", "counter", metrics.unknown_releases.to_string()),
        ];

        let mut output = String::new();
        for (name, kind, value) in series {
            output.push_str(&format!("# TYPE {} {}\n", name, kind));
            output.push_str(&format!("{}{{{}}} {}\n", name, labels, value));
        }
        Ok(output)
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

/// Internal counters for pool events
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_disposed: AtomicUsize,
    pub capacity_rejections: AtomicUsize,
    pub unknown_releases: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(
        &self,
        active: usize,
        available: usize,
        peak_active: usize,
        min_size: usize,
        max_size: usize,
    ) -> PoolMetrics {
        let utilization = if max_size > 0 {
            active as f64 / max_size as f64
        } else {
            0.0
        };

        PoolMetrics {
            active_count: active,
            available_count: available,
            peak_active,
            min_size,
            max_size,
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_disposed: self.total_disposed.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            unknown_releases: self.unknown_releases.load(Ordering::Relaxed),
            utilization,
        }
    }
}
