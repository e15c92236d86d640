//! Health assessment for resource pools

use crate::metrics::PoolMetrics;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourcePool};
///
/// let config = PoolConfiguration::new().with_min_size(3).with_max_size(5);
/// let pool = ResourcePool::with_config(0u32, |t: &u32| *t, |_: &u32| {}, config).unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_objects, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    pub available_objects: usize,

    pub active_objects: usize,

    pub max_size: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Assess a metrics snapshot
    ///
    /// A pool is unhealthy while it is saturated or once it has refused an
    /// acquire. Running below the prewarm level and unknown releases only
    /// produce warnings.
    pub fn from_metrics(metrics: &PoolMetrics) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if metrics.max_size > 0 && metrics.active_count >= metrics.max_size {
            warnings.push(format!(
                "Pool saturated: {} of {} objects active",
                metrics.active_count, metrics.max_size
            ));
            is_healthy = false;
        }

        if metrics.capacity_rejections > 0 {
            warnings.push(format!(
                "{} acquire(s) rejected at capacity",
                metrics.capacity_rejections
            ));
            is_healthy = false;
        }

        if metrics.available_count + metrics.active_count < metrics.min_size {
            warnings.push(format!(
                "Pool holds {} objects, below minimum of {}",
                metrics.available_count + metrics.active_count,
                metrics.min_size
            ));
        }

        if metrics.unknown_releases > 0 {
            warnings.push(format!(
                "{} release(s) of objects that were not active",
                metrics.unknown_releases
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization: metrics.utilization,
            available_objects: metrics.available_count,
            active_objects: metrics.active_count,
            max_size: metrics.max_size,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(active: usize, available: usize) -> PoolMetrics {
        PoolMetrics {
            active_count: active,
            available_count: available,
            peak_active: active,
            min_size: 2,
            max_size: 4,
            total_acquired: active,
            total_released: 0,
            total_created: active + available,
            total_disposed: 0,
            capacity_rejections: 0,
            unknown_releases: 0,
            utilization: active as f64 / 4.0,
        }
    }

    #[test]
    fn test_idle_pool_is_healthy() {
        let status = HealthStatus::from_metrics(&metrics(0, 2));
        assert!(status.is_healthy());
        assert_eq!(status.warning_count, 0);
    }

    #[test]
    fn test_saturated_pool_is_unhealthy() {
        let status = HealthStatus::from_metrics(&metrics(4, 0));
        assert!(!status.is_healthy());
        assert_eq!(status.warning_count, 1);
    }

    #[test]
    fn test_rejections_and_unknown_releases() {
        let mut snapshot = metrics(1, 1);
        snapshot.capacity_rejections = 2;
        snapshot.unknown_releases = 1;

        let status = HealthStatus::from_metrics(&snapshot);
        assert!(!status.is_healthy());
        assert_eq!(status.warnings.len(), 2);
    }

    #[test]
    fn test_drained_pool_warns_but_stays_healthy() {
        let status = HealthStatus::from_metrics(&metrics(0, 0));
        assert!(status.is_healthy());
        assert!(status.warnings[0].contains("below minimum"));
    }
}
