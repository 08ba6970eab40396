//! Prometheus metrics for the request lifecycle.
//!
//! The controller always reports attempts through the `metrics` facade
//! (`clubdesk_transition_attempts_total`). This module adds a self-contained Prometheus
//! registry for deployments that scrape one directly:
//! - **Counters**: committed transitions by role and target status, rejected attempts by role
//!   and reason
//!
//! Labels are low-cardinality: roles, status names and error kinds.

#[cfg(feature = "metrics")]
use prometheus::{CounterVec, Opts, Registry};

#[cfg(feature = "metrics")]
use crate::error::Result;

/// Prometheus metrics registry for the lifecycle controller.
#[cfg(feature = "metrics")]
#[derive(Clone)]
pub struct LifecycleMetrics {
    registry: Registry,

    transitions_total: CounterVec,
    rejections_total: CounterVec,
}

#[cfg(feature = "metrics")]
impl LifecycleMetrics {
    /// Create a new LifecycleMetrics instance with the given registry.
    ///
    /// # Errors
    ///
    /// Returns an error if metrics fail to register (e.g., duplicate registration).
    pub fn new(registry: Registry) -> Result<Self> {
        let transitions_total = CounterVec::new(
            Opts::new(
                "clubdesk_transitions_total",
                "Total number of committed request transitions",
            ),
            &["role", "to"],
        )
        .map_err(|e| anyhow::anyhow!("Failed to create transitions_total counter: {}", e))?;

        let rejections_total = CounterVec::new(
            Opts::new(
                "clubdesk_transition_rejections_total",
                "Total number of transition attempts that were not committed, by reason",
            ),
            &["role", "reason"],
        )
        .map_err(|e| anyhow::anyhow!("Failed to create rejections_total counter: {}", e))?;

        registry
            .register(Box::new(transitions_total.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to register transitions_total: {}", e))?;
        registry
            .register(Box::new(rejections_total.clone()))
            .map_err(|e| anyhow::anyhow!("Failed to register rejections_total: {}", e))?;

        Ok(Self {
            registry,
            transitions_total,
            rejections_total,
        })
    }

    /// Get the underlying Prometheus registry.
    ///
    /// Useful for exporting metrics via HTTP endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, role: &str, to: &str) {
        self.transitions_total.with_label_values(&[role, to]).inc();
    }

    /// The reason should be an error kind such as "conflict" or "illegal_transition".
    pub fn record_rejection(&self, role: &str, reason: &str) {
        self.rejections_total.with_label_values(&[role, reason]).inc();
    }
}
