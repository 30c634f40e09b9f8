//! ## delayed-telemetry::metrics
//! **Prometheus counters for timer lifecycle transitions**

use prometheus::{IntCounter, Registry};

use crate::TelemetryError;

/// Lifecycle counters shared by every handle that carries a clone of it.
#[derive(Debug, Clone)]
pub struct TimerMetrics {
    pub registry: Registry,
    /// Successful schedules (`call` and every `reset*`).
    pub armed: IntCounter,
    /// Callbacks dispatched after their delay elapsed.
    pub fired: IntCounter,
    /// Pending firings stopped by `cancel` or a re-arm.
    pub cancelled: IntCounter,
    /// Schedules refused with an invalid delay or callback.
    pub rejected: IntCounter,
}

impl TimerMetrics {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let armed = IntCounter::new("delayed_armed_total", "Timers armed")?;
        let fired = IntCounter::new("delayed_fired_total", "Callbacks fired")?;
        let cancelled = IntCounter::new("delayed_cancelled_total", "Pending timers stopped")?;
        let rejected = IntCounter::new("delayed_rejected_total", "Invalid schedules refused")?;

        for counter in [&armed, &fired, &cancelled, &rejected] {
            registry.register(Box::new(counter.clone()))?;
        }

        Ok(Self {
            registry,
            armed,
            fired,
            cancelled,
            rejected,
        })
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn gather_metrics(&self) -> Result<String, TelemetryError> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
