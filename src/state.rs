//! # Application State Management
//!
//! Shared state handed to every HTTP handler and live session: the loaded
//! configuration, the persistence store, the process-wide service clients,
//! and the gateway metrics counters.
//!
//! All mutable pieces sit behind `Arc<RwLock<...>>` so concurrent handlers
//! and pipeline tasks can read without blocking each other while updates
//! stay exclusive.

use crate::config::AppConfig;
use crate::db::Store;
use crate::services::ServiceClients;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// The shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, read-mostly.
    config: Arc<RwLock<AppConfig>>,

    /// Gateway counters, updated by middleware and pipeline tasks.
    metrics: Arc<RwLock<GatewayMetrics>>,

    /// Persistence handle; cheap to clone into background tasks.
    store: Store,

    /// Pooled clients for the backing analysis services.
    services: Arc<ServiceClients>,

    /// When the server started.
    start_time: Instant,
}

/// Counters describing what the gateway has done since it started.
#[derive(Debug, Default, Clone)]
pub struct GatewayMetrics {
    /// Total number of HTTP requests processed.
    pub request_count: u64,

    /// Total number of failed HTTP requests.
    pub error_count: u64,

    /// Live sessions currently connected.
    pub active_sessions: u32,

    /// Live sessions accepted since start.
    pub sessions_started: u64,

    /// Utterances handed to the analysis fan-out.
    pub utterances_dispatched: u64,

    /// Enriched segments successfully persisted.
    pub segments_persisted: u64,

    /// Live-analysis messages delivered to clients.
    pub live_messages_sent: u64,

    /// Per-endpoint request statistics, keyed by "METHOD /path".
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Request statistics for a single endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl AppState {
    pub fn new(config: AppConfig, store: Store, services: ServiceClients) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(GatewayMetrics::default())),
            store,
            services: Arc::new(services),
            start_time: Instant::now(),
        }
    }

    /// Snapshot of the current configuration. Cloning releases the lock
    /// immediately so readers never block each other.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn services(&self) -> &ServiceClients {
        &self.services
    }

    pub fn increment_request_count(&self) {
        self.metrics.write().unwrap().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics.write().unwrap().error_count += 1;
    }

    /// Record one finished request against its endpoint's statistics.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A live session was accepted.
    pub fn session_started(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
        metrics.sessions_started += 1;
    }

    /// A live session closed and released its resources.
    pub fn session_finished(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    pub fn record_dispatch(&self) {
        self.metrics.write().unwrap().utterances_dispatched += 1;
    }

    pub fn record_segment_persisted(&self) {
        self.metrics.write().unwrap().segments_persisted += 1;
    }

    pub fn record_live_message(&self) {
        self.metrics.write().unwrap().live_messages_sent += 1;
    }

    /// Consistent copy of the metrics for serialization.
    pub fn get_metrics_snapshot(&self) -> GatewayMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        let config = AppConfig::default();
        let path = std::env::temp_dir()
            .join(format!("voice-gateway-test-{}.sqlite", uuid::Uuid::new_v4().simple()));
        let store = Store::new(path).unwrap();
        let services = ServiceClients::from_config(&config.services).unwrap();
        AppState::new(config, store, services)
    }

    #[test]
    fn session_counters_track_start_and_finish() {
        let state = test_state();
        state.session_started();
        state.session_started();
        state.session_finished();

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.sessions_started, 2);
        assert_eq!(metrics.active_sessions, 1);

        // Finishing below zero is clamped rather than underflowing.
        state.session_finished();
        state.session_finished();
        assert_eq!(state.get_metrics_snapshot().active_sessions, 0);
    }

    #[test]
    fn endpoint_metrics_accumulate() {
        let state = test_state();
        state.record_endpoint_request("GET /api/records", 12, false);
        state.record_endpoint_request("GET /api/records", 30, true);

        let metrics = state.get_metrics_snapshot();
        let endpoint = &metrics.endpoint_metrics["GET /api/records"];
        assert_eq!(endpoint.request_count, 2);
        assert_eq!(endpoint.error_count, 1);
        assert_eq!(endpoint.average_duration_ms(), 21.0);
        assert_eq!(endpoint.error_rate(), 0.5);
    }
}
