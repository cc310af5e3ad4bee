//! Application context shared by all route handlers via Axum state.

use std::sync::Arc;

use br_core::config::Config;
use br_player::Player;
use metrics_exporter_prometheus::PrometheusHandle;

/// Cheaply cloneable: it only holds `Arc`s and a metrics handle.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    pub player: Arc<Player>,
    /// Renders `/metrics`; `None` when no recorder could be installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppContext {
    pub fn new(config: Config, player: Player, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            config: Arc::new(config),
            player: Arc::new(player),
            metrics,
        }
    }
}
