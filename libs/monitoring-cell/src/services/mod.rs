pub mod health;
pub mod metrics;

pub use health::HealthService;
pub use metrics::RequestMetricsService;
