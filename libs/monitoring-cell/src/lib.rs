// Liveness and request-duration metrics for the API process.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::MonitoringState;
pub use middleware::track_request_metrics;
pub use models::{HealthResponse, RequestLabels};
pub use router::monitoring_routes;
pub use services::{HealthService, RequestMetricsService};
