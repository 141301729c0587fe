use std::time::Instant;

use crate::models::HealthResponse;

/// Process liveness. Answers "ok" for as long as the process can serve a
/// request; store reachability is not part of it.
#[derive(Debug)]
pub struct HealthService {
    start_time: Instant,
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthService {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn check(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}
