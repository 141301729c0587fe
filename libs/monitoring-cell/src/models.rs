use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}

/// Label set of one `http_request_duration_seconds` series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestLabels {
    pub method: String,
    /// The matched route template, e.g. `/consultations/{consultation_id}`.
    pub route: String,
    pub status_code: u16,
}
