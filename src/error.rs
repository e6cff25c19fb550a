use thiserror::Error;

/// Failures callers are expected to tell apart. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("unknown teams: {}", .0.join(", "))]
    UnknownTeam(Vec<String>),
    #[error("{0} data is unavailable; run an extract first")]
    NoData(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("upstream returned no data: {0}")]
    Upstream(String),
}

impl PredictError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::UnknownTeam(_) | PredictError::InvalidRequest(_)
        )
    }
}
