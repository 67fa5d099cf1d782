use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure classes reported by a NetBox store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("NetBox unreachable: {0}")]
    Connectivity(String),

    #[error("NetBox rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed data: {0}")]
    MalformedInput(String),

    #[error("unexpected NetBox error: {0}")]
    Unexpected(String),
}

impl StoreError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        StoreError::Rejected {
            status,
            body: body.into(),
        }
    }

    /// Short label used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Connectivity(_) => "Connectivity",
            StoreError::Rejected { .. } => "Rejected",
            StoreError::MalformedInput(_) => "MalformedInput",
            StoreError::Unexpected(_) => "Unexpected",
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, StoreError::Rejected { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            StoreError::Connectivity(e.to_string())
        } else if e.is_decode() {
            StoreError::MalformedInput(e.to_string())
        } else if let Some(status) = e.status() {
            if status.is_client_error() {
                StoreError::rejected(status.as_u16(), e.to_string())
            } else {
                StoreError::Unexpected(e.to_string())
            }
        } else {
            StoreError::Unexpected(e.to_string())
        }
    }
}
