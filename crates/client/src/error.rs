/// Errors raised by the HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error envelope.
    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Whether the server rejected the submission before queueing it, so a
    /// retry without changes is reasonable.
    pub fn is_enqueue_failure(&self) -> bool {
        matches!(self, ClientError::Api { code, .. } if code == "ENQUEUE_FAILED")
    }

    /// Whether the server gave a definitive answer that asking again will
    /// not change: any 4xx except 408 and 429.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClientError::Api { status, .. }
                if (400..500).contains(status) && *status != 408 && *status != 429
        )
    }
}
