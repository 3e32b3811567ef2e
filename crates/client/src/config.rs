use std::time::Duration;

/// Default interval between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Where and as whom the client talks to the API.
///
/// The `cirrus` binary fills this from flags or `CIRRUS_*` environment
/// variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:3000`.
    pub api_url: String,
    /// JWT access token sent as `Authorization: Bearer`.
    pub token: String,
    pub poll_interval: Duration,
    /// Give up after this many status queries. `None` polls until terminal.
    pub max_polls: Option<u32>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}
