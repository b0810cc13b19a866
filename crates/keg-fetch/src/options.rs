use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Limits applied to the blocking parts of a fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
    pub download_timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub cancel: CancellationToken,
}

impl FetchOptions {
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = Some(timeout);
        self
    }

    /// Share a cancellation token with the caller.
    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}
