use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// How the extractor treats entries.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub strip_components: usize,
    /// Keep the archive's mode bits (unix only); otherwise files get 0o644.
    pub preserve_permissions: bool,
    /// Checked between entries and while large entries are copied.
    pub cancel: Option<CancellationToken>,
    /// Wall-clock limit for one extraction.
    pub timeout: Option<Duration>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            strip_components: 0,
            preserve_permissions: true,
            cancel: None,
            timeout: None,
        }
    }
}

impl ExtractOptions {
    pub fn strip_components(mut self, n: usize) -> Self {
        self.strip_components = n;
        self
    }

    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    pub fn cancel_with(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn interrupt(&self) -> Interrupt {
        Interrupt {
            cancel: self.cancel.clone(),
            deadline: self.timeout.map(|limit| (Instant::now() + limit, limit)),
        }
    }
}

/// Cancellation and deadline state for one running extraction.
pub(crate) struct Interrupt {
    cancel: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl Interrupt {
    pub(crate) fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some((deadline, limit)) if Instant::now() >= deadline => Err(Error::TimedOut(limit)),
            _ => Ok(()),
        }
    }
}
