use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Stage};

/// Lifecycle of one installation. `Done` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Pending,
    Fetching,
    Extracting,
    Planning,
    Rewriting,
    Finalizing,
    Done,
    Failed { stage: Stage, reason: String },
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Fetching => Some(1),
            Self::Extracting => Some(2),
            Self::Planning => Some(3),
            Self::Rewriting => Some(4),
            Self::Finalizing => Some(5),
            Self::Done => Some(6),
            Self::Failed { .. } => None,
        }
    }

    /// Forward by exactly one step, or into `Failed` from any non-terminal state.
    pub fn can_transition_to(&self, next: &InstallState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (_, None) => true,
            (Some(from), Some(to)) => to == from + 1,
            (None, Some(_)) => false,
        }
    }
}

impl From<Stage> for InstallState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Pending => Self::Pending,
            Stage::Fetching => Self::Fetching,
            Stage::Extracting => Self::Extracting,
            Stage::Planning => Self::Planning,
            Stage::Rewriting => Self::Rewriting,
            Stage::Finalizing => Self::Finalizing,
        }
    }
}

/// Tracks the state of one installation and every state it passed through.
#[derive(Debug)]
pub(crate) struct StateMachine {
    package: String,
    history: Vec<InstallState>,
}

impl StateMachine {
    pub(crate) fn new(package: &str) -> Self {
        Self {
            package: package.to_owned(),
            history: vec![InstallState::Pending],
        }
    }

    pub(crate) fn current(&self) -> &InstallState {
        self.history.last().unwrap_or(&InstallState::Pending)
    }

    fn transition(&mut self, next: InstallState) {
        debug_assert!(
            self.current().can_transition_to(&next),
            "illegal transition {:?} -> {next:?}",
            self.current()
        );
        tracing::info!(package = %self.package, state = ?next, "install state");
        self.history.push(next);
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        self.transition(stage.into());
    }

    pub(crate) fn finish(&mut self) {
        self.transition(InstallState::Done);
    }

    pub(crate) fn fail(&mut self, error: &InstallError) {
        let reason = error_chain(error);
        tracing::error!(package = %self.package, stage = %error.stage(), %reason, "install failed");
        self.transition(InstallState::Failed {
            stage: error.stage(),
            reason,
        });
    }

    pub(crate) fn into_history(self) -> Vec<InstallState> {
        self.history
    }
}

/// `error: cause: cause` on one line.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
