/// Internal session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    RequestingCapture,
    OpeningChannel,
    Running,
    Finishing,
    FinishingEarly,
    Finished,
    Error,
    Canceled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Finished | SessionState::Error | SessionState::Canceled
        )
    }
}

/// Coarser user-facing view of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicState {
    Init,
    Starting,
    Running,
    Finishing,
    Finished,
    Error,
    Canceled,
}

impl From<SessionState> for PublicState {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Init => PublicState::Init,
            SessionState::RequestingCapture | SessionState::OpeningChannel => PublicState::Starting,
            SessionState::Running => PublicState::Running,
            SessionState::Finishing | SessionState::FinishingEarly => PublicState::Finishing,
            SessionState::Finished => PublicState::Finished,
            SessionState::Error => PublicState::Error,
            SessionState::Canceled => PublicState::Canceled,
        }
    }
}
