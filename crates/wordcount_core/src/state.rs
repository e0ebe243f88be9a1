#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Stop was requested by the embedder or a termination signal.
    Requested,
    /// The source reported that no further records will arrive.
    SourceExhausted,
    SourceFailed(String),
    SinkFailed(String),
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::SourceFailed(_) | StopReason::SinkFailed(_))
    }
}

/// Pipeline lifecycle: `Created -> Running -> Stopped`, never back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lifecycle {
    phase: Phase,
    stop_reason: Option<StopReason>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Why intake was halted, once it has been.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// True while running with intake still open.
    pub fn is_accepting(&self) -> bool {
        self.phase == Phase::Running && self.stop_reason.is_none()
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn halt(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }
}
