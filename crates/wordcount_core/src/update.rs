use crate::{Effect, Lifecycle, Msg, Phase, StopReason};

/// Pure update function: applies a message to the lifecycle and returns any effects.
pub fn update(mut state: Lifecycle, msg: Msg) -> (Lifecycle, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => {
            if state.phase() == Phase::Created {
                state.set_phase(Phase::Running);
                vec![Effect::SpawnWorkers]
            } else {
                Vec::new()
            }
        }
        Msg::StopRequested if state.phase() == Phase::Created => {
            state.halt(StopReason::Requested);
            state.set_phase(Phase::Stopped);
            Vec::new()
        }
        Msg::Drained => {
            if state.phase() == Phase::Running {
                // Drained while still accepting means the workers ran out on their own.
                let reason = state
                    .stop_reason()
                    .cloned()
                    .unwrap_or(StopReason::SourceExhausted);
                state.halt(reason);
                state.set_phase(Phase::Stopped);
                vec![Effect::ReleaseResources]
            } else {
                Vec::new()
            }
        }
        msg if state.phase() == Phase::Running => {
            let Some(reason) = halt_reason(msg) else {
                return (state, Vec::new());
            };
            let mut effects = Vec::with_capacity(2);
            if reason.is_failure() {
                effects.push(Effect::ReportFailure(reason.clone()));
            }
            // Only the first halt closes intake; later failures are still reported.
            if state.is_accepting() {
                effects.push(Effect::HaltIntake);
                state.halt(reason);
            }
            effects
        }
        _ => Vec::new(),
    };

    (state, effects)
}

fn halt_reason(msg: Msg) -> Option<StopReason> {
    match msg {
        Msg::StopRequested => Some(StopReason::Requested),
        Msg::SourceExhausted => Some(StopReason::SourceExhausted),
        Msg::SourceFailed(reason) => Some(StopReason::SourceFailed(reason)),
        Msg::SinkFailed(reason) => Some(StopReason::SinkFailed(reason)),
        Msg::Start | Msg::Drained => None,
    }
}
