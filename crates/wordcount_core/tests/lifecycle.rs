use wordcount_core::{update, Effect, Lifecycle, Msg, Phase, StopReason};

fn running() -> Lifecycle {
    let (state, effects) = update(Lifecycle::new(), Msg::Start);
    assert_eq!(effects, vec![Effect::SpawnWorkers]);
    state
}

#[test]
fn starts_in_created() {
    let state = Lifecycle::new();
    assert_eq!(state.phase(), Phase::Created);
    assert!(!state.is_accepting());
}

#[test]
fn stop_request_halts_intake_then_drain_stops() {
    let (state, effects) = update(running(), Msg::StopRequested);
    assert_eq!(effects, vec![Effect::HaltIntake]);
    assert_eq!(state.phase(), Phase::Running);
    assert!(!state.is_accepting());

    let (state, effects) = update(state, Msg::Drained);
    assert_eq!(effects, vec![Effect::ReleaseResources]);
    assert_eq!(state.phase(), Phase::Stopped);
    assert_eq!(state.stop_reason(), Some(&StopReason::Requested));
}

#[test]
fn second_stop_request_is_ignored() {
    let (state, _) = update(running(), Msg::StopRequested);
    let (state, effects) = update(state, Msg::StopRequested);
    assert!(effects.is_empty());
    assert_eq!(state.stop_reason(), Some(&StopReason::Requested));
}

#[test]
fn sink_failure_reports_and_halts() {
    let (state, effects) = update(running(), Msg::SinkFailed("rejected".into()));
    assert_eq!(
        effects,
        vec![
            Effect::ReportFailure(StopReason::SinkFailed("rejected".into())),
            Effect::HaltIntake,
        ]
    );
    let (state, _) = update(state, Msg::Drained);
    assert_eq!(state.phase(), Phase::Stopped);
    assert_eq!(
        state.stop_reason(),
        Some(&StopReason::SinkFailed("rejected".into()))
    );
}

#[test]
fn failure_after_stop_is_reported_without_changing_reason() {
    let (state, _) = update(running(), Msg::StopRequested);
    let (state, effects) = update(state, Msg::SourceFailed("gone".into()));
    assert_eq!(
        effects,
        vec![Effect::ReportFailure(StopReason::SourceFailed("gone".into()))]
    );
    assert_eq!(state.stop_reason(), Some(&StopReason::Requested));
}

#[test]
fn stop_before_start_goes_straight_to_stopped() {
    let (state, effects) = update(Lifecycle::new(), Msg::StopRequested);
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Stopped);
}

#[test]
fn stopped_is_terminal() {
    let (state, _) = update(running(), Msg::SourceExhausted);
    let (state, _) = update(state, Msg::Drained);
    assert_eq!(state.phase(), Phase::Stopped);

    for msg in [Msg::Start, Msg::StopRequested, Msg::Drained, Msg::SinkFailed("x".into())] {
        let (next, effects) = update(state.clone(), msg);
        assert_eq!(next, state);
        assert!(effects.is_empty());
    }
}

#[test]
fn start_twice_spawns_once() {
    let (state, effects) = update(running(), Msg::Start);
    assert!(effects.is_empty());
    assert!(state.is_accepting());
}
