use crate::StopReason;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SpawnWorkers,
    /// Stop reading new records; the record in flight still completes.
    HaltIntake,
    ReportFailure(StopReason),
    ReleaseResources,
}
