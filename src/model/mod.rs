pub mod anomaly;
pub mod clock_event;
pub mod device;
pub mod leave_request;
pub mod personnel;
pub mod presence;
pub mod role;

/// Result of an insert guarded by a unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(u64),
    Duplicate,
}
