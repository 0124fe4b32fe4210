//! Attendance and leave bookkeeping.
//!
//! Every operation takes its store explicitly; nothing here reaches for a global pool.

pub mod aggregator;
pub mod anomaly;
pub mod clock;
pub mod device;
pub mod importer;
pub mod leave;
pub mod mapping;
pub mod policy;
pub mod terminal;
