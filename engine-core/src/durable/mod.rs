//! Durable persistence: an ordered key/value log, the dispatcher that
//! routes store save-callbacks into it, and startup recovery (spec §4.13,
//! §4.14).

pub mod dispatcher;
pub mod log;
pub mod recovery;

pub use dispatcher::{Record, RecordDispatcher};
pub use log::{DurableLog, LoadStats, SledLog};
pub use recovery::{open_and_recover, recover, RecoveryReport};
