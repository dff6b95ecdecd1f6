//! kba-runtime
//!
//! Long-running and one-shot drivers on top of the import path:
//!
//! - [`StreamMonitor`]: per-stream real-time workers with retry and status
//! - [`backfill`]: historical load of one stream
//! - [`ProcessLock`]: PID-file advisory lock keeping two pipelines apart
//! - [`settings`]: typed config -> runtime policies, shared by the binaries

mod backfill;
pub mod lock;
mod monitor;
pub mod settings;
mod status;

pub use backfill::{backfill, BackfillReport, BackfillRequest};
pub use lock::{LockError, LockGuard, ProcessLock};
pub use monitor::{MonitorConfig, MonitorError, RetryPolicy, StreamMonitor};
pub use status::{ErrorEntry, MonitorStatus, StatusSnapshot, ERROR_RING_CAPACITY};
