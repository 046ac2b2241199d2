//! Readers-writer guard built from a mutex and a condition variable.
//!
//! Any number of readers may hold the resource at once. A writer holds the
//! guard's internal lock for its whole critical section and waits until the
//! reader count drops to zero before it proceeds.
//!
//! ```
//! use rw_guard::{ReadWriteGuard, ReaderId, WriterId};
//!
//! let guard = ReadWriteGuard::new(0u64);
//! guard.write(WriterId(0), |value| *value += 2);
//! assert_eq!(guard.read(ReaderId(0), |value| *value), 2);
//! ```

pub use caller::{ReaderId, WriterId};
pub use cancel::{CancelToken, CANCEL_POLL_INTERVAL};
pub use error::{ConfigError, GuardError, SimulationError};
pub use guard::*;

mod caller;
mod cancel;
mod error;
mod guard;
pub mod simulation;
