//! Portal driver capability.
//!
//! The actual page-driving machinery lives outside this crate; everything
//! here is the abstract surface the retry state machine talks to, plus the
//! error classifier that turns raw driver messages into actionable causes.

mod error;
mod traits;
mod types;

pub use error::{classify, ClassifiedError, ErrorKind, PortalError};
pub use traits::{PortalDriver, PortalSession};
pub use types::SearchOutcome;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Global counter for live portal sessions, sampled by the monitor loop.
static LIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// Record a session open. Returns the new live count.
pub fn session_opened() -> usize {
    LIVE_SESSIONS.fetch_add(1, Ordering::SeqCst) + 1
}

/// Record a session close. Returns the new live count.
pub fn session_closed() -> usize {
    LIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst) - 1
}

/// Number of currently open portal sessions.
pub fn live_session_count() -> usize {
    LIVE_SESSIONS.load(Ordering::SeqCst)
}
