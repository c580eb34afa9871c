// Session module
// Bounded, concurrently accessed conversation history keyed by hashed id

mod clock;
mod record;
mod store;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use record::{SessionRecord, SessionSummary, Turn};
pub use store::{SessionConfig, SessionHandle, SessionStore};
