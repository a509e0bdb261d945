//! Clickrank Runtime - Sessions, counter and ranking broadcast
//!
//! Per connection the runtime:
//! 1. Registers the session for fan-out
//! 2. Starts identity resolution in the background (never awaited inline)
//! 3. Answers ranking and own-count requests to that session only
//! 4. Applies authenticated clicks to the shared counter
//! 5. Broadcasts the new counter value to every session
//! 6. Persists the value for the clicking user
//! 7. Re-queries the top-N and broadcasts it only if it changed
//! 8. Deregisters the session on disconnect

pub mod fanout;
pub mod session;
pub mod counter;
pub mod ranking;
pub mod coordinator;
pub mod runtime;

pub use fanout::*;
pub use session::*;
pub use counter::*;
pub use ranking::*;
pub use coordinator::*;
pub use runtime::*;
