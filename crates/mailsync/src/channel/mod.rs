//! Push channel
//!
//! A resilient duplex connection per topic that reports server-side
//! mutations. The state machine is pure; the socket driver runs it on tokio.

mod frame;
mod socket;
mod state;

pub use frame::{PushEvent, parse_frame};
pub use socket::{PushChannel, Topic, topic_url};
pub use state::{
    CloseReason, ConnectionMachine, ConnectionState, DEFAULT_RECONNECT_DELAY, NORMAL_CLOSE,
};
