//! The `registry` module tracks the client sessions that are currently
//! connected to this process and fans relayed messages out to them.

pub mod connections;
pub mod session;

pub use connections::ConnectionRegistry;
pub use session::{OUTBOUND_CAPACITY, Session, SessionId, SessionState};
