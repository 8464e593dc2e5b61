//! The `transport` module is responsible for network communication with
//! clients over WebSockets.
//!
//! It defines the event framing used between browsers and the server,
//! manages session open/close, and runs the accept loop that hands client
//! text to the relay controller.

pub mod lifecycle;
pub mod message;
pub mod websocket;

pub use lifecycle::SessionLifecycle;
pub use message::{ClientEvent, ServerEvent};
pub use websocket::{bind, serve};

#[cfg(test)]
mod tests;
