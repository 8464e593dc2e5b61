//! The `relay` module joins the broker gateway to the connection registry.
//!
//! Client text becomes a timestamped `Message` that is published to the
//! exchange; it reaches local sessions only when the exchange delivers it
//! back, so every process sharing the exchange shows the same message.

pub mod clock;
pub mod controller;
pub mod message;

pub use controller::RelayController;
pub use message::Message;
