//! # RelayChat
//!
//! `relaychat` relays short chat messages between WebSocket clients through
//! a fanout exchange on an AMQP broker, so any number of server processes
//! can share one chat stream.
//!
//! ## Core Modules
//!
//! - `gateway`: connection to the exchange; publish and receive.
//! - `registry`: the sessions connected to this process.
//! - `relay`: the message model and the controller that joins the two.
//! - `transport`: the WebSocket server and session lifecycle.
//! - `config`: settings loading.
//! - `app`: startup ordering and shutdown.
//! - `utils`: error types and logging.
//!
//! A client's message is never shown locally straight away. It is
//! published, and every process, including the sender's, displays it when
//! the exchange delivers it back.

pub mod app;
pub mod config;
pub mod gateway;
pub mod registry;
pub mod relay;
pub mod transport;
pub mod utils;
