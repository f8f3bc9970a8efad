//! Transport abstraction
//!
//! The stream monitor never touches a socket directly; it talks to a
//! `Connector` that yields `Connection`s and reports lifecycle through
//! `TransportEvents`. This keeps the reconnect state machine portable and
//! fully testable with an in-memory transport.

use std::sync::Arc;

use crate::error::Result;

/// Callbacks a transport delivers to its owner
///
/// `on_open` may fire during `Connector::connect` or later from a transport
/// thread; `on_close` covers both connect failure and loss of an established
/// connection.
pub trait TransportEvents: Send + Sync {
    fn on_open(&self);
    fn on_message(&self, raw: &str);
    fn on_close(&self);
}

/// An established (or establishing) duplex channel
pub trait Connection: Send {
    /// Transmit one serialized frame
    fn send(&mut self, data: &str) -> Result<()>;
    /// Close the channel; safe to call repeatedly
    fn close(&mut self);
    /// Whether the channel is currently usable
    fn is_open(&self) -> bool;
}

/// Factory opening a fresh connection per attempt
pub trait Connector: Send + Sync {
    /// Begin connecting; lifecycle is reported through `events`. An `Err`
    /// here and a later `on_close` are both treated as a failed attempt.
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<Box<dyn Connection>>;
}
