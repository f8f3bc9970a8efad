//! Streaming Module
//!
//! Reconnecting duplex streaming of metrics: outbound instrumentation is
//! serialized onto the wire, inbound metric events land in local bounded
//! buffers, and periodic aggregation broadcasts fan out to local subscribers.

mod monitor;
mod tcp;
mod transport;

pub use monitor::{StreamMonitor, StreamState};
pub use tcp::TcpConnector;
pub use transport::{Connection, Connector, TransportEvents};
