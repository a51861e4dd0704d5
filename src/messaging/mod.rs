pub mod client;
pub mod config;
pub mod destinations;
pub mod events;
pub mod payload;
pub mod schedule;
pub mod stomp;
pub mod subscriptions;
#[cfg(test)]
pub(crate) mod testing;

pub use client::MessagingClient;
pub use config::MessagingConfig;
pub use destinations::Channel;
pub use events::ClientEvent;
pub use payload::{ChatMessage, MessageStatus, MessageType, PayloadError};
#[cfg(not(feature = "coverage"))]
pub use stomp::{tcp_connect, tls_connect};
pub use stomp::{
    BlockingStompTransport, BusConnector, BusHandshake, BusMessage, BusSession, FrameTransport,
    HandshakeRequest, NoopBusConnector, SocketBusConnector, StompCodec, StompConnector,
    StompFrame,
};
