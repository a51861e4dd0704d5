pub mod errors;
pub mod types;

pub use errors::TransportError;
pub use types::{ConnState, ConversationId};
