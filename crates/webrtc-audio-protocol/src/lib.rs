pub mod codec;
pub mod events;

pub use codec::{decode_event, encode_event, EncodedEvent, ProtocolError, ProtocolResult};
pub use events::*;
