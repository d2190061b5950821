//! Envelope domain: wire discriminators and the message itself.

mod kinds;
pub(crate) mod message;

pub use kinds::{MessageAction, MessageStatus, MessageType, UrlRef, UrlType};
pub use message::{Message, RevokeReason, DEFAULT_LANG};
