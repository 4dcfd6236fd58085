mod chat;
mod message;

pub use chat::*;
pub use message::*;
