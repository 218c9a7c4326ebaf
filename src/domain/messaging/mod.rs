//! Messaging domain: the events that fan out and the channels they ride on.

mod channel;
mod events;

pub use channel::{
    channel_for, parse_channel, typing_channel_for, BusChannel, ChannelFamily,
    CONVERSATION_PREFIX, TYPING_PREFIX,
};
pub use events::{MessageEvent, TypingEvent};
