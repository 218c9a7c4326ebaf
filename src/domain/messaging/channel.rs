//! Bus channel naming.
//!
//! Every conversation owns two channels on the bus: `conversation:<id>` for
//! message events and `typing:<id>` for typing indicators. Publisher and relay
//! both go through this module so names always agree.

use crate::domain::foundation::ConversationId;

/// Prefix of message channels.
pub const CONVERSATION_PREFIX: &str = "conversation:";

/// Prefix of typing-indicator channels.
pub const TYPING_PREFIX: &str = "typing:";

/// The two channel families carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFamily {
    /// Persisted chat messages (`new_message`).
    Conversation,
    /// Ephemeral typing indicators (`user_typing`).
    Typing,
}

impl ChannelFamily {
    /// All families, in subscription order.
    pub const ALL: [ChannelFamily; 2] = [ChannelFamily::Conversation, ChannelFamily::Typing];

    /// Fixed channel-name prefix for this family.
    pub fn prefix(self) -> &'static str {
        match self {
            ChannelFamily::Conversation => CONVERSATION_PREFIX,
            ChannelFamily::Typing => TYPING_PREFIX,
        }
    }

    /// Glob pattern matching every channel of this family.
    pub fn pattern(self) -> String {
        format!("{}*", self.prefix())
    }

    /// Channel name for one conversation in this family.
    pub fn channel(self, conversation_id: &ConversationId) -> String {
        format!("{}{}", self.prefix(), conversation_id)
    }
}

/// Message channel for a conversation.
pub fn channel_for(conversation_id: &ConversationId) -> String {
    ChannelFamily::Conversation.channel(conversation_id)
}

/// Typing channel for a conversation.
pub fn typing_channel_for(conversation_id: &ConversationId) -> String {
    ChannelFamily::Typing.channel(conversation_id)
}

/// A bus channel name resolved back into its family and conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusChannel {
    pub family: ChannelFamily,
    pub conversation_id: ConversationId,
}

/// Resolves a channel name produced by [`channel_for`] or [`typing_channel_for`].
///
/// The whole prefix is stripped, so ids containing `:` survive intact.
/// Returns `None` for foreign channels or an empty/invalid id.
pub fn parse_channel(name: &str) -> Option<BusChannel> {
    ChannelFamily::ALL.iter().find_map(|family| {
        let id = name.strip_prefix(family.prefix())?;
        let conversation_id = ConversationId::new(id).ok()?;
        Some(BusChannel {
            family: *family,
            conversation_id,
        })
    })
}
