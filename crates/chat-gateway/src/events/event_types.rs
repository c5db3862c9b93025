//! Dispatch event names
//!
//! Names carried in the `t` field of Dispatch frames. The session acts on
//! `READY` and `RESUMED` only; the others let handlers match on a type and
//! check that the identify intents will actually deliver them.

use chat_core::Intents;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    Ready,
    /// Replay of missed events after Resume is complete
    Resumed,
    GuildCreate,
    GuildUpdate,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageReactionAdd,
    MessageReactionRemove,
    TypingStart,
    UserUpdate,
}

use GatewayEventType as E;

/// Wire name and the intent that subscribes to each event
const EVENTS: [(GatewayEventType, &str, Intents); 15] = [
    (E::Ready, "READY", Intents::empty()),
    (E::Resumed, "RESUMED", Intents::empty()),
    (E::GuildCreate, "GUILD_CREATE", Intents::GUILDS),
    (E::GuildUpdate, "GUILD_UPDATE", Intents::GUILDS),
    (E::GuildDelete, "GUILD_DELETE", Intents::GUILDS),
    (E::ChannelCreate, "CHANNEL_CREATE", Intents::GUILDS),
    (E::ChannelUpdate, "CHANNEL_UPDATE", Intents::GUILDS),
    (E::ChannelDelete, "CHANNEL_DELETE", Intents::GUILDS),
    (E::MessageCreate, "MESSAGE_CREATE", Intents::GUILD_MESSAGES.union(Intents::DIRECT_MESSAGES)),
    (E::MessageUpdate, "MESSAGE_UPDATE", Intents::GUILD_MESSAGES.union(Intents::DIRECT_MESSAGES)),
    (E::MessageDelete, "MESSAGE_DELETE", Intents::GUILD_MESSAGES.union(Intents::DIRECT_MESSAGES)),
    (
        E::MessageReactionAdd,
        "MESSAGE_REACTION_ADD",
        Intents::GUILD_MESSAGE_REACTIONS.union(Intents::DIRECT_MESSAGE_REACTIONS),
    ),
    (
        E::MessageReactionRemove,
        "MESSAGE_REACTION_REMOVE",
        Intents::GUILD_MESSAGE_REACTIONS.union(Intents::DIRECT_MESSAGE_REACTIONS),
    ),
    (
        E::TypingStart,
        "TYPING_START",
        Intents::GUILD_MESSAGE_TYPING.union(Intents::DIRECT_MESSAGE_TYPING),
    ),
    (E::UserUpdate, "USER_UPDATE", Intents::empty()),
];

impl GatewayEventType {
    fn entry(self) -> &'static (GatewayEventType, &'static str, Intents) {
        // Variants and table rows are declared in the same order
        &EVENTS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// Look up a wire name; names outside the catalog are `None`
    pub fn from_str(name: &str) -> Option<Self> {
        EVENTS.iter().find(|(_, n, _)| *n == name).map(|(event, _, _)| *event)
    }

    /// Intents of which at least one must be identified with for the
    /// server to send this event; empty when it is always sent
    pub fn intents(self) -> Intents {
        self.entry().2
    }

    /// Whether a session identified with `intents` receives this event
    pub fn is_delivered_with(self, intents: Intents) -> bool {
        let needed = self.intents();
        needed.is_empty() || needed.intersects(intents)
    }
}

impl fmt::Display for GatewayEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
