//! Domain entities - payload shapes the client core reads

mod gateway;
mod message;
mod user;

pub use gateway::{GatewayBotInfo, ReadyEvent, SessionStartLimit, UnavailableGuild};
pub use message::{Message, MessageReference};
pub use user::User;
