use spacetimedb::{table, Identity, Timestamp, ReducerContext, Table};
use log;

use crate::player;

pub const SYSTEM_SENDER: &str = "SYSTEM";

// Server-wide chat feed. System broadcasts land here too.
#[table(name = message, public)]
#[derive(Clone, Debug)]
pub struct Message {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub sender_display_name: String,
    pub text: String,
    pub sent: Timestamp,
}

// Table for private system messages to individual players
#[table(name = private_message, public)] // Public so client can subscribe with filter
#[derive(Clone, Debug)]
pub struct PrivateMessage {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    pub recipient_identity: Identity, // The player who should see this message
    pub sender_display_name: String,  // e.g., "SYSTEM"
    pub text: String,
    pub sent: Timestamp,
}

/// Reducer for player chat messages.
#[spacetimedb::reducer]
pub fn send_message(ctx: &ReducerContext, text: String) -> Result<(), String> {
    let sender_id = ctx.sender;
    if text.trim().is_empty() {
        return Err("Cannot send an empty message.".to_string());
    }

    let sender_name = ctx.db.player().identity().find(&sender_id)
        .map(|p| p.username)
        .ok_or_else(|| "You must register before chatting.".to_string())?;

    ctx.db.message().insert(Message {
        id: 0,
        sender_display_name: sender_name,
        text,
        sent: ctx.timestamp,
    });
    Ok(())
}

/// Inserts a server-wide system broadcast.
pub fn broadcast_system_message(ctx: &ReducerContext, text: String) {
    log::info!("[Broadcast] {}", text);
    ctx.db.message().insert(Message {
        id: 0,
        sender_display_name: SYSTEM_SENDER.to_string(),
        text,
        sent: ctx.timestamp,
    });
}

/// Inserts a private system message for one player.
pub fn send_private_message(ctx: &ReducerContext, recipient: Identity, text: String) {
    ctx.db.private_message().insert(PrivateMessage {
        id: 0,
        recipient_identity: recipient,
        sender_display_name: SYSTEM_SENDER.to_string(),
        text,
        sent: ctx.timestamp,
    });
}
