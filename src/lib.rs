use spacetimedb::{Identity, Timestamp, ReducerContext, Table, ConnectionId};
use log;

// Declare the dead player registry + persisted document module
mod dead_players;
// Declare the armor equipment slots module
mod active_equipment;
// Declare the ephemeral armor tracker module
mod armor_tracker;
// Declare the periodic armor poison scan module
mod poison;
// Declare the timed status effect module
pub mod active_effects;
// Declare the death handling module
pub mod death;
// Declare the operator revive command module. The module binding is named
// `revive_cmds` because the `revive` reducer macro output would otherwise
// collide with a module named `revive` when re-exported at the crate root.
#[path = "revive.rs"]
mod revive_cmds;
// Declare the chat module for broadcast/private messages
mod chat;

// Re-export equipment reducers for client bindings
pub use active_equipment::{equip_armor, unequip_armor, ArmorSlot};

// Re-export the revive command and operator management for client bindings
pub use revive_cmds::{revive, grant_operator, revoke_operator};

// Re-export the self-kill command
pub use death::kill_command;

// --- Global Constants ---
pub const PLAYER_MAX_HEALTH: f32 = 20.0;
pub const PLAYER_MAX_FOOD: f32 = 20.0;
pub const PLAYER_MAX_SATURATION: f32 = 20.0;

// Default world spawn, used when a revive is issued by a sender with no
// in-world position.
pub const DEFAULT_SPAWN_X: f32 = 640.0;
pub const DEFAULT_SPAWN_Y: f32 = 480.0;

// One game tick, the delay for deferred equipment re-checks.
pub const GAME_TICK_MICROS: i64 = 50_000;

/// The participation mode of a player. Spectator is the non-participatory
/// "dead, awaiting revival" mode.
#[derive(spacetimedb::SpacetimeType, Clone, Debug, PartialEq)]
pub enum GameMode {
    Survival,
    Spectator,
}

// Player table holding position and vitals
#[spacetimedb::table(name = player, public)]
#[derive(Clone)]
pub struct Player {
    #[primary_key]
    pub identity: Identity,
    #[unique]
    pub username: String,
    pub position_x: f32,
    pub position_y: f32,
    pub health: f32,
    pub food: f32,
    pub saturation: f32,
    pub game_mode: GameMode,
    pub is_online: bool,
    pub last_update: Timestamp,
}

// --- Define ActiveConnection Table ---
#[spacetimedb::table(name = active_connection, public)]
#[derive(Clone, Debug)]
pub struct ActiveConnection {
    #[primary_key]
    identity: Identity,
    // Store the ID of the current WebSocket connection for this identity
    connection_id: ConnectionId,
    timestamp: Timestamp,
}

// --- Lifecycle Reducers ---

// Called once when the module is published or updated
#[spacetimedb::reducer(init)]
pub fn init_module(ctx: &ReducerContext) -> Result<(), String> {
    log::info!("Initializing module...");

    // Create the persisted document if absent and load the registry from it
    crate::dead_players::init_dead_player_document(ctx)?;
    crate::dead_players::load_dead_players(ctx);

    // The armor tracker is ephemeral and must not survive restarts
    crate::armor_tracker::clear_all(ctx);

    // Schedule the repeating armor poison scan and effect processing
    crate::poison::init_armor_poison_schedule(ctx)?;
    crate::active_effects::schedule_effect_processing(ctx)?;

    log::info!("Module initialization complete.");
    Ok(())
}

/// Reducer that handles client connection events.
///
/// Tracks the client's connection, marks the player online, and re-applies
/// the join rules: dead players are forced back into Spectator mode and the
/// armor tracker is resynchronized from their current equipment.
#[spacetimedb::reducer(client_connected)]
pub fn identity_connected(ctx: &ReducerContext) -> Result<(), String> {
    let client_identity = ctx.sender;
    let connection_id = ctx.connection_id.ok_or_else(|| {
        log::error!("[Connect] Missing ConnectionId in client_connected context for {:?}", client_identity);
        "Internal error: Missing connection ID on connect".to_string()
    })?;

    log::info!("[Connect] Tracking active connection for identity {:?} with connection ID {:?}",
        client_identity, connection_id);

    let active_connections = ctx.db.active_connection();
    let new_active_conn = ActiveConnection {
        identity: client_identity,
        connection_id,
        timestamp: ctx.timestamp,
    };

    // Insert or update the active connection record
    if active_connections.identity().find(&client_identity).is_some() {
        active_connections.identity().update(new_active_conn);
        log::info!("[Connect] Updated existing active connection record for {:?}.", client_identity);
    } else {
        match active_connections.try_insert(new_active_conn) {
            Ok(_) => {
                log::info!("[Connect] Inserted new active connection record for {:?}.", client_identity);
            }
            Err(e) => {
                log::error!("[Connect] Failed to insert active connection for {:?}: {}", client_identity, e);
                return Err(format!("Failed to track connection: {}", e));
            }
        }
    }

    // --- Set Player Online Status and Apply Join Rules ---
    let players = ctx.db.player();
    if let Some(mut player) = players.identity().find(&client_identity) {
        if !player.is_online {
            player.is_online = true;
            players.identity().update(player.clone());
        }
        handle_player_join(ctx, &player);
    } else {
        // Player might not be registered yet, which is fine. Join rules run
        // at the end of registration instead.
        log::debug!("[Connect] Player {:?} not found in Player table yet (likely needs registration).", client_identity);
    }

    Ok(())
}

/// Reducer that handles client disconnection events.
///
/// Removes the active connection record if it matches the disconnecting
/// connection, marks the player offline, and drops the player from the
/// armor tracker so no equipment state leaks across sessions.
#[spacetimedb::reducer(client_disconnected)]
pub fn identity_disconnected(ctx: &ReducerContext) {
    let sender_id = ctx.sender;
    let disconnecting_connection_id = match ctx.connection_id {
        Some(id) => id,
        None => {
            return;
        }
    };

    // The armor tracker entry is dropped unconditionally, even for a stale
    // disconnect: the next poison scan rebuilds it if the player is online.
    crate::armor_tracker::drop_player(ctx, sender_id);

    let active_connections = ctx.db.active_connection();
    let players = ctx.db.player();

    if let Some(initial_active_conn) = active_connections.identity().find(&sender_id) {
        if initial_active_conn.connection_id == disconnecting_connection_id {
            active_connections.identity().delete(&sender_id);

            if let Some(mut player) = players.identity().find(&sender_id) {
                if player.is_online {
                    player.is_online = false;
                    players.identity().update(player);
                    log::info!("[Disconnect] Set player {:?} to offline.", sender_id);
                }
            } else {
                log::warn!("[Disconnect] Player {:?} not found in Player table during disconnect cleanup.", sender_id);
            }
        } else {
            // The player reconnected before the old disconnect processed.
            // The new connection is already active; leave it alone.
        }
    }
}

/// Applies the join rules for a player who has just come (back) into the
/// world. A player whose identity is in the dead registry is forced into
/// Spectator mode and both a private notice and a server-wide broadcast are
/// emitted. Regardless of dead status, the armor tracker is resynchronized
/// from the player's current equipment.
pub(crate) fn handle_player_join(ctx: &ReducerContext, player: &Player) {
    if crate::dead_players::is_dead(ctx, player.identity) {
        if player.game_mode != GameMode::Spectator {
            let mut updated = player.clone();
            updated.game_mode = GameMode::Spectator;
            ctx.db.player().identity().update(updated);
        }
        chat::send_private_message(
            ctx,
            player.identity,
            format!("You are dead! Wait for an OP to revive you with /revive {}", player.username),
        );
        chat::broadcast_system_message(
            ctx,
            format!("{} has joined but remains dead. Use /revive {} to bring them back!",
                player.username, player.username),
        );
        log::info!("[Join] Dead player {} ({:?}) joined, kept in Spectator mode.",
            player.username, player.identity);
    }

    crate::armor_tracker::refresh_player(ctx, player.identity);
}

/// Reducer that handles player registration and reconnection.
///
/// For new players, it creates their initial state at the world spawn.
/// For existing players, it refreshes their connection record. Both paths
/// end by applying the join rules.
#[spacetimedb::reducer]
pub fn register_player(ctx: &ReducerContext, username: String) -> Result<(), String> {
    let sender_id = ctx.sender;
    let players = ctx.db.player();
    log::info!("Attempting registration/login for identity: {:?}, username: {}", sender_id, username);

    // --- Check if player already exists for this authenticated identity ---
    if let Some(mut existing_player) = players.identity().find(&sender_id) {
        log::info!("[RegisterPlayer] Found existing player {} ({:?}).",
            existing_player.username, sender_id);

        let update_timestamp = ctx.timestamp;
        existing_player.last_update = update_timestamp;
        existing_player.is_online = true;
        players.identity().update(existing_player.clone());

        // --- ALSO Update ActiveConnection record ---
        let connection_id = ctx.connection_id.ok_or_else(|| {
            log::error!("[RegisterPlayer] Missing ConnectionId in context for existing player {:?}", sender_id);
            "Internal error: Missing connection ID on reconnect".to_string()
        })?;

        let active_connections = ctx.db.active_connection();
        let updated_active_conn = ActiveConnection {
            identity: sender_id,
            connection_id,
            timestamp: update_timestamp,
        };

        if active_connections.identity().find(&sender_id).is_some() {
            active_connections.identity().update(updated_active_conn);
        } else if let Err(e) = active_connections.try_insert(updated_active_conn) {
            log::error!("[RegisterPlayer] Failed to insert missing active connection for {:?}: {}", sender_id, e);
        }

        handle_player_join(ctx, &existing_player);
        return Ok(());
    }

    // --- Player does not exist, proceed with registration ---
    let username_taken_by_other = players.iter().any(|p| p.username == username && p.identity != sender_id);
    if username_taken_by_other {
        log::warn!("Username '{}' already taken by another player. Registration failed for {:?}.", username, sender_id);
        return Err(format!("Username '{}' is already taken.", username));
    }

    // A brand-new player row can still be in the dead registry if the
    // persisted document carried their identity across a wiped player table.
    let starts_dead = crate::dead_players::is_dead(ctx, sender_id);

    let player = Player {
        identity: sender_id,
        username: username.clone(),
        position_x: DEFAULT_SPAWN_X,
        position_y: DEFAULT_SPAWN_Y,
        health: PLAYER_MAX_HEALTH,
        food: PLAYER_MAX_FOOD,
        saturation: PLAYER_MAX_SATURATION,
        game_mode: if starts_dead { GameMode::Spectator } else { GameMode::Survival },
        is_online: true,
        last_update: ctx.timestamp,
    };

    match players.try_insert(player) {
        Ok(inserted_player) => {
            log::info!("Player registered: {}.", username);

            let connection_id = ctx.connection_id.ok_or_else(|| {
                log::error!("[RegisterPlayer] Missing ConnectionId in context for NEW player {:?}", sender_id);
                "Internal error: Missing connection ID on initial registration".to_string()
            })?;
            let active_connections = ctx.db.active_connection();
            let new_active_conn = ActiveConnection {
                identity: sender_id,
                connection_id,
                timestamp: ctx.timestamp,
            };
            if let Err(e) = active_connections.try_insert(new_active_conn) {
                // Log error but don't fail registration
                log::error!("[RegisterPlayer] Failed to insert active connection for new player {:?}: {}", sender_id, e);
            }

            handle_player_join(ctx, &inserted_player);
            Ok(())
        },
        Err(e) => {
            log::error!("Failed to insert new player {} ({:?}): {}", username, sender_id, e);
            Err("Failed to register player: Database error.".to_string())
        }
    }
}
