/******************************************************************************
 *                                                                            *
 * The one transition into the dead state. Every death, whatever its cause,  *
 * runs through handle_player_death: the player is forced into Spectator     *
 * mode, added to the persisted dead registry, dropped from the armor        *
 * tracker, and a death marker records where it happened.                    *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{table, Identity, Timestamp, ReducerContext, Table};
use log;

use crate::{Player, GameMode};
use crate::player;

// Cooldown for the /kill command
pub const KILL_COMMAND_COOLDOWN_SECONDS: u64 = 300;

// Table to store the last time a player used the /kill command
#[table(name = kill_command_cooldown)]
#[derive(Clone, Debug)]
pub struct KillCommandCooldown {
    #[primary_key]
    player_id: Identity,
    last_kill_command_at: Timestamp,
}

// Where and when each player last died.
#[table(name = death_marker, public)]
#[derive(Clone, Debug)]
pub struct DeathMarker {
    #[primary_key]
    pub player_id: Identity,
    pub pos_x: f32,
    pub pos_y: f32,
    pub death_timestamp: Timestamp,
    pub death_cause: String, // "Command", "Poison", etc.
}

/// Applies the full death transition for a player. Idempotent for a player
/// who is already dead.
pub fn handle_player_death(ctx: &ReducerContext, player: &Player, death_cause: &str) {
    let player_id = player.identity;
    log::info!("[Death] Player {} ({:?}) died. Cause: {}.", player.username, player_id, death_cause);

    // Force observer mode
    if player.game_mode != GameMode::Spectator {
        let mut updated = player.clone();
        updated.game_mode = GameMode::Spectator;
        updated.last_update = ctx.timestamp;
        ctx.db.player().identity().update(updated);
    }

    // Register as dead (persists across restarts)
    crate::dead_players::mark_dead(ctx, player_id);

    // Ephemeral armor state does not follow a player into death
    crate::armor_tracker::drop_player(ctx, player_id);

    // Spectators have no health interaction; a poison picked up just
    // before dying must not keep ticking on the corpse
    crate::active_effects::clear_player_effects(ctx, player_id);

    // Upsert the death marker
    let marker = DeathMarker {
        player_id,
        pos_x: player.position_x,
        pos_y: player.position_y,
        death_timestamp: ctx.timestamp,
        death_cause: death_cause.to_string(),
    };
    let markers = ctx.db.death_marker();
    if markers.player_id().find(&player_id).is_some() {
        markers.player_id().update(marker);
    } else {
        markers.insert(marker);
    }
}

/// Self-kill command with a cooldown. The only client-invokable path into
/// the dead state.
#[spacetimedb::reducer]
pub fn kill_command(ctx: &ReducerContext) -> Result<(), String> {
    let sender_id = ctx.sender;
    let player = ctx.db.player().identity().find(&sender_id)
        .ok_or_else(|| "Player not found".to_string())?;

    if crate::dead_players::is_dead(ctx, sender_id) {
        return Err("You are already dead.".to_string());
    }

    // --- Cooldown Check ---
    let cooldowns = ctx.db.kill_command_cooldown();
    if let Some(cooldown) = cooldowns.player_id().find(&sender_id) {
        let elapsed_micros = ctx.timestamp.to_micros_since_unix_epoch()
            .saturating_sub(cooldown.last_kill_command_at.to_micros_since_unix_epoch());
        let cooldown_micros = KILL_COMMAND_COOLDOWN_SECONDS as i64 * 1_000_000;
        if elapsed_micros < cooldown_micros {
            let remaining_secs = (cooldown_micros - elapsed_micros) / 1_000_000;
            return Err(format!("You must wait {}s before using /kill again.", remaining_secs));
        }
        cooldowns.player_id().update(KillCommandCooldown {
            player_id: sender_id,
            last_kill_command_at: ctx.timestamp,
        });
    } else if let Err(e) = cooldowns.try_insert(KillCommandCooldown {
        player_id: sender_id,
        last_kill_command_at: ctx.timestamp,
    }) {
        log::error!("[Kill] Failed to record kill command cooldown for {:?}: {}", sender_id, e);
    }

    handle_player_death(ctx, &player, "Command");
    Ok(())
}
