/******************************************************************************
 *                                                                            *
 * The operator-only revive command and the operator roster it is gated on.  *
 * Revive validation rejects in a fixed order (permission, usage, target     *
 * online, target actually dead) without touching any state; once validation *
 * passes, every restoration step is applied unconditionally.                *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{table, Identity, Timestamp, ReducerContext, Table};
use log;

use crate::{GameMode, PLAYER_MAX_HEALTH, PLAYER_MAX_FOOD, PLAYER_MAX_SATURATION, DEFAULT_SPAWN_X, DEFAULT_SPAWN_Y};
use crate::player;

#[table(name = operator, public)]
#[derive(Clone, Debug)]
pub struct Operator {
    #[primary_key]
    pub identity: Identity,
    pub granted_at: Timestamp,
}

pub fn is_operator(ctx: &ReducerContext, identity: Identity) -> bool {
    ctx.db.operator().identity().find(&identity).is_some()
}

/// Grants operator privilege to a registered player. While the operator
/// table is empty, anyone may claim the first grant (bootstrap); afterwards
/// only existing operators may grant.
#[spacetimedb::reducer]
pub fn grant_operator(ctx: &ReducerContext, target_username: String) -> Result<(), String> {
    let sender_id = ctx.sender;
    let operators = ctx.db.operator();

    let bootstrap = operators.iter().count() == 0;
    if !bootstrap && !is_operator(ctx, sender_id) {
        return Err("You don't have permission to use this command!".to_string());
    }

    let target = ctx.db.player().username().find(&target_username)
        .ok_or_else(|| format!("Player '{}' not found!", target_username))?;

    if operators.identity().find(&target.identity).is_some() {
        return Err(format!("{} is already an operator.", target.username));
    }

    operators.insert(Operator {
        identity: target.identity,
        granted_at: ctx.timestamp,
    });
    log::info!("[Op] {:?} granted operator to {} ({:?}).", sender_id, target.username, target.identity);
    Ok(())
}

/// Revokes operator privilege. Operator-only, no bootstrap path.
#[spacetimedb::reducer]
pub fn revoke_operator(ctx: &ReducerContext, target_username: String) -> Result<(), String> {
    let sender_id = ctx.sender;
    if !is_operator(ctx, sender_id) {
        return Err("You don't have permission to use this command!".to_string());
    }

    let target = ctx.db.player().username().find(&target_username)
        .ok_or_else(|| format!("Player '{}' not found!", target_username))?;

    if ctx.db.operator().identity().find(&target.identity).is_none() {
        return Err(format!("{} is not an operator.", target.username));
    }

    ctx.db.operator().identity().delete(&target.identity);
    log::info!("[Op] {:?} revoked operator from {} ({:?}).", sender_id, target.username, target.identity);
    Ok(())
}

/// A player is revivable when death is observable on them either way:
/// parked in Spectator mode or present in the dead registry.
fn is_revivable(game_mode: &GameMode, in_dead_registry: bool) -> bool {
    *game_mode == GameMode::Spectator || in_dead_registry
}

/// Operator command restoring a dead player to play.
///
/// On success the target is removed from the dead registry, returned to
/// Survival mode with full health, food and saturation, stripped of all
/// active status effects, and teleported to the invoking operator (or the
/// world spawn when the operator has no in-world position). No rollback is
/// attempted if a later step has nothing to do.
#[spacetimedb::reducer]
pub fn revive(ctx: &ReducerContext, target_username: String) -> Result<(), String> {
    let sender_id = ctx.sender;

    // 1. Permission
    if !is_operator(ctx, sender_id) {
        return Err("You don't have permission to use this command!".to_string());
    }

    // 2. Usage
    if target_username.trim().is_empty() {
        return Err("Usage: /revive <player>".to_string());
    }

    // 3. Target must be registered and online
    let players = ctx.db.player();
    let target = match players.username().find(&target_username) {
        Some(p) if p.is_online => p,
        _ => return Err(format!("Player '{}' not found or not online!", target_username)),
    };

    // 4. Target must actually be dead
    let in_registry = crate::dead_players::is_dead(ctx, target.identity);
    if !is_revivable(&target.game_mode, in_registry) {
        return Err(format!("{} is not dead!", target.username));
    }

    // 5. Restore. All steps are unconditional once validation has passed.
    crate::dead_players::mark_revived(ctx, target.identity);

    let (dest_x, dest_y) = match players.identity().find(&sender_id) {
        Some(op_player) => (op_player.position_x, op_player.position_y),
        None => (DEFAULT_SPAWN_X, DEFAULT_SPAWN_Y),
    };

    let mut revived = target.clone();
    revived.game_mode = GameMode::Survival;
    revived.health = PLAYER_MAX_HEALTH;
    revived.food = PLAYER_MAX_FOOD;
    revived.saturation = PLAYER_MAX_SATURATION;
    revived.position_x = dest_x;
    revived.position_y = dest_y;
    revived.last_update = ctx.timestamp;
    players.identity().update(revived);

    crate::active_effects::clear_player_effects(ctx, target.identity);

    crate::chat::broadcast_system_message(
        ctx,
        format!("{} has been revived!", target.username),
    );
    log::info!("[Revive] {:?} revived {} ({:?}).", sender_id, target.username, target.identity);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectator_is_revivable_even_outside_registry() {
        assert!(is_revivable(&GameMode::Spectator, false));
    }

    #[test]
    fn registry_entry_is_revivable_even_in_survival_mode() {
        // Covers a hand-edited document marking an otherwise-normal player.
        assert!(is_revivable(&GameMode::Survival, true));
    }

    #[test]
    fn alive_survival_player_is_not_revivable() {
        assert!(!is_revivable(&GameMode::Survival, false));
    }
}
