/******************************************************************************
 *                                                                            *
 * Ephemeral set of players currently judged to be wearing armor. Rebuilt    *
 * from live equipment state on join, on each poison scan, and one tick      *
 * after every equipment mutation. Never persisted: the set is cleared at    *
 * module init and entries are dropped on disconnect.                        *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{table, Identity, ReducerContext, Table, ScheduleAt, TimeDuration};
use log;

use crate::active_equipment::has_any_armor;
use crate::active_equipment::active_equipment as ActiveEquipmentTableTrait;

#[table(name = armored_player, public)]
#[derive(Clone, Debug)]
pub struct ArmoredPlayer {
    #[primary_key]
    pub player_id: Identity,
}

// One-shot schedule rows for deferred equipment re-checks.
#[table(name = armor_recheck_schedule, scheduled(process_armor_recheck))]
pub struct ArmorRecheckSchedule {
    #[primary_key]
    #[auto_inc]
    pub schedule_id: u64,
    pub player_id: Identity,
    pub scheduled_at: ScheduleAt,
}

/// Re-evaluates the player's equipment and updates tracker membership to
/// match. Idempotent.
pub fn refresh_player(ctx: &ReducerContext, player_id: Identity) {
    let wearing = ctx.db.active_equipment()
        .player_identity()
        .find(player_id)
        .map(|equipment| has_any_armor(&equipment))
        .unwrap_or(false);

    let tracked = ctx.db.armored_player().player_id().find(&player_id).is_some();

    if wearing && !tracked {
        ctx.db.armored_player().insert(ArmoredPlayer { player_id });
        log::debug!("[ArmorTracker] Now tracking {:?} as armored.", player_id);
    } else if !wearing && tracked {
        ctx.db.armored_player().player_id().delete(&player_id);
        log::debug!("[ArmorTracker] Stopped tracking {:?}.", player_id);
    }
}

/// Unconditional removal, used on disconnect and death.
pub fn drop_player(ctx: &ReducerContext, player_id: Identity) {
    ctx.db.armored_player().player_id().delete(&player_id);
}

/// Clears the whole tracker. The set is ephemeral and must not survive a
/// module restart.
pub fn clear_all(ctx: &ReducerContext) {
    let tracker = ctx.db.armored_player();
    let mut cleared = 0usize;
    for row in tracker.iter().collect::<Vec<_>>() {
        tracker.player_id().delete(&row.player_id);
        cleared += 1;
    }
    if cleared > 0 {
        log::info!("[ArmorTracker] Cleared {} stale entries at init.", cleared);
    }
}

/// Schedules a single re-check of the player's equipment one game tick from
/// now. Fire-and-forget: equipment mutations are not guaranteed to be
/// observable by a read scheduled in the same tick they were initiated from.
pub fn schedule_armor_recheck(ctx: &ReducerContext, player_id: Identity) {
    let recheck_at = ctx.timestamp + TimeDuration::from_micros(crate::GAME_TICK_MICROS);
    if let Err(e) = ctx.db.armor_recheck_schedule().try_insert(ArmorRecheckSchedule {
        schedule_id: 0,
        player_id,
        scheduled_at: ScheduleAt::Time(recheck_at),
    }) {
        log::error!("[ArmorTracker] Failed to schedule armor recheck for {:?}: {}", player_id, e);
    }
}

#[spacetimedb::reducer]
pub fn process_armor_recheck(ctx: &ReducerContext, args: ArmorRecheckSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("process_armor_recheck can only be called by the scheduler.".to_string());
    }
    refresh_player(ctx, args.player_id);
    Ok(())
}
