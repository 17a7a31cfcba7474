/******************************************************************************
 *                                                                            *
 * The armor poison scan: a repeating 1-second job that re-evaluates every   *
 * online player's equipment and keeps armored players poisoned. Wearing     *
 * anything in an armor slot is the trigger; the effect is re-applied every  *
 * firing so it never lapses while armor stays on, and simply expires on     *
 * its own once the armor comes off.                                         *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{table, ReducerContext, Table, ScheduleAt, TimeDuration};
use log;

use crate::GameMode;
use crate::player;
use crate::armor_tracker::armored_player as ArmoredPlayerTableTrait;

pub const ARMOR_SCAN_INTERVAL_MICROS: i64 = 1_000_000;

#[table(name = armor_poison_schedule, scheduled(armor_poison_tick))]
pub struct ArmorPoisonSchedule {
    #[primary_key]
    #[auto_inc]
    pub job_id: u64,
    pub scheduled_at: ScheduleAt,
}

/// Schedules the repeating armor scan. The first firing lands one interval
/// after init, then repeats at the same interval until the module is torn
/// down.
pub fn init_armor_poison_schedule(ctx: &ReducerContext) -> Result<(), String> {
    if ctx.db.armor_poison_schedule().iter().count() == 0 {
        let interval = TimeDuration::from_micros(ARMOR_SCAN_INTERVAL_MICROS);
        ctx.db.armor_poison_schedule().insert(ArmorPoisonSchedule {
            job_id: 0,
            scheduled_at: ScheduleAt::Interval(interval.into()),
        });
        log::info!("Scheduled armor poison scan every {}s.", ARMOR_SCAN_INTERVAL_MICROS / 1_000_000);
    }
    Ok(())
}

#[spacetimedb::reducer]
pub fn armor_poison_tick(ctx: &ReducerContext, _args: ArmorPoisonSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("armor_poison_tick can only be called by the scheduler.".to_string());
    }

    for player in ctx.db.player().iter().filter(|p| is_poison_candidate(p.is_online, &p.game_mode)) {
        crate::armor_tracker::refresh_player(ctx, player.identity);

        if ctx.db.armored_player().player_id().find(&player.identity).is_some() {
            crate::active_effects::apply_poison_effect(ctx, player.identity);
        }
    }
    Ok(())
}

/// Only live participants are scanned. Spectators have no health
/// interaction, so a dead player keeps whatever sits in their armor slots
/// without being poisoned for it until an operator revives them.
fn is_poison_candidate(is_online: bool, game_mode: &GameMode) -> bool {
    is_online && *game_mode != GameMode::Spectator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_survival_players_are_scanned() {
        assert!(is_poison_candidate(true, &GameMode::Survival));
    }

    #[test]
    fn spectators_are_never_scanned() {
        // A dead player parked in Spectator mode still has their equipment
        // rows; the scan must not poison them while they await revival.
        assert!(!is_poison_candidate(true, &GameMode::Spectator));
    }

    #[test]
    fn offline_players_are_never_scanned() {
        assert!(!is_poison_candidate(false, &GameMode::Survival));
        assert!(!is_poison_candidate(false, &GameMode::Spectator));
    }
}
