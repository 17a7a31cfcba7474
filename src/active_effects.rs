use spacetimedb::{table, Identity, Timestamp, ReducerContext, Table, ScheduleAt, TimeDuration, SpacetimeType};
use crate::{Player, GameMode};
use crate::player;
use log;

// Poison ticks once per second for 1 health, and the effect lasts three
// seconds unless re-applied. It weakens but never kills: health is floored
// at half a heart.
pub const POISON_DURATION_MICROS: i64 = 3_000_000;
pub const POISON_TICK_INTERVAL_MICROS: i64 = 1_000_000;
pub const POISON_DAMAGE_PER_TICK: f32 = 1.0;
pub const POISON_MIN_HEALTH: f32 = 1.0;

#[table(name = active_status_effect, public)] // public for client UI
#[derive(Clone, Debug)]
pub struct ActiveStatusEffect {
    #[primary_key]
    #[auto_inc]
    pub effect_id: u64,
    pub player_id: Identity,
    pub effect_type: EffectType,
    pub started_at: Timestamp,
    pub ends_at: Timestamp,
    pub next_tick_at: Timestamp,
    pub tick_interval_micros: u64,
    // No particle ambience for armor poison; clients key visuals off this.
    pub show_particles: bool,
}

#[derive(SpacetimeType, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum EffectType {
    Poison,
}

// Schedule table for processing effects
#[table(name = process_effects_schedule, scheduled(process_active_status_effects_tick))]
pub struct ProcessEffectsSchedule {
    #[primary_key]
    #[auto_inc]
    pub job_id: u64,
    pub job_name: String,
    pub scheduled_at: ScheduleAt,
}

pub fn schedule_effect_processing(ctx: &ReducerContext) -> Result<(), String> {
    if ctx.db.process_effects_schedule().iter().find(|job| job.job_name == "process_status_effects").is_none() {
        ctx.db.process_effects_schedule().insert(ProcessEffectsSchedule {
            job_id: 0,
            job_name: "process_status_effects".to_string(),
            scheduled_at: TimeDuration::from_micros(POISON_TICK_INTERVAL_MICROS).into(), // Tick every 1 second
        });
        log::info!("Scheduled active status effect processing.");
    }
    Ok(())
}

/// Applies or refreshes a poison effect on the player. A fresh application
/// resets the expiry window, so a standing poison source keeps the effect
/// alive indefinitely while its own expiry handles removal once the source
/// is gone.
pub fn apply_poison_effect(ctx: &ReducerContext, player_id: Identity) {
    let now = ctx.timestamp;
    let ends_at = now + TimeDuration::from_micros(POISON_DURATION_MICROS);
    let effects = ctx.db.active_status_effect();

    if let Some(mut existing) = effects.iter()
        .find(|e| e.player_id == player_id && e.effect_type == EffectType::Poison)
    {
        existing.ends_at = ends_at;
        effects.effect_id().update(existing);
        return;
    }

    effects.insert(ActiveStatusEffect {
        effect_id: 0,
        player_id,
        effect_type: EffectType::Poison,
        started_at: now,
        ends_at,
        next_tick_at: now + TimeDuration::from_micros(POISON_TICK_INTERVAL_MICROS),
        tick_interval_micros: POISON_TICK_INTERVAL_MICROS as u64,
        show_particles: false,
    });
    log::debug!("[Effects] Applied poison to player {:?}.", player_id);
}

/// Deletes every active status effect on the player. Used on revive.
pub fn clear_player_effects(ctx: &ReducerContext, player_id: Identity) {
    let effects = ctx.db.active_status_effect();
    let mut effects_to_remove = Vec::new();
    for effect in effects.iter().filter(|e| e.player_id == player_id) {
        effects_to_remove.push(effect.effect_id);
    }
    for effect_id in effects_to_remove {
        effects.effect_id().delete(&effect_id);
        log::info!("Cleared effect {} for player {:?}.", effect_id, player_id);
    }
}

#[spacetimedb::reducer]
pub fn process_active_status_effects_tick(ctx: &ReducerContext, _args: ProcessEffectsSchedule) -> Result<(), String> {
    if ctx.sender != ctx.identity() {
        return Err("process_active_status_effects_tick can only be called by the scheduler.".to_string());
    }

    let current_time = ctx.timestamp;
    let mut effects_to_remove = Vec::new();

    for effect_row in ctx.db.active_status_effect().iter() {
        let effect = effect_row.clone();

        if current_time >= effect.ends_at {
            effects_to_remove.push(effect.effect_id);
            continue;
        }
        if current_time < effect.next_tick_at {
            continue;
        }

        let player = match ctx.db.player().identity().find(&effect.player_id) {
            Some(p) => p,
            None => {
                effects_to_remove.push(effect.effect_id);
                continue;
            }
        };

        if !effect_target_valid(&player.game_mode) {
            effects_to_remove.push(effect.effect_id);
            continue;
        }

        match effect.effect_type {
            EffectType::Poison => {
                let new_health = poison_tick_health(player.health);
                if new_health != player.health {
                    let mut updated_player: Player = player.clone();
                    updated_player.health = new_health;
                    ctx.db.player().identity().update(updated_player);
                    log::trace!("[EffectTick] Poison dealt {:.1} to player {:?} ({:.1} -> {:.1}).",
                        player.health - new_health, effect.player_id, player.health, new_health);
                }
            }
        }

        let mut updated_effect = effect.clone();
        updated_effect.next_tick_at = current_time + TimeDuration::from_micros(effect.tick_interval_micros as i64);
        ctx.db.active_status_effect().effect_id().update(updated_effect);
    }

    for effect_id in effects_to_remove {
        ctx.db.active_status_effect().effect_id().delete(&effect_id);
        log::debug!("[EffectTick] Removed effect {}", effect_id);
    }
    Ok(())
}

/// Spectators have no health interaction; any effect still attached to one
/// is stale and gets dropped instead of ticked.
fn effect_target_valid(game_mode: &GameMode) -> bool {
    *game_mode != GameMode::Spectator
}

/// Health after one poison tick. Poison never reduces health below the
/// floor, and never raises it.
fn poison_tick_health(health: f32) -> f32 {
    if health <= POISON_MIN_HEALTH {
        return health;
    }
    (health - POISON_DAMAGE_PER_TICK).max(POISON_MIN_HEALTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poison_drains_one_health_per_tick() {
        assert_eq!(poison_tick_health(20.0), 19.0);
        assert_eq!(poison_tick_health(5.5), 4.5);
    }

    #[test]
    fn poison_never_kills() {
        assert_eq!(poison_tick_health(1.5), 1.0);
        assert_eq!(poison_tick_health(1.0), 1.0);
        // A player already below the floor (e.g. damaged by something else
        // mid-tick) is left alone rather than healed up to it.
        assert_eq!(poison_tick_health(0.5), 0.5);
    }

    #[test]
    fn effects_never_tick_on_spectators() {
        // A player who dies mid-poison must not keep losing health while
        // awaiting revival.
        assert!(!effect_target_valid(&GameMode::Spectator));
        assert!(effect_target_valid(&GameMode::Survival));
    }
}
