/******************************************************************************
 *                                                                            *
 * Defines the player armor equipment slots and the reducers that mutate     *
 * them. Equipping or removing an item never updates the armor tracker      *
 * directly; each mutation schedules a one-tick deferred re-check instead,   *
 * since the tracker must observe the slot state as it stands after the      *
 * triggering tick.                                                          *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{Identity, ReducerContext, Table};
use log;

/// The four armor slots a player can fill.
#[derive(spacetimedb::SpacetimeType, Clone, Copy, Debug, PartialEq)]
pub enum ArmorSlot {
    Head,
    Chest,
    Legs,
    Feet,
}

/// Represents a player's worn equipment. Slots hold item names; an occupied
/// slot counts as armor no matter what item sits in it.
#[spacetimedb::table(name = active_equipment, public)]
#[derive(Clone, Default, Debug)]
pub struct ActiveEquipment {
    #[primary_key]
    pub player_identity: Identity,
    pub head_item: Option<String>,
    pub chest_item: Option<String>,
    pub legs_item: Option<String>,
    pub feet_item: Option<String>,
}

/// True if at least one armor slot is occupied. Deliberately permissive:
/// any item placed in an armor slot counts, armor or not.
pub fn has_any_armor(equipment: &ActiveEquipment) -> bool {
    equipment.head_item.is_some()
        || equipment.chest_item.is_some()
        || equipment.legs_item.is_some()
        || equipment.feet_item.is_some()
}

/// Places an item into one of the sender's armor slots, replacing whatever
/// was there. The armor tracker catches up on the next tick.
#[spacetimedb::reducer]
pub fn equip_armor(ctx: &ReducerContext, slot: ArmorSlot, item_name: String) -> Result<(), String> {
    let sender_id = ctx.sender;
    if item_name.trim().is_empty() {
        return Err("Cannot equip an empty item name.".to_string());
    }

    let mut equipment = get_or_create_active_equipment(ctx, sender_id)?;
    let replaced = set_slot(&mut equipment, slot, Some(item_name.clone()));
    ctx.db.active_equipment().player_identity().update(equipment);

    match replaced {
        Some(old_item) => log::info!("Player {:?} equipped '{}' to {:?}, replacing '{}'.",
            sender_id, item_name, slot, old_item),
        None => log::info!("Player {:?} equipped '{}' to {:?}.", sender_id, item_name, slot),
    }

    crate::armor_tracker::schedule_armor_recheck(ctx, sender_id);
    Ok(())
}

/// Clears one of the sender's armor slots. Not an error if the slot was
/// already empty.
#[spacetimedb::reducer]
pub fn unequip_armor(ctx: &ReducerContext, slot: ArmorSlot) -> Result<(), String> {
    let sender_id = ctx.sender;
    let active_equipments = ctx.db.active_equipment();

    if let Some(mut equipment) = active_equipments.player_identity().find(sender_id) {
        if let Some(old_item) = set_slot(&mut equipment, slot, None) {
            active_equipments.player_identity().update(equipment);
            log::info!("Player {:?} removed '{}' from {:?}.", sender_id, old_item, slot);
        }
    } else {
        log::info!("Player {:?} tried to unequip {:?}, but no ActiveEquipment row found.", sender_id, slot);
        // No row exists, so nothing to unequip. Not an error.
    }

    crate::armor_tracker::schedule_armor_recheck(ctx, sender_id);
    Ok(())
}

/// Returns the slot's previous content after writing the new one.
fn set_slot(equipment: &mut ActiveEquipment, slot: ArmorSlot, item: Option<String>) -> Option<String> {
    let field = match slot {
        ArmorSlot::Head => &mut equipment.head_item,
        ArmorSlot::Chest => &mut equipment.chest_item,
        ArmorSlot::Legs => &mut equipment.legs_item,
        ArmorSlot::Feet => &mut equipment.feet_item,
    };
    std::mem::replace(field, item)
}

/// Creates or retrieves a player's ActiveEquipment record.
fn get_or_create_active_equipment(ctx: &ReducerContext, player_id: Identity) -> Result<ActiveEquipment, String> {
    let table = ctx.db.active_equipment();
    if let Some(existing) = table.player_identity().find(player_id) {
        Ok(existing)
    } else {
        log::info!("Creating new ActiveEquipment row for player {:?}", player_id);
        let new_equip = ActiveEquipment {
            player_identity: player_id,
            head_item: None,
            chest_item: None,
            legs_item: None,
            feet_item: None,
        };
        table.insert(new_equip.clone());
        Ok(new_equip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacetimedb::Identity;

    fn bare_equipment() -> ActiveEquipment {
        ActiveEquipment {
            player_identity: Identity::from_byte_array([0u8; 32]),
            ..Default::default()
        }
    }

    #[test]
    fn empty_slots_are_not_armor() {
        assert!(!has_any_armor(&bare_equipment()));
    }

    #[test]
    fn any_single_slot_counts_as_armor() {
        for slot in [ArmorSlot::Head, ArmorSlot::Chest, ArmorSlot::Legs, ArmorSlot::Feet] {
            let mut equipment = bare_equipment();
            set_slot(&mut equipment, slot, Some("Iron Chestplate".to_string()));
            assert!(has_any_armor(&equipment), "{:?} slot should count", slot);
        }
    }

    #[test]
    fn non_armor_items_in_armor_slots_still_count() {
        // The check is on slot occupancy, not item kind.
        let mut equipment = bare_equipment();
        set_slot(&mut equipment, ArmorSlot::Head, Some("Pumpkin".to_string()));
        assert!(has_any_armor(&equipment));
    }

    #[test]
    fn set_slot_returns_replaced_item() {
        let mut equipment = bare_equipment();
        assert_eq!(set_slot(&mut equipment, ArmorSlot::Chest, Some("Tunic".to_string())), None);
        assert_eq!(
            set_slot(&mut equipment, ArmorSlot::Chest, None),
            Some("Tunic".to_string())
        );
        assert!(!has_any_armor(&equipment));
    }
}
