/******************************************************************************
 *                                                                            *
 * Persisted registry of dead players awaiting revival. The registry is a    *
 * set of identities mirrored into a single-row document of identifier       *
 * strings, rewritten wholesale on every mutation so it can be inspected or  *
 * hand-edited between runs.                                                 *
 *                                                                            *
 ******************************************************************************/

use spacetimedb::{table, Identity, Timestamp, ReducerContext, Table};
use log;

// One row per currently-dead player. Present iff the player is dead and
// awaiting an operator revive.
#[table(name = dead_player, public)]
#[derive(Clone, Debug)]
pub struct DeadPlayer {
    #[primary_key]
    pub player_id: Identity,
    pub died_at: Timestamp,
}

// The persisted document: a single record holding the registry as a list of
// identifier strings. Row id is always 0.
#[table(name = dead_player_document)]
#[derive(Clone, Debug)]
pub struct DeadPlayerDocument {
    #[primary_key]
    pub id: u8,
    pub dead_players: Vec<String>,
}

/// Creates the document row if it does not exist yet.
pub fn init_dead_player_document(ctx: &ReducerContext) -> Result<(), String> {
    let documents = ctx.db.dead_player_document();
    if documents.id().find(0).is_none() {
        match documents.try_insert(DeadPlayerDocument { id: 0, dead_players: Vec::new() }) {
            Ok(_) => log::info!("Created empty dead player document."),
            Err(e) => {
                log::error!("Could not create dead player document: {}", e);
                return Err(format!("Failed to create dead player document: {}", e));
            }
        }
    }
    Ok(())
}

/// Loads the registry from the persisted document, replacing the current
/// registry rows. Malformed identifier strings are logged and dropped from
/// the working set; they stay in the document until the next save.
pub fn load_dead_players(ctx: &ReducerContext) {
    let registry = ctx.db.dead_player();
    for row in registry.iter().collect::<Vec<_>>() {
        registry.player_id().delete(&row.player_id);
    }

    let stored = match ctx.db.dead_player_document().id().find(0) {
        Some(doc) => doc.dead_players,
        None => Vec::new(),
    };

    let mut loaded = 0usize;
    for id_string in &stored {
        match parse_player_id(id_string) {
            Some(player_id) => {
                if registry.player_id().find(&player_id).is_none() {
                    registry.insert(DeadPlayer { player_id, died_at: ctx.timestamp });
                    loaded += 1;
                }
            }
            None => {
                log::warn!("Invalid player id in dead player document: {}", id_string);
            }
        }
    }
    log::info!("Loaded {} dead players from document.", loaded);
}

/// Rewrites the persisted document from the current registry rows. On
/// failure the error is logged and swallowed; the registry stays
/// authoritative and the next successful save reconciles the document.
pub fn save_dead_players(ctx: &ReducerContext) {
    let id_strings = serialize_player_ids(
        ctx.db.dead_player().iter().map(|row| row.player_id),
    );
    let documents = ctx.db.dead_player_document();
    let doc = DeadPlayerDocument { id: 0, dead_players: id_strings };
    if documents.id().find(0).is_some() {
        documents.id().update(doc);
    } else if let Err(e) = documents.try_insert(doc) {
        log::error!("Could not save dead player document: {}", e);
    }
}

/// Inserts the player into the registry and rewrites the document.
/// Idempotent: marking an already-dead player dead again keeps the original
/// death timestamp.
pub fn mark_dead(ctx: &ReducerContext, player_id: Identity) {
    let registry = ctx.db.dead_player();
    if registry.player_id().find(&player_id).is_none() {
        registry.insert(DeadPlayer { player_id, died_at: ctx.timestamp });
    }
    save_dead_players(ctx);
}

/// Removes the player from the registry and rewrites the document. A no-op
/// removal still triggers a save, matching the mutate-then-save contract.
pub fn mark_revived(ctx: &ReducerContext, player_id: Identity) {
    ctx.db.dead_player().player_id().delete(&player_id);
    save_dead_players(ctx);
}

/// Pure membership query, no side effects.
pub fn is_dead(ctx: &ReducerContext, player_id: Identity) -> bool {
    ctx.db.dead_player().player_id().find(&player_id).is_some()
}

fn parse_player_id(id_string: &str) -> Option<Identity> {
    Identity::from_hex(id_string).ok()
}

// Sorted so the document is stable across rewrites of the same set.
fn serialize_player_ids(ids: impl Iterator<Item = Identity>) -> Vec<String> {
    let mut id_strings: Vec<String> = ids.map(|id| id.to_hex().to_string()).collect();
    id_strings.sort();
    id_strings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(fill: u8) -> Identity {
        Identity::from_byte_array([fill; 32])
    }

    #[test]
    fn round_trips_valid_ids_through_strings() {
        let ids = vec![identity(1), identity(2), identity(3)];
        let strings = serialize_player_ids(ids.iter().copied());
        assert_eq!(strings.len(), 3);

        let reparsed: Vec<Identity> = strings
            .iter()
            .map(|s| parse_player_id(s).expect("stored id should parse"))
            .collect();
        for id in &ids {
            assert!(reparsed.contains(id));
        }
    }

    #[test]
    fn serialization_is_order_stable() {
        let forward = serialize_player_ids(vec![identity(1), identity(9)].into_iter());
        let backward = serialize_player_ids(vec![identity(9), identity(1)].into_iter());
        assert_eq!(forward, backward);
    }

    #[test]
    fn malformed_strings_are_rejected_individually() {
        assert!(parse_player_id("not-a-hex-identity").is_none());
        assert!(parse_player_id("").is_none());
        assert!(parse_player_id("abc123").is_none()); // too short

        let valid = identity(7).to_hex().to_string();
        assert!(parse_player_id(&valid).is_some());
    }
}
