//! Normalized per-entity event structs and their `normalize` functions.
//!
//! Events arrive at the webhook boundary as untyped JSON maps; by the time
//! they reach this crate's [`crate::event_parser`] they have already been
//! classified by type. Each family gets its own struct with explicit
//! optionality instead of passing `serde_json::Value` deeper into the
//! pipeline.

use serde::Deserialize;

/// Strips the `|` line delimiter and non-ASCII bytes from a free-text field
/// before it reaches a pipe-delimited buffer line, composite key, or temp
/// table insert, truncating to the destination column's width. Grounded in
/// the original's `_norm_name`/`_form_str` sanitizers.
fn sanitize(v: &str, max_len: usize) -> String {
    let mut s: String = v.trim().replace('|', "/").chars().filter(|c| c.is_ascii()).collect();
    s.truncate(max_len);
    s
}

/// Sanitizes a gym/pokestop-style name destined for a `VARCHAR(50)` column.
/// Missing values normalize to an empty string.
pub fn sanitize_name(v: Option<&str>) -> String {
    sanitize(v.unwrap_or(""), 50)
}

/// Sanitizes a form/costume value destined for a `VARCHAR(15)` column.
/// Missing or blank values normalize to `"0"`.
pub fn sanitize_form(v: Option<&str>) -> String {
    let s = sanitize(v.unwrap_or(""), 15);
    if s.is_empty() { "0".to_string() } else { s }
}

/// Sanitizes a username destined for a `VARCHAR(255)` `utf8mb4` column.
/// Unlike [`sanitize_name`] this keeps non-ASCII characters (usernames are
/// stored as-is), but still strips the `|` delimiter so it can't break a
/// pipe-delimited composite key.
pub fn sanitize_username(v: &str) -> String {
    v.trim().replace('|', "/").chars().take(255).collect()
}

/// Rejects `(0, 0)`, out-of-range, or non-finite coordinates.
pub fn valid_coords(lat: f64, lon: f64) -> bool {
    if !lat.is_finite() || !lon.is_finite() {
        return false;
    }
    if lat == 0.0 && lon == 0.0 {
        return false;
    }
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonEvent {
    pub spawnpoint: String,
    pub pokemon_id: i32,
    #[serde(default)]
    pub form: Option<String>,
    pub iv: Option<u8>,
    pub area_id: i32,
    pub first_seen: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub username: Option<String>,
    #[serde(default)]
    pub shiny: Option<u8>,
}

impl PokemonEvent {
    pub fn form_or_default(&self) -> String {
        sanitize_form(self.form.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RaidEvent {
    pub raid_gym_id: String,
    pub raid_gym_name: Option<String>,
    pub raid_latitude: Option<f64>,
    pub raid_longitude: Option<f64>,
    #[serde(default)]
    pub raid_pokemon: Option<i32>,
    #[serde(default)]
    pub raid_form: Option<String>,
    #[serde(default)]
    pub raid_level: Option<i32>,
    #[serde(default)]
    pub raid_team_id: Option<i32>,
    #[serde(default)]
    pub raid_costume: Option<String>,
    #[serde(default)]
    pub raid_is_exclusive: Option<i32>,
    #[serde(default)]
    pub raid_ex_raid_eligible: Option<i32>,
    pub area_id: i32,
    pub raid_first_seen: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestEvent {
    pub pokestop_id: String,
    pub pokestop_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area_id: i32,
    pub first_seen: i64,
    #[serde(default)]
    pub ar_type: Option<i32>,
    #[serde(default)]
    pub normal_type: Option<i32>,
    #[serde(default)]
    pub reward_ar_poke_id: Option<i32>,
    #[serde(default)]
    pub reward_ar_poke_form: Option<String>,
    #[serde(default)]
    pub reward_ar_item_id: Option<i32>,
    #[serde(default)]
    pub reward_ar_item_amount: Option<i32>,
    #[serde(default)]
    pub reward_normal_poke_id: Option<i32>,
    #[serde(default)]
    pub reward_normal_poke_form: Option<String>,
    #[serde(default)]
    pub reward_normal_item_id: Option<i32>,
    #[serde(default)]
    pub reward_normal_item_amount: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvasionEvent {
    pub invasion_pokestop_id: String,
    pub invasion_pokestop_name: Option<String>,
    pub invasion_latitude: Option<f64>,
    pub invasion_longitude: Option<f64>,
    #[serde(default)]
    pub invasion_type: Option<i32>,
    #[serde(default)]
    pub invasion_character: Option<i32>,
    #[serde(default)]
    pub invasion_grunt_type: Option<i32>,
    #[serde(default)]
    pub invasion_confirmed: Option<i32>,
    pub area_id: i32,
    pub invasion_first_seen: i64,
}

/// What kind of reward a normalized quest resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestRewardKind {
    Item,
    Pokemon,
}

/// Fully resolved quest reward. Exactly one reward branch is populated;
/// fields for the unused branch are zeroed.
#[derive(Debug, Clone)]
pub struct QuestReward {
    pub kind: QuestRewardKind,
    pub item_id: i32,
    pub item_amount: i32,
    pub poke_id: i32,
    pub poke_form: String,
}

impl QuestEvent {
    /// mode: 0=normal, 1=ar
    pub fn mode(&self) -> i32 {
        if self.ar_type.unwrap_or(0) > 0 { 1 } else { 0 }
    }

    pub fn task_type(&self) -> i32 {
        if self.mode() == 1 {
            self.ar_type.unwrap_or(0)
        } else {
            self.normal_type.unwrap_or(0)
        }
    }

    /// Resolves the first usable reward (pokemon takes priority over item,
    /// matching `quests_bulk_buffer.py`'s `increment_event`).
    pub fn reward(&self) -> Option<QuestReward> {
        let ar = self.mode() == 1;
        let poke_id = if ar {
            self.reward_ar_poke_id
        } else {
            self.reward_normal_poke_id
        }
        .unwrap_or(0);
        let poke_form = if ar {
            self.reward_ar_poke_form.clone()
        } else {
            self.reward_normal_poke_form.clone()
        };
        let item_id = if ar {
            self.reward_ar_item_id
        } else {
            self.reward_normal_item_id
        }
        .unwrap_or(0);
        let item_amount = if ar {
            self.reward_ar_item_amount
        } else {
            self.reward_normal_item_amount
        }
        .unwrap_or(0);

        if poke_id > 0 {
            Some(QuestReward {
                kind: QuestRewardKind::Pokemon,
                item_id: 0,
                item_amount: 0,
                poke_id,
                poke_form: sanitize_form(poke_form.as_deref()),
            })
        } else if item_id > 0 {
            Some(QuestReward {
                kind: QuestRewardKind::Item,
                item_id,
                item_amount: if item_amount > 0 { item_amount } else { 1 },
                poke_id: 0,
                poke_form: String::new(),
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_strips_pipe_and_truncates() {
        let s = sanitize_name(Some("Town|Hall of a very long name indeed that goes past fifty characters"));
        assert!(!s.contains('|'));
        assert!(s.len() <= 50);
    }

    #[test]
    fn sanitize_name_drops_non_ascii() {
        assert_eq!(sanitize_name(Some("Café")), "Caf");
    }

    #[test]
    fn sanitize_form_defaults_to_zero() {
        assert_eq!(sanitize_form(None), "0");
        assert_eq!(sanitize_form(Some("")), "0");
        assert_eq!(sanitize_form(Some("fall_2024|evil")), "fall_2024/evil");
    }

    #[test]
    fn sanitize_username_keeps_unicode_but_strips_delimiter() {
        assert_eq!(sanitize_username("トレーナー|1"), "トレーナー/1");
    }

    #[test]
    fn rejects_null_island() {
        assert!(!valid_coords(0.0, 0.0));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(!valid_coords(91.0, 0.0));
        assert!(!valid_coords(0.0, 181.0));
        assert!(!valid_coords(f64::NAN, 12.0));
    }

    #[test]
    fn accepts_valid_coords() {
        assert!(valid_coords(40.7128, -74.0060));
    }

    #[test]
    fn quest_reward_prefers_pokemon_over_item() {
        let q = QuestEvent {
            pokestop_id: "abc".into(),
            pokestop_name: None,
            latitude: Some(1.0),
            longitude: Some(1.0),
            area_id: 1,
            first_seen: 0,
            ar_type: None,
            normal_type: Some(7),
            reward_ar_poke_id: None,
            reward_ar_poke_form: None,
            reward_ar_item_id: None,
            reward_ar_item_amount: None,
            reward_normal_poke_id: Some(25),
            reward_normal_poke_form: None,
            reward_normal_item_id: Some(1),
            reward_normal_item_amount: Some(5),
        };
        let r = q.reward().unwrap();
        assert_eq!(r.kind, QuestRewardKind::Pokemon);
        assert_eq!(r.poke_id, 25);
        assert_eq!(r.poke_form, "0");
    }

    #[test]
    fn quest_reward_falls_back_to_item() {
        let q = QuestEvent {
            pokestop_id: "abc".into(),
            pokestop_name: None,
            latitude: Some(1.0),
            longitude: Some(1.0),
            area_id: 1,
            first_seen: 0,
            ar_type: None,
            normal_type: Some(7),
            reward_ar_poke_id: None,
            reward_ar_poke_form: None,
            reward_ar_item_id: None,
            reward_ar_item_amount: None,
            reward_normal_poke_id: None,
            reward_normal_poke_form: None,
            reward_normal_item_id: Some(3),
            reward_normal_item_amount: None,
        };
        let r = q.reward().unwrap();
        assert_eq!(r.kind, QuestRewardKind::Item);
        assert_eq!(r.item_amount, 1);
    }
}
