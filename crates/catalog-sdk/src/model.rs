use std::collections::BTreeSet;

use control_proto::Direction;
use serde::Deserialize;

/// A script the display can run. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub id: String,
    pub name: String,
    pub requires_image: bool,
    pub is_playable: bool,
}

/// Snapshot of the backend's script listing.
///
/// `current_script_id` is either `None` or the id of one of `scripts`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    pub scripts: Vec<ScriptDescriptor>,
    pub current_script_id: Option<String>,
}

impl Catalog {
    pub fn get(&self, script_id: &str) -> Option<&ScriptDescriptor> {
        self.scripts.iter().find(|script| script.id == script_id)
    }

    pub fn current(&self) -> Option<&ScriptDescriptor> {
        self.current_script_id
            .as_deref()
            .and_then(|script_id| self.get(script_id))
    }

    pub fn is_current(&self, script_id: &str) -> bool {
        self.current_script_id.as_deref() == Some(script_id)
    }
}

/// Bounds a playable script exposes to its players.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableScriptMeta {
    pub script_id: String,
    pub min_players: u32,
    pub max_players: u32,
    pub supported_keys: BTreeSet<Direction>,
}

impl PlayableScriptMeta {
    pub fn accepts_slot(&self, slot: u32) -> bool {
        (1..=self.max_players).contains(&slot)
    }

    pub fn supports(&self, direction: Direction) -> bool {
        self.supported_keys.contains(&direction)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawScript {
    script_id: String,
    script_name: String,
    #[serde(default)]
    is_playable: bool,
    #[serde(default)]
    requires_image: bool,
}

impl From<RawScript> for ScriptDescriptor {
    fn from(raw: RawScript) -> Self {
        Self {
            id: raw.script_id,
            name: raw.script_name,
            requires_image: raw.requires_image,
            is_playable: raw.is_playable,
        }
    }
}

/// `GET /scripts` body. Older display builds served a bare list of names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawListing {
    Current {
        scripts: Vec<RawScript>,
        #[serde(default)]
        current_script: Option<RawScript>,
    },
    Legacy(Vec<String>),
}

impl From<RawListing> for Catalog {
    fn from(raw: RawListing) -> Self {
        match raw {
            RawListing::Current {
                scripts,
                current_script,
            } => {
                let mut scripts: Vec<ScriptDescriptor> =
                    scripts.into_iter().map(ScriptDescriptor::from).collect();
                let current_script_id = current_script.map(|raw| {
                    let current = ScriptDescriptor::from(raw);
                    let id = current.id.clone();
                    if !scripts.iter().any(|script| script.id == id) {
                        scripts.push(current);
                    }
                    id
                });
                Catalog {
                    scripts,
                    current_script_id,
                }
            }
            RawListing::Legacy(names) => Catalog {
                scripts: names
                    .into_iter()
                    .map(|name| ScriptDescriptor {
                        id: name.clone(),
                        name,
                        requires_image: false,
                        is_playable: false,
                    })
                    .collect(),
                current_script_id: None,
            },
        }
    }
}

/// `GET /scripts/{script_id}/playable` body.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPlayable {
    keys: Vec<Direction>,
    min_player_number: u32,
    max_player_number: u32,
}

impl RawPlayable {
    /// Returns `None` when the advertised bounds cannot describe a session.
    pub(crate) fn into_meta(self, script_id: &str) -> Option<PlayableScriptMeta> {
        if self.max_player_number < 1 || self.min_player_number > self.max_player_number {
            return None;
        }
        Some(PlayableScriptMeta {
            script_id: script_id.to_string(),
            min_players: self.min_player_number,
            max_players: self.max_player_number,
            supported_keys: self.keys.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(json: &str) -> Catalog {
        serde_json::from_str::<RawListing>(json)
            .expect("listing decodes")
            .into()
    }

    #[test]
    fn decodes_current_listing() {
        let catalog = listing(
            r#"{
                "scripts": [
                    {"script_id": "display_snake", "script_name": "snake", "is_playable": true},
                    {"script_id": "display_choose_image", "script_name": "image", "is_playable": false, "requires_image": true}
                ],
                "current_script": {"script_id": "display_snake", "script_name": "snake", "is_playable": true}
            }"#,
        );
        assert_eq!(catalog.scripts.len(), 2);
        assert_eq!(catalog.current_script_id.as_deref(), Some("display_snake"));
        assert!(catalog.current().unwrap().is_playable);
        assert!(catalog.get("display_choose_image").unwrap().requires_image);
    }

    #[test]
    fn null_current_script_means_nothing_active() {
        let catalog = listing(r#"{"scripts": [], "current_script": null}"#);
        assert!(catalog.current_script_id.is_none());
        assert!(catalog.current().is_none());
    }

    #[test]
    fn current_script_missing_from_list_is_added() {
        let catalog = listing(
            r#"{
                "scripts": [{"script_id": "off", "script_name": "off", "is_playable": false}],
                "current_script": {"script_id": "display_pong", "script_name": "pong", "is_playable": true}
            }"#,
        );
        assert_eq!(catalog.scripts.len(), 2);
        assert_eq!(catalog.current().unwrap().name, "pong");
    }

    #[test]
    fn decodes_legacy_name_list() {
        let catalog = listing(r#"["display_screensaver", "display_snow"]"#);
        assert_eq!(catalog.scripts.len(), 2);
        assert_eq!(catalog.scripts[0].id, "display_screensaver");
        assert!(!catalog.scripts[0].is_playable);
        assert!(catalog.current_script_id.is_none());
    }

    #[test]
    fn playable_meta_validates_bounds() {
        let raw: RawPlayable = serde_json::from_str(
            r#"{"keys": ["UP", "DOWN", "UP"], "min_player_number": 1, "max_player_number": 2}"#,
        )
        .unwrap();
        let meta = raw.into_meta("display_pong").expect("valid bounds");
        assert_eq!(meta.supported_keys.len(), 2);
        assert!(meta.accepts_slot(1));
        assert!(meta.accepts_slot(2));
        assert!(!meta.accepts_slot(0));
        assert!(!meta.accepts_slot(3));
        assert!(meta.supports(Direction::Up));
        assert!(!meta.supports(Direction::Left));

        let inverted: RawPlayable = serde_json::from_str(
            r#"{"keys": [], "min_player_number": 3, "max_player_number": 2}"#,
        )
        .unwrap();
        assert!(inverted.into_meta("broken").is_none());
    }
}
