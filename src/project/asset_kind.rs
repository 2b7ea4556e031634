//! Identifiers for room nodes in the project tree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a room node in the project tree opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    /// The room itself (settings, areas, backgrounds)
    Room,
    /// The room's property sheet only
    RoomSettings,
    RoomScript,
}

impl AssetKind {
    pub fn all() -> &'static [AssetKind] {
        &[AssetKind::Room, AssetKind::RoomSettings, AssetKind::RoomScript]
    }

    fn tag(self) -> &'static str {
        match self {
            AssetKind::Room => "room",
            AssetKind::RoomSettings => "room-settings",
            AssetKind::RoomScript => "room-script",
        }
    }

    /// Whether opening a node of this kind needs the room to be loaded.
    pub fn needs_loaded_room(self) -> bool {
        match self {
            AssetKind::Room | AssetKind::RoomSettings => true,
            AssetKind::RoomScript => false,
        }
    }
}

/// A node of the project tree, e.g. `room-script:4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetNodeId {
    pub kind: AssetKind,
    pub number: u32,
}

impl AssetNodeId {
    pub fn new(kind: AssetKind, number: u32) -> Self {
        Self { kind, number }
    }

    pub fn room(number: u32) -> Self {
        Self::new(AssetKind::Room, number)
    }

    pub fn script(number: u32) -> Self {
        Self::new(AssetKind::RoomScript, number)
    }
}

impl fmt::Display for AssetNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.tag(), self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a room node id")]
pub struct InvalidNodeId(pub String);

impl FromStr for AssetNodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidNodeId(s.to_string());
        let (tag, number) = s.rsplit_once(':').ok_or_else(invalid)?;
        let kind = AssetKind::all()
            .iter()
            .copied()
            .find(|k| k.tag() == tag)
            .ok_or_else(invalid)?;
        let number = number.parse().map_err(|_| invalid())?;
        Ok(Self { kind, number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display_and_parse() {
        for &kind in AssetKind::all() {
            let id = AssetNodeId::new(kind, 17);
            assert_eq!(id.to_string().parse::<AssetNodeId>(), Ok(id));
        }
        assert_eq!(AssetNodeId::script(3).to_string(), "room-script:3");
    }

    #[test]
    fn test_rejects_unknown_nodes() {
        assert!("character:3".parse::<AssetNodeId>().is_err());
        assert!("room".parse::<AssetNodeId>().is_err());
        assert!("room:x".parse::<AssetNodeId>().is_err());
        assert!("room:-1".parse::<AssetNodeId>().is_err());
    }

    #[test]
    fn test_scripts_open_without_loading_the_room() {
        assert!(AssetNodeId::room(1).kind.needs_loaded_room());
        assert!(!AssetNodeId::script(1).kind.needs_loaded_room());
    }
}
