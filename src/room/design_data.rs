//! Design-time room preferences (`roomN.crm.user`).
//!
//! Holds editor-only state such as layer visibility. Nothing in here affects
//! the game, so a broken file is reported and then ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{RoomError, RoomResult};

const DATA_VERSION_INDEX: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DesignItem {
    #[serde(rename = "@ID")]
    pub id: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesignItems {
    #[serde(rename = "Item", default)]
    pub items: Vec<DesignItem>,
}

/// Visibility and lock state of one editor layer and its items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DesignLayer {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub items: DesignItems,
}

impl DesignLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            locked: false,
            items: DesignItems::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesignLayers {
    #[serde(rename = "Layer", default)]
    pub layers: Vec<DesignLayer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesignRoom {
    #[serde(rename = "Layers", default)]
    pub layers: DesignLayers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DesignFile {
    #[serde(rename = "@VersionIndex")]
    version_index: u32,
    #[serde(rename = "Room", default)]
    room: DesignRoom,
}

/// Design-time state of the loaded room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomDesignData {
    pub room: DesignRoom,
}

impl RoomDesignData {
    pub fn layer(&self, name: &str) -> Option<&DesignLayer> {
        self.room.layers.layers.iter().find(|l| l.name == name)
    }

    /// Returns the named layer, creating it with default state if needed.
    pub fn layer_mut(&mut self, name: &str) -> &mut DesignLayer {
        let layers = &mut self.room.layers.layers;
        let index = match layers.iter().position(|l| l.name == name) {
            Some(index) => index,
            None => {
                layers.push(DesignLayer::new(name));
                layers.len() - 1
            }
        };
        &mut layers[index]
    }

    /// Reads the sidecar. A missing file gives the default state.
    pub fn load(path: &Path) -> RoomResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let xml = std::fs::read_to_string(path).map_err(RoomError::io(path))?;
        let invalid = |message: String| RoomError::InvalidData {
            path: path.to_path_buf(),
            message,
        };

        if !xml.contains("<AGSRoomUserData") {
            return Err(invalid(
                "not a room user data file; it was corrupted, edited by hand or saved by an incompatible version".to_string(),
            ));
        }
        let file: DesignFile = quick_xml::de::from_str(&xml).map_err(|e| invalid(e.to_string()))?;
        if file.version_index < 1 || file.version_index > DATA_VERSION_INDEX {
            return Err(invalid(format!(
                "user data version {} is from a newer or unsupported editor",
                file.version_index
            )));
        }
        Ok(Self { room: file.room })
    }

    pub fn save(&self, path: &Path) -> RoomResult<()> {
        let file = DesignFile {
            version_index: DATA_VERSION_INDEX,
            room: self.room.clone(),
        };
        let body = quick_xml::se::to_string_with_root("AGSRoomUserData", &file).map_err(|e| {
            RoomError::Serialize {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<!--DO NOT EDIT THIS FILE. It is automatically generated by the editor.-->\n{body}\n"
        );
        std::fs::write(path, xml).map_err(RoomError::io(path))
    }
}

fn default_visible() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let data = RoomDesignData::load(&dir.path().join("room1.crm.user")).unwrap();
        assert_eq!(data, RoomDesignData::default());
    }

    #[test]
    fn test_design_data_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("room1.crm.user");

        let mut data = RoomDesignData::default();
        let objects = data.layer_mut("Objects");
        objects.locked = true;
        objects.items.items.push(DesignItem {
            id: "oDoor".to_string(),
            visible: false,
            locked: true,
        });
        data.layer_mut("Hotspots").visible = false;
        data.save(&path).unwrap();

        let loaded = RoomDesignData::load(&path).unwrap();
        assert_eq!(loaded, data);
        assert!(!loaded.layer("Hotspots").unwrap().visible);
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("room1.crm.user");
        std::fs::write(&path, "<Something VersionIndex=\"1\"/>").unwrap();
        assert!(matches!(
            RoomDesignData::load(&path),
            Err(RoomError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("room1.crm.user");
        std::fs::write(&path, "<AGSRoomUserData VersionIndex=\"7\"></AGSRoomUserData>").unwrap();
        assert!(RoomDesignData::load(&path).is_err());
    }

    #[test]
    fn test_layer_mut_creates_once() {
        let mut data = RoomDesignData::default();
        data.layer_mut("Regions");
        data.layer_mut("Regions").locked = true;
        assert_eq!(data.room.layers.layers.len(), 1);
        assert!(data.layer("Regions").unwrap().locked);
    }
}
