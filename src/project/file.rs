//! The project settings file (`project.json`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ROOM_HEIGHT, DEFAULT_ROOM_WIDTH, HIGHEST_ROOM_NUMBER};
use crate::room::{GamePalette, RoomError, RoomFormatState, RoomResult, UnloadedRoom};

/// Game-wide settings the room pipeline depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    #[serde(default = "default_mask_resolution")]
    pub default_room_mask_resolution: u32,
    /// 8, 16 or 32
    #[serde(default = "default_color_depth")]
    pub color_depth: u32,
    #[serde(default = "default_room_width")]
    pub room_width: u32,
    #[serde(default = "default_room_height")]
    pub room_height: u32,
    #[serde(default)]
    pub palette: GamePalette,
}

fn default_mask_resolution() -> u32 {
    1
}

fn default_color_depth() -> u32 {
    32
}

fn default_room_width() -> u32 {
    DEFAULT_ROOM_WIDTH
}

fn default_room_height() -> u32 {
    DEFAULT_ROOM_HEIGHT
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            default_room_mask_resolution: default_mask_resolution(),
            color_depth: default_color_depth(),
            room_width: DEFAULT_ROOM_WIDTH,
            room_height: DEFAULT_ROOM_HEIGHT,
            palette: GamePalette::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectFile {
    pub name: String,
    #[serde(default)]
    pub settings: GameSettings,
    /// Sorted by number
    #[serde(default)]
    pub rooms: Vec<UnloadedRoom>,
    #[serde(default)]
    pub room_format: RoomFormatState,
}

impl ProjectFile {
    /// A new project whose rooms start out in open format.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            room_format: RoomFormatState::open(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> RoomResult<Self> {
        let json = std::fs::read_to_string(path).map_err(RoomError::io(path))?;
        let mut file: Self = serde_json::from_str(&json).map_err(|e| RoomError::Project {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        file.rooms.sort_by_key(|r| r.number);
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> RoomResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RoomError::Project {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(RoomError::io(path))
    }

    pub fn room(&self, number: u32) -> Option<&UnloadedRoom> {
        self.rooms.iter().find(|r| r.number == number)
    }

    /// Adds a room, keeping the list sorted. Returns false if the number is taken.
    pub fn add_room(&mut self, room: UnloadedRoom) -> bool {
        match self.rooms.binary_search_by_key(&room.number, |r| r.number) {
            Ok(_) => false,
            Err(pos) => {
                self.rooms.insert(pos, room);
                true
            }
        }
    }

    pub fn remove_room(&mut self, number: u32) -> Option<UnloadedRoom> {
        let pos = self.rooms.iter().position(|r| r.number == number)?;
        Some(self.rooms.remove(pos))
    }

    /// Lowest room number not used by the project.
    pub fn next_free_room_number(&self) -> Option<u32> {
        (0..=HIGHEST_ROOM_NUMBER).find(|n| self.room(*n).is_none())
    }

    /// Restores sort order after a room was renumbered in place.
    pub fn sort_rooms(&mut self) {
        self.rooms.sort_by_key(|r| r.number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomFormatVersion;
    use tempfile::TempDir;

    #[test]
    fn test_missing_fields_take_defaults() {
        let file: ProjectFile = serde_json::from_str(r#"{"name": "Game"}"#).unwrap();
        assert_eq!(file.settings, GameSettings::default());
        assert!(file.rooms.is_empty());
        assert_eq!(file.room_format.version, RoomFormatVersion::Legacy);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.json");
        let mut file = ProjectFile::new("Game");
        file.settings.default_room_mask_resolution = 2;
        file.add_room(UnloadedRoom::new(5, "Street"));
        file.add_room(UnloadedRoom::new(1, "Intro"));
        file.save(&path).unwrap();

        let loaded = ProjectFile::load(&path).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.rooms[0].number, 1);
        assert!(loaded.room_format.is_open());
    }

    #[test]
    fn test_corrupt_file_is_a_project_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            ProjectFile::load(&path),
            Err(RoomError::Project { .. })
        ));
    }

    #[test]
    fn test_room_list_management() {
        let mut file = ProjectFile::new("Game");
        assert!(file.add_room(UnloadedRoom::new(0, "")));
        assert!(file.add_room(UnloadedRoom::new(2, "")));
        assert!(!file.add_room(UnloadedRoom::new(2, "again")));
        assert_eq!(file.next_free_room_number(), Some(1));

        assert_eq!(file.remove_room(2).map(|r| r.number), Some(2));
        assert!(file.remove_room(2).is_none());
        assert_eq!(file.rooms.len(), 1);
    }
}
