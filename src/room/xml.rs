//! XML representation of the room data file (`room.xml`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    FIRST_XML_VERSION, LATEST_XML_VERSION, MAX_HOTSPOTS, MAX_OBJECTS, MAX_REGIONS,
    MAX_WALK_BEHINDS, MAX_WALKABLE_AREAS,
};

use super::bitmap::ColorDepth;
use super::error::{RoomError, RoomResult};
use super::model::{
    CustomProperties, Interactions, Room, RoomEvents, RoomHotspot, RoomObject, RoomRegion,
    RoomWalkBehind, RoomWalkableArea,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectList {
    #[serde(rename = "Object", default)]
    pub items: Vec<RoomObject>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotList {
    #[serde(rename = "Hotspot", default)]
    pub items: Vec<RoomHotspot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkableAreaList {
    #[serde(rename = "WalkableArea", default)]
    pub items: Vec<RoomWalkableArea>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkBehindList {
    #[serde(rename = "WalkBehind", default)]
    pub items: Vec<RoomWalkBehind>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionList {
    #[serde(rename = "Region", default)]
    pub items: Vec<RoomRegion>,
}

/// On-disk form of [`Room`]. Image data lives in separate PNG files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SavedRoom {
    #[serde(rename = "@Version")]
    pub version: String,
    pub number: u32,
    #[serde(default)]
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub color_depth: u32,
    #[serde(default = "default_mask_resolution")]
    pub mask_resolution: u32,
    #[serde(default = "default_background_count")]
    pub background_count: usize,
    #[serde(default)]
    pub background_animation_delay: u32,
    #[serde(default)]
    pub background_anim_enabled: bool,
    #[serde(default)]
    pub left_edge_x: i32,
    #[serde(default)]
    pub right_edge_x: i32,
    #[serde(default)]
    pub top_edge_y: i32,
    #[serde(default)]
    pub bottom_edge_y: i32,
    #[serde(default)]
    pub show_player_character: bool,
    #[serde(default)]
    pub player_character_view: i32,
    #[serde(default)]
    pub properties: CustomProperties,
    #[serde(default)]
    pub events: RoomEvents,
    #[serde(default)]
    pub interactions: Interactions,
    #[serde(default)]
    pub objects: ObjectList,
    #[serde(default)]
    pub hotspots: HotspotList,
    #[serde(default)]
    pub walkable_areas: WalkableAreaList,
    #[serde(default)]
    pub walk_behinds: WalkBehindList,
    #[serde(default)]
    pub regions: RegionList,
}

fn default_mask_resolution() -> u32 {
    1
}

fn default_background_count() -> usize {
    1
}

impl SavedRoom {
    pub fn from_room(room: &Room) -> Self {
        Self {
            version: LATEST_XML_VERSION.to_string(),
            number: room.number,
            description: room.description.clone(),
            width: room.width,
            height: room.height,
            color_depth: room.color_depth.bits(),
            mask_resolution: room.mask_resolution,
            background_count: room.background_count,
            background_animation_delay: room.background_animation_delay,
            background_anim_enabled: room.background_anim_enabled,
            left_edge_x: room.left_edge_x,
            right_edge_x: room.right_edge_x,
            top_edge_y: room.top_edge_y,
            bottom_edge_y: room.bottom_edge_y,
            show_player_character: room.show_player_character,
            player_character_view: room.player_character_view,
            properties: room.properties.clone(),
            events: room.events.clone(),
            interactions: room.interactions.clone(),
            objects: ObjectList {
                items: room.objects.clone(),
            },
            hotspots: HotspotList {
                items: room.hotspots.clone(),
            },
            walkable_areas: WalkableAreaList {
                items: room.walkable_areas.clone(),
            },
            walk_behinds: WalkBehindList {
                items: room.walk_behinds.clone(),
            },
            regions: RegionList {
                items: room.regions.clone(),
            },
        }
    }

    /// Copies every serialized field into `room`, keeping its runtime state
    /// (modified flag) untouched.
    pub fn apply_to(self, room: &mut Room, path: &Path) -> RoomResult<()> {
        let version = normalize_version(&self.version).ok_or_else(|| RoomError::InvalidData {
            path: path.to_path_buf(),
            message: format!("unrecognized room data version \"{}\"", self.version),
        })?;
        let color_depth =
            ColorDepth::from_bits(self.color_depth).ok_or_else(|| RoomError::InvalidData {
                path: path.to_path_buf(),
                message: format!("unsupported colour depth {}", self.color_depth),
            })?;

        room.saved_xml_version = Some(version);
        room.number = self.number;
        room.description = self.description;
        room.width = self.width;
        room.height = self.height;
        room.color_depth = color_depth;
        room.mask_resolution = self.mask_resolution.max(1);
        room.background_count = self.background_count.max(1);
        room.background_animation_delay = self.background_animation_delay;
        room.background_anim_enabled = self.background_anim_enabled;
        room.left_edge_x = self.left_edge_x;
        room.right_edge_x = self.right_edge_x;
        room.top_edge_y = self.top_edge_y;
        room.bottom_edge_y = self.bottom_edge_y;
        room.show_player_character = self.show_player_character;
        room.player_character_view = self.player_character_view;
        room.properties = self.properties;
        room.events = self.events;
        room.interactions = self.interactions;

        room.objects = self.objects.items;
        room.objects.truncate(MAX_OBJECTS);
        room.hotspots = fill_to(self.hotspots.items, MAX_HOTSPOTS, RoomHotspot::new);
        room.walkable_areas =
            fill_to(self.walkable_areas.items, MAX_WALKABLE_AREAS, RoomWalkableArea::new);
        room.walk_behinds = fill_to(self.walk_behinds.items, MAX_WALK_BEHINDS, RoomWalkBehind::new);
        room.regions = fill_to(self.regions.items, MAX_REGIONS, RoomRegion::new);
        Ok(())
    }

    pub fn into_room(self, path: &Path) -> RoomResult<Room> {
        let mut room = Room::new(self.number);
        self.apply_to(&mut room, path)?;
        Ok(room)
    }
}

/// Truncates to `limit` entries and pads missing trailing entries with defaults.
fn fill_to<T>(mut items: Vec<T>, limit: usize, make: impl Fn(u32) -> T) -> Vec<T> {
    items.truncate(limit);
    while items.len() < limit {
        items.push(make(items.len() as u32));
    }
    items
}

/// Maps the `Version` attribute to a dotted version string.
///
/// Plain integers come from the first XML release, which numbered its files.
fn normalize_version(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.parse::<u32>().is_ok() {
        return Some(FIRST_XML_VERSION.to_string());
    }
    let parts: Vec<&str> = raw.split('.').collect();
    let valid = parts.len() >= 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    valid.then(|| raw.to_string())
}

pub fn room_to_xml(room: &Room, path: &Path) -> RoomResult<String> {
    let saved = SavedRoom::from_room(room);
    let body = quick_xml::se::to_string_with_root("Room", &saved).map_err(|e| {
        RoomError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n{body}\n"))
}

pub fn room_from_xml(xml: &str, path: &Path) -> RoomResult<SavedRoom> {
    quick_xml::de::from_str::<SavedRoom>(xml).map_err(|e| RoomError::InvalidData {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn read_room_xml(path: &Path) -> RoomResult<SavedRoom> {
    let xml = std::fs::read_to_string(path).map_err(RoomError::io(path))?;
    room_from_xml(&xml, path)
}

pub fn write_room_xml(room: &Room, path: &Path) -> RoomResult<()> {
    let xml = room_to_xml(room, path)?;
    std::fs::write(path, xml).map_err(RoomError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("room.xml")
    }

    #[test]
    fn test_room_xml_round_trip() {
        let mut room = Room::new(4);
        room.description = "Town square".to_string();
        room.mask_resolution = 2;
        room.background_count = 3;
        room.objects.push(RoomObject::new(0));
        room.hotspots[3].name = "hDoor".to_string();
        room.hotspots[3].properties.set("Locked", "yes");
        room.regions[2].light_level = -20;
        room.events.on_load = "room_Load".to_string();

        let xml = room_to_xml(&room, &path()).unwrap();
        assert!(xml.contains("Version=\"4.00.00.21\""));

        let parsed = room_from_xml(&xml, &path()).unwrap().into_room(&path()).unwrap();
        assert_eq!(parsed.description, room.description);
        assert_eq!(parsed.mask_resolution, 2);
        assert_eq!(parsed.background_count, 3);
        assert_eq!(parsed.objects, room.objects);
        assert_eq!(parsed.hotspots, room.hotspots);
        assert_eq!(parsed.regions, room.regions);
        assert_eq!(parsed.events, room.events);
        assert_eq!(parsed.saved_xml_version.as_deref(), Some(LATEST_XML_VERSION));
    }

    #[test]
    fn test_integer_version_maps_to_first_xml_version() {
        assert_eq!(normalize_version("1"), Some(FIRST_XML_VERSION.to_string()));
        assert_eq!(normalize_version("3.6.0.1"), Some("3.6.0.1".to_string()));
        assert_eq!(normalize_version("banana"), None);
        assert_eq!(normalize_version("4..1"), None);
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let mut saved = SavedRoom::from_room(&Room::new(1));
        saved.version = "not-a-version".to_string();
        let err = saved.into_room(&path()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidData { .. }));
    }

    #[test]
    fn test_collections_are_truncated_and_padded() {
        let mut saved = SavedRoom::from_room(&Room::new(1));
        saved.hotspots.items.truncate(3);
        saved.regions.items = (0..40).map(RoomRegion::new).collect();
        let room = saved.into_room(&path()).unwrap();
        assert_eq!(room.hotspots.len(), MAX_HOTSPOTS);
        assert_eq!(room.hotspots[10].id, 10);
        assert_eq!(room.regions.len(), MAX_REGIONS);
    }

    #[test]
    fn test_unparsable_xml_is_invalid_data() {
        let err = room_from_xml("<Room><Number>oops", &path()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidData { .. }));
    }
}
