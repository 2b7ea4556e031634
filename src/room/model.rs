//! Room data model.
//!
//! [`Room`] is the runtime model of one fully loaded room; [`UnloadedRoom`] is
//! the lightweight handle the project keeps for every room. Area types
//! (hotspots, objects, ...) are shared with the XML format in [`super::xml`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ROOM_HEIGHT, DEFAULT_ROOM_WIDTH, MAX_HOTSPOTS, MAX_REGIONS, MAX_WALK_BEHINDS,
    MAX_WALKABLE_AREAS,
};

use super::bitmap::ColorDepth;

/// Kind of area mask. `None` is a sentinel and never names a stored mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomAreaMaskType {
    None,
    Hotspots,
    WalkableAreas,
    WalkBehinds,
    Regions,
}

impl RoomAreaMaskType {
    /// Every real mask type, in storage order.
    pub fn all() -> &'static [RoomAreaMaskType] {
        &[
            RoomAreaMaskType::Hotspots,
            RoomAreaMaskType::WalkableAreas,
            RoomAreaMaskType::WalkBehinds,
            RoomAreaMaskType::Regions,
        ]
    }

    /// Position in a mask cache, `None` for the sentinel.
    pub fn slot(self) -> Option<usize> {
        match self {
            RoomAreaMaskType::None => None,
            RoomAreaMaskType::Hotspots => Some(0),
            RoomAreaMaskType::WalkableAreas => Some(1),
            RoomAreaMaskType::WalkBehinds => Some(2),
            RoomAreaMaskType::Regions => Some(3),
        }
    }

    /// Pixel values must stay below this; 0 always means "no area".
    pub fn max_color(self) -> Option<usize> {
        match self {
            RoomAreaMaskType::None => None,
            RoomAreaMaskType::Hotspots => Some(MAX_HOTSPOTS),
            RoomAreaMaskType::WalkableAreas => Some(MAX_WALKABLE_AREAS),
            RoomAreaMaskType::WalkBehinds => Some(MAX_WALK_BEHINDS),
            RoomAreaMaskType::Regions => Some(MAX_REGIONS),
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            RoomAreaMaskType::None => "none",
            RoomAreaMaskType::Hotspots => "hotspots",
            RoomAreaMaskType::WalkableAreas => "walkable_areas",
            RoomAreaMaskType::WalkBehinds => "walk_behinds",
            RoomAreaMaskType::Regions => "regions",
        }
    }
}

impl fmt::Display for RoomAreaMaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomAreaMaskType::None => "None",
            RoomAreaMaskType::Hotspots => "Hotspots",
            RoomAreaMaskType::WalkableAreas => "WalkableAreas",
            RoomAreaMaskType::WalkBehinds => "WalkBehinds",
            RoomAreaMaskType::Regions => "Regions",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProperty {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Value", default)]
    pub value: String,
}

/// Name/value pairs attached to a room or one of its areas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomProperties {
    #[serde(rename = "Property", default)]
    pub entries: Vec<CustomProperty>,
}

impl CustomProperties {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.entries.push(CustomProperty {
                name: name.to_string(),
                value,
            }),
        }
    }
}

/// Script functions attached to an area's interactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Interactions {
    #[serde(default)]
    pub script_module: String,
    #[serde(rename = "Event", default)]
    pub events: Vec<InteractionEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    #[serde(rename = "@Name")]
    pub name: String,
    #[serde(rename = "@Function", default)]
    pub function: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomHotspot {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub walk_to_x: i32,
    #[serde(default)]
    pub walk_to_y: i32,
    #[serde(default)]
    pub properties: CustomProperties,
    #[serde(default)]
    pub interactions: Interactions,
}

impl RoomHotspot {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: if id == 0 { String::new() } else { format!("hHotspot{id}") },
            description: if id == 0 {
                "No hotspot".to_string()
            } else {
                format!("Hotspot {id}")
            },
            walk_to_x: 0,
            walk_to_y: 0,
            properties: CustomProperties::default(),
            interactions: Interactions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomObject {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: u32,
    #[serde(default)]
    pub start_x: i32,
    #[serde(default)]
    pub start_y: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub clickable: bool,
    #[serde(default)]
    pub baseline: i32,
    #[serde(default)]
    pub properties: CustomProperties,
    #[serde(default)]
    pub interactions: Interactions,
}

impl RoomObject {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: format!("oObject{id}"),
            description: "Object".to_string(),
            image: 0,
            start_x: 0,
            start_y: 0,
            visible: true,
            clickable: true,
            baseline: 0,
            properties: CustomProperties::default(),
            interactions: Interactions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomWalkableArea {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub area_specific_view: i32,
    #[serde(default = "default_scaling")]
    pub scaling_level_min: i32,
    #[serde(default = "default_scaling")]
    pub scaling_level_max: i32,
    #[serde(default)]
    pub use_continuous_scaling: bool,
    #[serde(default)]
    pub properties: CustomProperties,
}

impl RoomWalkableArea {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            area_specific_view: 0,
            scaling_level_min: default_scaling(),
            scaling_level_max: default_scaling(),
            use_continuous_scaling: false,
            properties: CustomProperties::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomWalkBehind {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub baseline: i32,
}

impl RoomWalkBehind {
    pub fn new(id: u32) -> Self {
        Self { id, baseline: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomRegion {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub light_level: i32,
    #[serde(default)]
    pub use_colour_tint: bool,
    #[serde(default)]
    pub tint_red: u8,
    #[serde(default)]
    pub tint_green: u8,
    #[serde(default)]
    pub tint_blue: u8,
    #[serde(default)]
    pub tint_saturation: u8,
    #[serde(default)]
    pub properties: CustomProperties,
    #[serde(default)]
    pub interactions: Interactions,
}

impl RoomRegion {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            name: String::new(),
            light_level: 0,
            use_colour_tint: false,
            tint_red: 0,
            tint_green: 0,
            tint_blue: 0,
            tint_saturation: 0,
            properties: CustomProperties::default(),
            interactions: Interactions::default(),
        }
    }
}

/// Names of the room's own event handler functions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomEvents {
    #[serde(default)]
    pub on_load: String,
    #[serde(default)]
    pub on_first_time_enter: String,
    #[serde(default)]
    pub on_after_fade_in: String,
    #[serde(default)]
    pub on_before_fade_out: String,
    #[serde(default)]
    pub on_unload: String,
    #[serde(default)]
    pub on_rep_exec: String,
    #[serde(default)]
    pub on_leave_left: String,
    #[serde(default)]
    pub on_leave_right: String,
    #[serde(default)]
    pub on_leave_top: String,
    #[serde(default)]
    pub on_leave_bottom: String,
}

fn default_true() -> bool {
    true
}

fn default_scaling() -> i32 {
    100
}

/// Lightweight handle for a room the project knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloadedRoom {
    pub number: u32,
    #[serde(default)]
    pub description: String,
}

impl UnloadedRoom {
    pub fn new(number: u32, description: impl Into<String>) -> Self {
        Self {
            number,
            description: description.into(),
        }
    }
}

/// A fully loaded room.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub number: u32,
    pub description: String,
    pub width: u32,
    pub height: u32,
    pub color_depth: ColorDepth,
    pub mask_resolution: u32,
    pub background_count: usize,
    pub background_animation_delay: u32,
    pub background_anim_enabled: bool,
    pub left_edge_x: i32,
    pub right_edge_x: i32,
    pub top_edge_y: i32,
    pub bottom_edge_y: i32,
    pub show_player_character: bool,
    pub player_character_view: i32,
    pub properties: CustomProperties,
    pub events: RoomEvents,
    pub interactions: Interactions,
    pub objects: Vec<RoomObject>,
    pub hotspots: Vec<RoomHotspot>,
    pub walkable_areas: Vec<RoomWalkableArea>,
    pub walk_behinds: Vec<RoomWalkBehind>,
    pub regions: Vec<RoomRegion>,
    /// Version of the data file this room was read from, `None` for new rooms
    pub saved_xml_version: Option<String>,
    modified: bool,
}

impl Room {
    /// Creates an empty room with the default set of areas.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            description: String::new(),
            width: DEFAULT_ROOM_WIDTH,
            height: DEFAULT_ROOM_HEIGHT,
            color_depth: ColorDepth::default(),
            mask_resolution: 1,
            background_count: 1,
            background_animation_delay: 5,
            background_anim_enabled: true,
            left_edge_x: 0,
            right_edge_x: DEFAULT_ROOM_WIDTH as i32 - 1,
            top_edge_y: 0,
            bottom_edge_y: DEFAULT_ROOM_HEIGHT as i32 - 1,
            show_player_character: true,
            player_character_view: 0,
            properties: CustomProperties::default(),
            events: RoomEvents::default(),
            interactions: Interactions::default(),
            objects: Vec::new(),
            hotspots: (0..MAX_HOTSPOTS as u32).map(RoomHotspot::new).collect(),
            walkable_areas: (0..MAX_WALKABLE_AREAS as u32)
                .map(RoomWalkableArea::new)
                .collect(),
            walk_behinds: (0..MAX_WALK_BEHINDS as u32).map(RoomWalkBehind::new).collect(),
            regions: (0..MAX_REGIONS as u32).map(RoomRegion::new).collect(),
            saved_xml_version: None,
            modified: false,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Marks the room modified if `changed` is true; never clears the flag.
    pub fn mark_modified_if(&mut self, changed: bool) {
        self.modified |= changed;
    }

    /// File name of the room script module
    pub fn script_module_name(&self) -> String {
        format!("room{}.asc", self.number)
    }

    /// Whether a script name is already taken by a hotspot or object other
    /// than the one being renamed (identified by kind and id).
    pub fn is_script_name_used(&self, name: &str, ignore: Option<(AreaRef, u32)>) -> bool {
        if name.is_empty() {
            return false;
        }
        let hotspot_clash = self
            .hotspots
            .iter()
            .any(|h| h.name == name && ignore != Some((AreaRef::Hotspot, h.id)));
        let object_clash = self
            .objects
            .iter()
            .any(|o| o.name == name && ignore != Some((AreaRef::Object, o.id)));
        hotspot_clash || object_clash
    }

    /// Points every interaction table at this room's script module.
    pub fn sync_interaction_script_modules(&mut self) {
        let module = self.script_module_name();
        self.interactions.script_module = module.clone();
        for obj in &mut self.objects {
            obj.interactions.script_module = module.clone();
        }
        for hotspot in &mut self.hotspots {
            hotspot.interactions.script_module = module.clone();
        }
        for region in &mut self.regions {
            region.interactions.script_module = module.clone();
        }
    }
}

/// Kinds of named room areas, used to identify which item is being renamed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaRef {
    Hotspot,
    Object,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_room_has_default_areas() {
        let room = Room::new(3);
        assert_eq!(room.hotspots.len(), MAX_HOTSPOTS);
        assert_eq!(room.walkable_areas.len(), MAX_WALKABLE_AREAS);
        assert_eq!(room.walk_behinds.len(), MAX_WALK_BEHINDS);
        assert_eq!(room.regions.len(), MAX_REGIONS);
        assert!(room.objects.is_empty());
        assert_eq!(room.background_count, 1);
        assert_eq!(room.mask_resolution, 1);
        assert!(!room.is_modified());
    }

    #[test]
    fn test_mask_type_slots_exclude_none() {
        assert_eq!(RoomAreaMaskType::None.slot(), None);
        assert_eq!(RoomAreaMaskType::None.max_color(), None);
        let slots: Vec<usize> = RoomAreaMaskType::all()
            .iter()
            .filter_map(|m| m.slot())
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert!(!RoomAreaMaskType::all().contains(&RoomAreaMaskType::None));
    }

    #[test]
    fn test_max_colors() {
        assert_eq!(RoomAreaMaskType::Hotspots.max_color(), Some(50));
        assert_eq!(RoomAreaMaskType::Regions.max_color(), Some(16));
    }

    #[test]
    fn test_script_name_used() {
        let mut room = Room::new(1);
        room.objects.push(RoomObject::new(0));

        assert!(room.is_script_name_used("hHotspot1", None));
        assert!(!room.is_script_name_used("hHotspot1", Some((AreaRef::Hotspot, 1))));
        assert!(room.is_script_name_used("oObject0", Some((AreaRef::Hotspot, 1))));
        assert!(!room.is_script_name_used("", None));
        assert!(!room.is_script_name_used("nothing", None));
    }

    #[test]
    fn test_sync_interaction_script_modules() {
        let mut room = Room::new(12);
        room.objects.push(RoomObject::new(0));
        room.sync_interaction_script_modules();

        assert_eq!(room.interactions.script_module, "room12.asc");
        assert_eq!(room.objects[0].interactions.script_module, "room12.asc");
        assert!(room
            .hotspots
            .iter()
            .all(|h| h.interactions.script_module == "room12.asc"));
    }

    #[test]
    fn test_custom_properties_set_and_get() {
        let mut props = CustomProperties::default();
        props.set("Music", "theme");
        props.set("Music", "battle");
        props.set("Dark", "true");
        assert_eq!(props.get("Music"), Some("battle"));
        assert_eq!(props.entries.len(), 2);
        assert_eq!(props.get("Missing"), None);
    }

    #[test]
    fn test_mark_modified_if_never_clears() {
        let mut room = Room::new(0);
        room.mark_modified_if(true);
        room.mark_modified_if(false);
        assert!(room.is_modified());
    }
}
