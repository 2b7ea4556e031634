//! Centralized constants used across the application.
//!
//! Room limits mirror the values the game engine was built with; changing
//! them breaks compatibility with compiled room files.

/// Maximum number of background frames a room can have
pub const MAX_BACKGROUNDS: usize = 5;

/// Maximum number of room objects
pub const MAX_OBJECTS: usize = 256;

/// Maximum number of hotspots (also the hotspot mask color limit)
pub const MAX_HOTSPOTS: usize = 50;

/// Maximum number of walkable areas (also the walkable mask color limit)
pub const MAX_WALKABLE_AREAS: usize = 16;

/// Maximum number of walk-behind areas (also the walk-behind mask color limit)
pub const MAX_WALK_BEHINDS: usize = 16;

/// Maximum number of regions (also the region mask color limit)
pub const MAX_REGIONS: usize = 16;

/// Coarsest mask resolution a room may use (1 = one mask pixel per room pixel)
pub const MAX_MASK_RESOLUTION: u32 = 4;

/// Version written into the `Version` attribute of every room data file
pub const LATEST_XML_VERSION: &str = "4.00.00.21";

/// Version assumed for data files that carry a plain integer version
pub const FIRST_XML_VERSION: &str = "3.99.99.01";

/// Size of a room created from scratch
pub const DEFAULT_ROOM_WIDTH: u32 = 320;
pub const DEFAULT_ROOM_HEIGHT: u32 = 200;

/// Name of the project settings file inside a project directory
pub const PROJECT_FILE_NAME: &str = "project.json";

/// Name of the room data file inside a room directory
pub const ROOM_DATA_FILE_NAME: &str = "room.xml";

/// Initial contents of a freshly created room script
pub const EMPTY_ROOM_SCRIPT: &str = "// Room script file\n";

/// Maximum number of recent projects to remember in config
pub const MAX_RECENT_PROJECTS: usize = 5;

/// Highest number a room may be given
pub const HIGHEST_ROOM_NUMBER: u32 = 999;
