//! Error type shared by the room pipeline.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::model::RoomAreaMaskType;

pub type RoomResult<T> = Result<T, RoomError>;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("No room is currently loaded")]
    NoRoomLoaded,

    #[error(
        "The directory for room {number} was not found at \"{}\". If the room files were deleted on purpose, use Exclude From Game or delete the room from the project.",
        path.display()
    )]
    RoomDirectoryMissing { number: u32, path: PathBuf },

    #[error(
        "The data file for room {number} was not found at \"{}\". Restore it from a backup or source control, or delete the room from the project.",
        path.display()
    )]
    RoomDataMissing { number: u32, path: PathBuf },

    #[error(
        "Room {number} has no primary background at \"{}\". Import a background image with that name to make the room loadable again.",
        path.display()
    )]
    PrimaryBackgroundMissing { number: u32, path: PathBuf },

    #[error("I/O error on \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read room data \"{}\": {message}", path.display())]
    InvalidData { path: PathBuf, message: String },

    #[error("Failed to write room data \"{}\": {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    #[error("Image error on \"{}\": {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to decode PNG \"{}\": {source}", path.display())]
    PngDecode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("Failed to encode PNG \"{}\": {source}", path.display())]
    PngEncode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },

    #[error("Mask type None does not refer to a real mask")]
    InvalidMaskType,

    #[error("Cannot set the {mask} mask of room {number}: {reason}")]
    InvalidMask {
        number: u32,
        mask: RoomAreaMaskType,
        reason: String,
    },

    #[error("Background {index} does not exist (room {number} has {count})")]
    BackgroundOutOfRange {
        number: u32,
        index: usize,
        count: usize,
    },

    #[error("Room {number} already has the maximum of {max} backgrounds")]
    TooManyBackgrounds { number: u32, max: usize },

    #[error("Cannot use an empty image as background {index} of room {number}")]
    EmptyBackground { number: u32, index: usize },

    #[error("Room {number} must keep at least one background")]
    LastBackground { number: u32 },

    #[error(
        "Background for room {number} is {found}-bit but the room uses {expected}-bit colour. Convert the image or replace the main background first."
    )]
    ColorDepthMismatch {
        number: u32,
        expected: u32,
        found: u32,
    },

    #[error("Mask resolution {value} is out of range (1..={max})")]
    InvalidMaskResolution { value: u32, max: u32 },

    #[error(
        "No legacy room tool is configured, cannot process \"{}\". Set legacy_room_tool in the config file.",
        path.display()
    )]
    LegacyToolUnavailable { path: PathBuf },

    #[error("Legacy room tool failed on \"{}\": {message}", path.display())]
    LegacyTool { path: PathBuf, message: String },

    #[error("Room {number} is currently loaded; save and unload it first")]
    RoomInUse { number: u32 },

    #[error("Room {number} already exists at \"{}\"", path.display())]
    RoomAlreadyExists { number: u32, path: PathBuf },

    #[error("Room number {number} is out of range; room numbers must be between 0 and {max}")]
    RoomNumberTooHigh { number: u32, max: u32 },

    #[error("Room {number} is not part of the project")]
    UnknownRoom { number: u32 },

    #[error("Source control refused the operation: {0}")]
    SourceControl(String),

    #[error("Invalid project file \"{}\": {message}", path.display())]
    Project { path: PathBuf, message: String },
}

impl RoomError {
    /// Builds a closure wrapping an [`std::io::Error`] with the path that failed.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> RoomError + '_ {
        move |source| RoomError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
