//! Result types for room load and save operations.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::room::design_data::RoomDesignData;
use crate::room::error::RoomResult;
use crate::room::images::RoomImages;
use crate::room::model::{Room, RoomAreaMaskType};

/// Everything read from one room directory.
#[derive(Debug, Clone)]
pub struct LoadedRoomFiles {
    pub room: Room,
    pub images: RoomImages,
    pub design: RoomDesignData,
    pub warnings: Vec<LoadWarning>,
}

/// A problem found while loading that the load recovered from.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadWarning {
    BackgroundCountCorrected { recorded: usize, found: usize },
    MaskMissing { kind: RoomAreaMaskType, path: PathBuf },
    MaskUnreadable { kind: RoomAreaMaskType, path: PathBuf, reason: String },
    MaskPixelsStripped { kind: RoomAreaMaskType, count: usize },
    MaskRescaled { kind: RoomAreaMaskType, from: (u32, u32), to: (u32, u32) },
    DesignDataIgnored { path: PathBuf, reason: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::BackgroundCountCorrected { recorded, found } => write!(
                f,
                "Room data lists {recorded} backgrounds but {found} background files were found; the count was corrected"
            ),
            LoadWarning::MaskMissing { kind, path } => write!(
                f,
                "Could not find the {kind} mask at \"{}\", an empty mask will be used instead",
                path.display()
            ),
            LoadWarning::MaskUnreadable { kind, path, reason } => write!(
                f,
                "The {kind} mask at \"{}\" could not be used ({reason}), an empty mask will be used instead",
                path.display()
            ),
            LoadWarning::MaskPixelsStripped { kind, count } => write!(
                f,
                "{count} invalid colours were removed from the {kind} mask"
            ),
            LoadWarning::MaskRescaled { kind, from, to } => write!(
                f,
                "The {kind} mask was {}x{} and has been scaled to {}x{}",
                from.0, from.1, to.0, to.1
            ),
            LoadWarning::DesignDataIgnored { path, reason } => write!(
                f,
                "Unable to read the room design-time preferences at \"{}\"; design-time state was reset ({reason})",
                path.display()
            ),
        }
    }
}

/// How a save should treat unchanged images and the compiled room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveMode {
    /// Write every image and the data file even if nothing is marked modified
    pub force: bool,
    /// Rebuild the compiled `.crm` after the open-format files are written
    pub regenerate_legacy: bool,
}

impl Default for SaveMode {
    fn default() -> Self {
        Self {
            force: false,
            regenerate_legacy: true,
        }
    }
}

/// Result of a save whose open-format files were written.
#[derive(Debug)]
pub struct SaveOutcome {
    pub saved_at: DateTime<Local>,
    pub images_written: usize,
    pub data_written: bool,
    /// Outcome of regenerating the compiled room; `Ok` when not requested
    pub legacy_crm: RoomResult<()>,
}
