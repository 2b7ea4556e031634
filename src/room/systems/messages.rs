//! Message types for room operations.

use bevy::prelude::*;

use crate::room::watcher::WatchedSlot;

/// Makes a room the resident room. A modified resident room is saved first.
#[derive(Message)]
pub struct LoadRoomRequest {
    pub number: u32,
}

#[derive(Message)]
pub struct SaveRoomRequest {
    /// Rewrite every file even if nothing changed
    pub force: bool,
}

#[derive(Message)]
pub struct UnloadRoomRequest {
    pub save_changes: bool,
}

/// Converts the project's remaining `.crm` rooms, then brings every room's
/// data file up to the latest version.
#[derive(Message)]
pub struct UpgradeRoomsRequest;

#[derive(Message)]
pub struct CancelUpgradeRequest;

#[derive(Message, Debug, Clone)]
pub struct RoomLoaded {
    pub number: u32,
    /// Problems the load recovered from
    pub warnings: Vec<String>,
}

#[derive(Message, Debug, Clone)]
pub struct RoomSaved {
    pub number: u32,
    /// Set when the open-format files were saved but the compiled room was not
    pub legacy_error: Option<String>,
}

/// A watched file of the resident room changed on disk and its cache entry
/// was refreshed.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomRedrawRequested {
    pub number: u32,
    pub slot: WatchedSlot,
}

#[derive(Message, Debug, Clone)]
pub struct RoomsUpgraded {
    /// Every room is now in open format at the latest data version
    pub complete: bool,
    pub converted: usize,
    pub failed: usize,
}
