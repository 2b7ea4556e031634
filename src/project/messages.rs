//! Message types for project and room file operations.

use bevy::prelude::*;
use std::path::PathBuf;

use super::asset_kind::AssetNodeId;

#[derive(Message)]
pub struct OpenProjectRequest {
    pub path: PathBuf,
}

#[derive(Message)]
pub struct SaveProjectRequest;

/// Sent once a project is open and its room store is in place.
#[derive(Message, Debug, Clone)]
pub struct ProjectOpened {
    pub path: PathBuf,
    /// Some rooms are still stored as compiled `.crm` files
    pub needs_upgrade: bool,
}

/// Creates a room, from a template if one is given. Without a number the
/// lowest free one is used.
#[derive(Message)]
pub struct CreateRoomRequest {
    pub number: Option<u32>,
    pub template: Option<PathBuf>,
}

#[derive(Message)]
pub struct DeleteRoomRequest {
    pub number: u32,
}

#[derive(Message)]
pub struct RenumberRoomRequest {
    pub old: u32,
    pub new: u32,
}

/// Opens a project tree node.
#[derive(Message)]
pub struct OpenAssetRequest {
    pub node: AssetNodeId,
}

#[derive(Message, Debug, Clone)]
pub struct RoomScriptOpened {
    pub number: u32,
    pub text: String,
    /// The script was missing and an empty one was written
    pub created: bool,
}
