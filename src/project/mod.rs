//! The open game project and its room files.
//!
//! ## Module Structure
//!
//! - [`layout`] - Where every room file lives
//! - [`file`] - The `project.json` settings file
//! - [`rooms`] - Creating, deleting and renumbering rooms on disk
//! - [`asset_kind`] - Project tree node ids
//! - [`source_control`] - Hook notified before files move or disappear
//! - `messages`, `resources`, `systems` - Bevy wiring

pub mod asset_kind;
pub mod file;
pub mod layout;
mod messages;
mod resources;
pub mod rooms;
pub mod source_control;
mod systems;

pub use asset_kind::{AssetKind, AssetNodeId};
pub use file::{GameSettings, ProjectFile};
pub use messages::{
    CreateRoomRequest, DeleteRoomRequest, OpenAssetRequest, OpenProjectRequest, ProjectOpened,
    RenumberRoomRequest, RoomScriptOpened, SaveProjectRequest,
};
pub use resources::{legacy_codec, GameProject, ProjectError};

use bevy::prelude::*;

/// Project systems; room systems run after them so a newly opened
/// project's resources are in place.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectSystems;

pub struct ProjectPlugin;

impl Plugin for ProjectPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ProjectError>()
            .add_message::<OpenProjectRequest>()
            .add_message::<SaveProjectRequest>()
            .add_message::<ProjectOpened>()
            .add_message::<CreateRoomRequest>()
            .add_message::<DeleteRoomRequest>()
            .add_message::<RenumberRoomRequest>()
            .add_message::<OpenAssetRequest>()
            .add_message::<RoomScriptOpened>()
            .add_systems(
                Update,
                (
                    systems::open_project_system.run_if(on_message::<OpenProjectRequest>),
                    systems::create_room_system.run_if(on_message::<CreateRoomRequest>),
                    systems::delete_room_system.run_if(on_message::<DeleteRoomRequest>),
                    systems::renumber_room_system.run_if(on_message::<RenumberRoomRequest>),
                    systems::open_asset_system.run_if(on_message::<OpenAssetRequest>),
                    systems::save_project_system.run_if(on_message::<SaveProjectRequest>),
                )
                    .chain()
                    .in_set(ProjectSystems),
            );
    }
}
