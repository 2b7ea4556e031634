//! Room assets: model, images, storage and the resident room store.
//!
//! ## Module Structure
//!
//! - [`model`] - Room data model and area types
//! - [`bitmap`], [`palette`], [`images`] - Backgrounds, masks and their caches
//! - [`mask`] - Mask sizing, validation and rescaling
//! - [`xml`], [`design_data`] - The room data file and its design-time sidecar
//! - [`persistence`] - Reading and writing room directories
//! - [`store`] - The single resident room
//! - [`watcher`] - Live reload of externally edited files
//! - [`upgrade`] - Migration from compiled `.crm` rooms
//! - [`native`] - The legacy room codec
//! - [`systems`] - Bevy messages, resources and systems

pub mod bitmap;
pub mod design_data;
pub mod error;
pub mod images;
pub mod mask;
pub mod model;
pub mod native;
pub mod palette;
pub mod persistence;
pub mod progress;
pub mod store;
pub mod systems;
pub mod upgrade;
pub mod watcher;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_support;

pub use bitmap::{Bitmap, ColorDepth, IndexedBitmap};
pub use design_data::RoomDesignData;
pub use error::{RoomError, RoomResult};
pub use images::{MaskCache, RoomImage, RoomImages};
pub use mask::{mask_size, MaskValidation, RescaleOutcome};
pub use model::{Room, RoomAreaMaskType, UnloadedRoom};
pub use native::{ExternalRoomTool, LegacyRoomCodec, UnavailableRoomCodec};
pub use palette::GamePalette;
pub use persistence::{LoadWarning, LoadedRoomFiles, RoomPersistence, SaveMode, SaveOutcome};
pub use progress::{LogProgress, ProgressReporter, SharedProgress};
pub use store::{RoomAssetStore, RoomStoreState};
pub use systems::{
    AsyncRoomOperation, CancelUpgradeRequest, LoadRoomRequest, RoomLoadError, RoomLoaded,
    RoomRedrawRequested, RoomSaveError, RoomSaved, RoomUpgradeGate, RoomsUpgraded,
    SaveRoomRequest, UnloadRoomRequest, UpgradeProgress, UpgradeRoomsRequest,
};
pub use upgrade::{
    RoomFormatState, RoomFormatUpgrader, RoomFormatVersion, UpgradeReport,
};
pub use watcher::WatchedSlot;

use bevy::prelude::*;

use crate::project::{ProjectOpened, ProjectSystems};

pub struct RoomsPlugin;

impl Plugin for RoomsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AsyncRoomOperation>()
            .init_resource::<RoomLoadError>()
            .init_resource::<RoomSaveError>()
            .init_resource::<UpgradeProgress>()
            .init_resource::<RoomUpgradeGate>()
            .add_message::<LoadRoomRequest>()
            .add_message::<SaveRoomRequest>()
            .add_message::<UnloadRoomRequest>()
            .add_message::<UpgradeRoomsRequest>()
            .add_message::<CancelUpgradeRequest>()
            .add_message::<RoomLoaded>()
            .add_message::<RoomSaved>()
            .add_message::<RoomRedrawRequested>()
            .add_message::<RoomsUpgraded>()
            .add_systems(
                Update,
                (
                    systems::upgrade_on_project_open.run_if(on_message::<ProjectOpened>),
                    systems::save_room_system.run_if(on_message::<SaveRoomRequest>),
                    systems::unload_room_system.run_if(on_message::<UnloadRoomRequest>),
                    systems::load_room_system.run_if(on_message::<LoadRoomRequest>),
                    systems::upgrade_rooms_system.run_if(on_message::<UpgradeRoomsRequest>),
                    systems::cancel_upgrade_system.run_if(on_message::<CancelUpgradeRequest>),
                    systems::poll_load_tasks,
                    systems::poll_conversion_tasks,
                    systems::poll_data_upgrade_tasks,
                    systems::release_held_load_system.run_if(on_message::<RoomsUpgraded>),
                    systems::apply_file_changes_system,
                )
                    .chain()
                    .after(ProjectSystems),
            );
    }
}
