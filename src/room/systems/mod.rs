//! Bevy wiring for the room pipeline.
//!
//! ## Module Structure
//!
//! - [`messages`] - Requests and notifications
//! - [`resources`] - Operation state, errors and task components
//! - `load` - Background loads, saves and unloads
//! - `migrate` - Background conversion of legacy rooms
//! - `watch` - Live reload of externally edited files

mod load;
mod messages;
mod migrate;
mod resources;
mod watch;


pub use messages::{
    CancelUpgradeRequest, LoadRoomRequest, RoomLoaded, RoomRedrawRequested, RoomSaved,
    RoomsUpgraded, SaveRoomRequest, UnloadRoomRequest, UpgradeRoomsRequest,
};
pub use resources::{
    AsyncRoomOperation, RoomLoadError, RoomSaveError, RoomUpgradeGate, UpgradeProgress,
};

pub use load::{load_room_system, poll_load_tasks, save_room_system, unload_room_system};
pub use migrate::{
    cancel_upgrade_system, poll_conversion_tasks, poll_data_upgrade_tasks,
    release_held_load_system, upgrade_on_project_open, upgrade_rooms_system,
};
pub use watch::apply_file_changes_system;
