//! Applies external edits to the resident room's files.

use bevy::prelude::*;

use crate::room::store::RoomAssetStore;

use super::messages::RoomRedrawRequested;

/// Drains the file watchers and asks for a redraw of every refreshed slot
pub fn apply_file_changes_system(
    store: Option<ResMut<RoomAssetStore>>,
    mut redraw: MessageWriter<RoomRedrawRequested>,
) {
    let Some(mut store) = store else {
        return;
    };
    let Some(number) = store.loaded_room_number() else {
        return;
    };
    // Saves run with the watchers suspended
    if store.is_being_saved() {
        return;
    }
    for slot in store.process_file_changes() {
        redraw.write(RoomRedrawRequested { number, slot });
    }
}
