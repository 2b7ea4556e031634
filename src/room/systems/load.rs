//! Room load, save and unload systems.

use bevy::prelude::*;
use bevy::tasks::IoTaskPool;
use futures_lite::future;

use crate::room::persistence::SaveMode;
use crate::room::store::RoomAssetStore;

use super::messages::{LoadRoomRequest, RoomLoaded, RoomSaved, SaveRoomRequest, UnloadRoomRequest};
use super::resources::{
    AsyncRoomOperation, LoadResult, LoadRoomTask, RoomLoadError, RoomSaveError, RoomUpgradeGate,
};

/// Saves the resident room if it has changes, reporting the outcome.
fn save_resident(
    store: &mut RoomAssetStore,
    mode: SaveMode,
    save_error: &mut RoomSaveError,
    saved: &mut MessageWriter<RoomSaved>,
) -> bool {
    let Some(number) = store.loaded_room_number() else {
        return true;
    };
    match store.save(mode) {
        Ok(outcome) => {
            save_error.message = None;
            saved.write(RoomSaved {
                number,
                legacy_error: outcome.legacy_crm.err().map(|e| e.to_string()),
            });
            true
        }
        Err(e) => {
            error!("Failed to save room {}: {}", number, e);
            save_error.message = Some(e.to_string());
            false
        }
    }
}

/// Starts reading a room in the background
pub fn load_room_system(
    mut commands: Commands,
    mut events: MessageReader<LoadRoomRequest>,
    store: Option<ResMut<RoomAssetStore>>,
    mut async_op: ResMut<AsyncRoomOperation>,
    mut gate: ResMut<RoomUpgradeGate>,
    mut save_error: ResMut<RoomSaveError>,
    mut saved: MessageWriter<RoomSaved>,
    mut loaded: MessageWriter<RoomLoaded>,
) {
    let Some(mut store) = store else {
        warn!("No project is open");
        events.clear();
        return;
    };
    for event in events.read() {
        if store.loaded_room_number() == Some(event.number) {
            debug!("Room {} is already loaded", event.number);
            loaded.write(RoomLoaded {
                number: event.number,
                warnings: Vec::new(),
            });
            continue;
        }
        if gate.awaiting_upgrade {
            info!("Room {} will load once the project upgrade finishes", event.number);
            gate.held_load = Some(event.number);
            continue;
        }
        if async_op.is_busy() {
            warn!("Room operation already in progress");
            continue;
        }

        let has_changes = store.current_room().is_some_and(|r| r.is_modified());
        if has_changes && !save_resident(&mut store, SaveMode::default(), &mut save_error, &mut saved) {
            // Keep the unsaved room rather than lose it
            continue;
        }

        async_op.is_loading = true;
        async_op.operation_description = Some(format!("Loading room {}...", event.number));
        store.begin_loading();

        let persistence = store.persistence().clone();
        let number = event.number;
        let task = IoTaskPool::get().spawn(async move {
            LoadResult {
                number,
                files: persistence.load(number),
            }
        });
        commands.spawn(LoadRoomTask(task));
    }
}

/// Installs finished loads into the store
pub fn poll_load_tasks(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut LoadRoomTask)>,
    mut store: Option<ResMut<RoomAssetStore>>,
    mut async_op: ResMut<AsyncRoomOperation>,
    mut load_error: ResMut<RoomLoadError>,
    mut loaded: MessageWriter<RoomLoaded>,
) {
    for (entity, mut task) in tasks.iter_mut() {
        let Some(result) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        commands.entity(entity).despawn();
        async_op.finish();

        // The project was closed while the room was being read
        let Some(store) = store.as_mut() else {
            continue;
        };

        match result.files {
            Ok(files) => {
                let warnings = files.warnings.iter().map(ToString::to_string).collect::<Vec<_>>();
                for warning in &warnings {
                    warn!("Room {}: {}", result.number, warning);
                }
                store.install(files);
                load_error.message = None;
                loaded.write(RoomLoaded {
                    number: result.number,
                    warnings,
                });
            }
            Err(e) => {
                store.cancel_loading();
                error!("Failed to load room {}: {}", result.number, e);
                load_error.message = Some(e.to_string());
            }
        }
    }
}

pub fn save_room_system(
    mut events: MessageReader<SaveRoomRequest>,
    store: Option<ResMut<RoomAssetStore>>,
    mut save_error: ResMut<RoomSaveError>,
    mut saved: MessageWriter<RoomSaved>,
) {
    let Some(mut store) = store else {
        events.clear();
        return;
    };
    for event in events.read() {
        let mode = SaveMode {
            force: event.force,
            ..SaveMode::default()
        };
        save_resident(&mut store, mode, &mut save_error, &mut saved);
    }
}

pub fn unload_room_system(
    mut events: MessageReader<UnloadRoomRequest>,
    store: Option<ResMut<RoomAssetStore>>,
    mut save_error: ResMut<RoomSaveError>,
    mut saved: MessageWriter<RoomSaved>,
) {
    let Some(mut store) = store else {
        events.clear();
        return;
    };
    for event in events.read() {
        if event.save_changes
            && !save_resident(&mut store, SaveMode::default(), &mut save_error, &mut saved)
        {
            continue;
        }
        store.unload();
    }
}
