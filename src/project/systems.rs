//! Systems opening projects and managing room files.

use bevy::prelude::*;

use crate::config::{AddRecentProjectRequest, AppConfig};
use crate::room::{LoadRoomRequest, RoomAssetStore, UnloadedRoom};

use super::asset_kind::AssetKind;
use super::messages::{
    CreateRoomRequest, DeleteRoomRequest, OpenAssetRequest, OpenProjectRequest, ProjectOpened,
    RenumberRoomRequest, RoomScriptOpened, SaveProjectRequest,
};
use super::resources::{legacy_codec, GameProject, ProjectError};
use super::rooms;

/// Opens a project and replaces the room store with one for it
pub fn open_project_system(
    mut commands: Commands,
    mut events: MessageReader<OpenProjectRequest>,
    config: Res<AppConfig>,
    mut project_error: ResMut<ProjectError>,
    mut recent: MessageWriter<AddRecentProjectRequest>,
    mut opened: MessageWriter<ProjectOpened>,
) {
    for event in events.read() {
        let codec = legacy_codec(config.data.legacy_room_tool.as_ref());
        match GameProject::open(&event.path, codec) {
            Ok(project) => {
                let store = project.room_store(config.data.remap_palettized_backgrounds);
                let needs_upgrade = !project.file.room_format.is_open();
                info!(
                    "Opened project {:?} with {} rooms",
                    project.file.name,
                    project.file.rooms.len()
                );
                commands.insert_resource(store);
                commands.insert_resource(project);
                project_error.message = None;
                recent.write(AddRecentProjectRequest {
                    path: event.path.clone(),
                });
                opened.write(ProjectOpened {
                    path: event.path.clone(),
                    needs_upgrade,
                });
            }
            Err(e) => {
                error!("Failed to open project {:?}: {}", event.path, e);
                project_error.message = Some(e.to_string());
            }
        }
    }
}

/// Writes the project file if anything changed
pub fn save_project_system(
    mut events: MessageReader<SaveProjectRequest>,
    project: Option<ResMut<GameProject>>,
    mut project_error: ResMut<ProjectError>,
) {
    let Some(mut project) = project else {
        events.clear();
        return;
    };
    for _ in events.read() {
        if !project.dirty {
            continue;
        }
        if let Err(e) = project.save() {
            error!("Failed to save project: {}", e);
            project_error.message = Some(e.to_string());
        }
    }
}

pub fn create_room_system(
    mut events: MessageReader<CreateRoomRequest>,
    project: Option<ResMut<GameProject>>,
    mut project_error: ResMut<ProjectError>,
    mut save: MessageWriter<SaveProjectRequest>,
) {
    let Some(mut project) = project else {
        events.clear();
        return;
    };
    for event in events.read() {
        let Some(number) = event.number.or_else(|| project.file.next_free_room_number()) else {
            project_error.message = Some("The project has no free room numbers left".to_string());
            continue;
        };

        let created = match &event.template {
            Some(template) => {
                rooms::create_room_from_template(project.persistence(), template, number)
            }
            None => rooms::create_empty_room(project.persistence(), &project.file.settings, number)
                .map(|_| ()),
        };
        match created {
            Ok(()) => {
                project
                    .file
                    .add_room(UnloadedRoom::new(number, format!("Room {number}")));
                project.dirty = true;
                save.write(SaveProjectRequest);
            }
            Err(e) => {
                error!("Failed to create room {}: {}", number, e);
                project_error.message = Some(e.to_string());
            }
        }
    }
}

/// Deletes a room's files, unloading it first if it is the resident room
pub fn delete_room_system(
    mut events: MessageReader<DeleteRoomRequest>,
    project: Option<ResMut<GameProject>>,
    mut store: Option<ResMut<RoomAssetStore>>,
    mut project_error: ResMut<ProjectError>,
    mut save: MessageWriter<SaveProjectRequest>,
) {
    let Some(mut project) = project else {
        events.clear();
        return;
    };
    for event in events.read() {
        if let Some(store) = store.as_mut()
            && store.loaded_room_number() == Some(event.number)
        {
            store.unload();
        }

        match rooms::delete_room_files(project.layout(), project.source_control(), event.number) {
            Ok(_) => {
                project.file.remove_room(event.number);
                project.dirty = true;
                save.write(SaveProjectRequest);
            }
            Err(e) => {
                error!("Failed to delete room {}: {}", event.number, e);
                project_error.message = Some(e.to_string());
            }
        }
    }
}

pub fn renumber_room_system(
    mut events: MessageReader<RenumberRoomRequest>,
    project: Option<ResMut<GameProject>>,
    store: Option<Res<RoomAssetStore>>,
    mut project_error: ResMut<ProjectError>,
    mut save: MessageWriter<SaveProjectRequest>,
) {
    let Some(mut project) = project else {
        events.clear();
        return;
    };
    let loaded = store.as_ref().and_then(|s| s.loaded_room_number());
    for event in events.read() {
        let project = &mut *project;
        let result = rooms::renumber_room(
            project.persistence.layout(),
            project.source_control.as_ref(),
            &mut project.file.rooms,
            loaded,
            event.old,
            event.new,
        );
        match result {
            Ok(()) => {
                project.file.sort_rooms();
                project.dirty = true;
                save.write(SaveProjectRequest);
            }
            Err(e) => {
                error!("Failed to renumber room {}: {}", event.old, e);
                project_error.message = Some(e.to_string());
            }
        }
    }
}

/// Opens a project tree node
pub fn open_asset_system(
    mut events: MessageReader<OpenAssetRequest>,
    project: Option<Res<GameProject>>,
    mut project_error: ResMut<ProjectError>,
    mut load: MessageWriter<LoadRoomRequest>,
    mut scripts: MessageWriter<RoomScriptOpened>,
) {
    let Some(project) = project else {
        events.clear();
        return;
    };
    for event in events.read() {
        let number = event.node.number;
        if project.file.room(number).is_none() {
            warn!("{} does not refer to a room of this project", event.node);
            continue;
        }
        match event.node.kind {
            AssetKind::Room | AssetKind::RoomSettings => {
                load.write(LoadRoomRequest { number });
            }
            AssetKind::RoomScript => {
                match rooms::try_load_script_and_create_missing(project.layout(), number) {
                    Ok(script) => {
                        scripts.write(RoomScriptOpened {
                            number,
                            text: script.text,
                            created: script.created,
                        });
                    }
                    Err(e) => {
                        error!("Failed to open the script of room {}: {}", number, e);
                        project_error.message = Some(e.to_string());
                    }
                }
            }
        }
    }
}
