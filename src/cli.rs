//! Command line front end: opens a project and drives one room operation
//! through the plugins' messages.

use bevy::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ConfigLoaded;
use crate::project::{OpenProjectRequest, ProjectError, ProjectOpened};
use crate::room::{
    LoadRoomRequest, RoomAssetStore, RoomLoadError, RoomLoaded, RoomRedrawRequested,
    RoomSaveError, RoomSaved, RoomsUpgraded, SaveRoomRequest, UpgradeProgress,
    UpgradeRoomsRequest,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "roomforge")]
#[command(about = "Room asset pipeline for adventure game projects")]
pub struct Cli {
    /// Project directory (containing project.json)
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Convert legacy .crm rooms to open format and upgrade room data files
    Upgrade,
    /// Print a room's settings and load warnings
    Info { room: u32 },
    /// Change a room's mask resolution (1 to 4) and save it
    Resolution { room: u32, resolution: u32 },
    /// Keep a room loaded and report external edits to its files
    Watch { room: u32 },
}

impl Command {
    fn room(self) -> Option<u32> {
        match self {
            Command::Upgrade => None,
            Command::Info { room } | Command::Resolution { room, .. } | Command::Watch { room } => {
                Some(room)
            }
        }
    }
}

#[derive(Resource)]
struct CliRequest(Cli);

fn open_project(request: Res<CliRequest>, mut open: MessageWriter<OpenProjectRequest>) {
    open.write(OpenProjectRequest {
        path: request.0.project.clone(),
    });
}

fn start_command(
    mut opened: MessageReader<ProjectOpened>,
    request: Res<CliRequest>,
    mut upgrade: MessageWriter<UpgradeRoomsRequest>,
    mut load: MessageWriter<LoadRoomRequest>,
) {
    for event in opened.read() {
        match request.0.command.room() {
            Some(number) => {
                load.write(LoadRoomRequest { number });
            }
            // Legacy projects are upgraded on open already
            None if event.needs_upgrade => {}
            None => {
                upgrade.write(UpgradeRoomsRequest);
            }
        }
    }
}

fn room_loaded(
    mut loaded: MessageReader<RoomLoaded>,
    request: Res<CliRequest>,
    store: Option<ResMut<RoomAssetStore>>,
    mut save: MessageWriter<SaveRoomRequest>,
    mut exit: MessageWriter<AppExit>,
) {
    let Some(mut store) = store else {
        return;
    };
    for event in loaded.read() {
        for warning in &event.warnings {
            println!("warning: {warning}");
        }
        match request.0.command {
            Command::Info { .. } => {
                if let Some(room) = store.current_room() {
                    println!("Room {}: {}", room.number, room.description);
                    println!("  size: {}x{}", room.width, room.height);
                    println!("  colour depth: {}-bit", room.color_depth.bits());
                    println!("  mask resolution: 1:{}", room.mask_resolution);
                    println!("  backgrounds: {}", room.background_count);
                    println!("  objects: {}", room.objects.len());
                }
                exit.write(AppExit::Success);
            }
            Command::Resolution { resolution, .. } => {
                match store.adjust_mask_resolution(resolution) {
                    Ok(outcome) => {
                        println!(
                            "Mask resolution changed from 1:{} to 1:{}",
                            outcome.previous, outcome.current
                        );
                        if outcome.lossy {
                            println!("Masks were scaled down; some detail was lost");
                        }
                        save.write(SaveRoomRequest { force: false });
                    }
                    Err(e) => {
                        error!("{}", e);
                        exit.write(AppExit::error());
                    }
                }
            }
            Command::Watch { room } => {
                println!("Watching room {room}, press Ctrl+C to stop");
            }
            Command::Upgrade => {}
        }
    }
}

fn room_saved(mut saved: MessageReader<RoomSaved>, mut exit: MessageWriter<AppExit>) {
    for event in saved.read() {
        if let Some(legacy) = &event.legacy_error {
            println!("Room {} saved, but the compiled room was not updated: {legacy}", event.number);
        } else {
            println!("Room {} saved", event.number);
        }
        exit.write(AppExit::Success);
    }
}

fn rooms_upgraded(
    mut upgraded: MessageReader<RoomsUpgraded>,
    request: Res<CliRequest>,
    progress: Res<UpgradeProgress>,
    mut exit: MessageWriter<AppExit>,
) {
    for event in upgraded.read() {
        println!(
            "{} rooms upgraded, {} failed",
            event.converted, event.failed
        );
        if let Some(report) = &progress.last_report
            && !report.failed.is_empty()
        {
            println!("{}", report.failure_summary());
        }
        if request.0.command != Command::Upgrade {
            // The room command continues once its load is released
            continue;
        }
        exit.write(if event.complete {
            AppExit::Success
        } else {
            AppExit::error()
        });
    }
}

fn report_redraws(mut redraws: MessageReader<RoomRedrawRequested>) {
    for event in redraws.read() {
        println!("Room {} reloaded {:?}", event.number, event.slot);
    }
}

/// Ends the run when an operation failed
fn exit_on_error(
    project_error: Res<ProjectError>,
    load_error: Res<RoomLoadError>,
    save_error: Res<RoomSaveError>,
    mut exit: MessageWriter<AppExit>,
) {
    let message = [
        &project_error.message,
        &load_error.message,
        &save_error.message,
    ]
    .into_iter()
    .find_map(|m| m.as_ref());
    if let Some(message) = message {
        eprintln!("error: {message}");
        exit.write(AppExit::error());
    }
}

pub struct CliPlugin(pub Cli);

impl Plugin for CliPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CliRequest(self.0.clone()))
            .add_systems(Startup, open_project.after(ConfigLoaded))
            .add_systems(
                PostUpdate,
                (
                    start_command.run_if(on_message::<ProjectOpened>),
                    room_loaded.run_if(on_message::<RoomLoaded>),
                    room_saved.run_if(on_message::<RoomSaved>),
                    rooms_upgraded.run_if(on_message::<RoomsUpgraded>),
                    report_redraws.run_if(on_message::<RoomRedrawRequested>),
                    exit_on_error.run_if(
                        resource_changed::<ProjectError>
                            .or(resource_changed::<RoomLoadError>)
                            .or(resource_changed::<RoomSaveError>),
                    ),
                ),
            );
    }
}
