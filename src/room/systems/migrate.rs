//! Background upgrade of a project's rooms.
//!
//! Each legacy room is converted in its own I/O task. Once every task has
//! reported back the project marker is updated, and if all rooms are now in
//! open format a second task rewrites outdated data files.

use bevy::prelude::*;
use bevy::tasks::IoTaskPool;
use futures_lite::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::project::{GameProject, ProjectOpened, SaveProjectRequest};
use crate::room::upgrade::{RoomFormatUpgrader, UpgradeReport};

use super::messages::{CancelUpgradeRequest, LoadRoomRequest, RoomsUpgraded, UpgradeRoomsRequest};
use super::resources::{
    AsyncRoomOperation, ConvertRoomTask, RoomUpgradeGate, UpgradeDataTask, UpgradeProgress,
};

fn release_held_load(gate: &mut RoomUpgradeGate, load: &mut MessageWriter<LoadRoomRequest>) {
    gate.awaiting_upgrade = false;
    if let Some(number) = gate.held_load.take() {
        load.write(LoadRoomRequest { number });
    }
}

fn spawn_data_upgrade(commands: &mut Commands, project: &GameProject, progress: &UpgradeProgress) {
    let upgrader = RoomFormatUpgrader::new(project.persistence().clone());
    let mut state = project.file.room_format.clone();
    let rooms = project.file.rooms.clone();
    let reporter = progress.progress.clone();
    let task = IoTaskPool::get().spawn(async move {
        let report = upgrader.upgrade_all_room_data(&mut state, &rooms, &reporter);
        (state, report)
    });
    commands.spawn(UpgradeDataTask(task));
}

/// Upgrades a project that still has compiled rooms as soon as it opens
pub fn upgrade_on_project_open(
    mut opened: MessageReader<ProjectOpened>,
    mut gate: ResMut<RoomUpgradeGate>,
    mut upgrade: MessageWriter<UpgradeRoomsRequest>,
) {
    for event in opened.read() {
        gate.held_load = None;
        gate.awaiting_upgrade = event.needs_upgrade;
        if event.needs_upgrade {
            info!("Project {:?} has rooms in .crm format, upgrading", event.path);
            upgrade.write(UpgradeRoomsRequest);
        }
    }
}

/// Replays the room load held back during the upgrade
pub fn release_held_load_system(
    mut upgraded: MessageReader<RoomsUpgraded>,
    mut gate: ResMut<RoomUpgradeGate>,
    mut load: MessageWriter<LoadRoomRequest>,
) {
    if upgraded.read().count() > 0 {
        release_held_load(&mut gate, &mut load);
    }
}

/// Starts converting whatever rooms are left
pub fn upgrade_rooms_system(
    mut commands: Commands,
    mut events: MessageReader<UpgradeRoomsRequest>,
    project: Option<ResMut<GameProject>>,
    mut async_op: ResMut<AsyncRoomOperation>,
    mut progress: ResMut<UpgradeProgress>,
    mut gate: ResMut<RoomUpgradeGate>,
    mut save: MessageWriter<SaveProjectRequest>,
    mut load: MessageWriter<LoadRoomRequest>,
) {
    let Some(mut project) = project else {
        warn!("No project is open");
        events.clear();
        release_held_load(&mut gate, &mut load);
        return;
    };
    for _ in events.read() {
        if async_op.is_busy() {
            warn!("Room operation already in progress");
            if !async_op.is_upgrading {
                // No upgrade will report back to release held loads
                release_held_load(&mut gate, &mut load);
            }
            continue;
        }

        let pending: Vec<_> = project
            .file
            .room_format
            .pending(&project.file.rooms)
            .into_iter()
            .cloned()
            .collect();
        progress.start(pending.len());
        progress.last_report = None;
        async_op.is_upgrading = true;

        if pending.is_empty() {
            if !project.file.room_format.is_open() {
                // Every room was converted by an earlier run
                let project = &mut *project;
                project
                    .file
                    .room_format
                    .apply(&UpgradeReport::default(), &project.file.rooms);
                project.dirty = true;
                save.write(SaveProjectRequest);
            }
            async_op.operation_description = Some("Upgrading rooms...".to_string());
            spawn_data_upgrade(&mut commands, &project, &progress);
            continue;
        }

        info!("Converting {} rooms to open format", pending.len());
        async_op.operation_description = Some(format!(
            "Converting {} rooms from .crm to open format...",
            pending.len()
        ));
        let upgrader = RoomFormatUpgrader::new(project.persistence().clone());
        let completed = Arc::new(AtomicUsize::new(0));
        let total = pending.len();
        let pool = IoTaskPool::get();
        for room in pending {
            let upgrader = upgrader.clone();
            let completed = completed.clone();
            let reporter = progress.progress.clone();
            let cancel = progress.cancel.clone();
            let task = pool.spawn(async move {
                upgrader.convert_reported(&room, &completed, total, &reporter, &cancel)
            });
            commands.spawn(ConvertRoomTask(task));
        }
    }
}

/// Collects finished conversions; the last one updates the project
pub fn poll_conversion_tasks(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut ConvertRoomTask)>,
    project: Option<ResMut<GameProject>>,
    mut async_op: ResMut<AsyncRoomOperation>,
    mut progress: ResMut<UpgradeProgress>,
    mut save: MessageWriter<SaveProjectRequest>,
    mut upgraded: MessageWriter<RoomsUpgraded>,
) {
    for (entity, mut task) in tasks.iter_mut() {
        if let Some(conversion) = future::block_on(future::poll_once(&mut task.0)) {
            progress.conversions.push(conversion);
            commands.entity(entity).despawn();
        }
    }
    if progress.expected == 0 || progress.conversions.len() < progress.expected {
        return;
    }

    let report = UpgradeReport::from_conversions(progress.conversions.drain(..));
    progress.expected = 0;
    let Some(mut project) = project else {
        async_op.finish();
        return;
    };

    let project = &mut *project;
    project.file.room_format.apply(&report, &project.file.rooms);
    project.dirty = true;
    save.write(SaveProjectRequest);

    if !report.failed.is_empty() {
        warn!("Some rooms could not be converted:\n{}", report.failure_summary());
    }

    if project.file.room_format.is_open() {
        async_op.operation_description = Some("Upgrading rooms...".to_string());
        spawn_data_upgrade(&mut commands, project, &progress);
        progress.last_report = Some(report);
    } else {
        async_op.finish();
        upgraded.write(RoomsUpgraded {
            complete: false,
            converted: report.converted.len(),
            failed: report.failed.len(),
        });
        progress.last_report = Some(report);
    }
}

/// Applies the result of the data-version pass
pub fn poll_data_upgrade_tasks(
    mut commands: Commands,
    mut tasks: Query<(Entity, &mut UpgradeDataTask)>,
    mut project: Option<ResMut<GameProject>>,
    mut async_op: ResMut<AsyncRoomOperation>,
    mut progress: ResMut<UpgradeProgress>,
    mut save: MessageWriter<SaveProjectRequest>,
    mut upgraded: MessageWriter<RoomsUpgraded>,
) {
    for (entity, mut task) in tasks.iter_mut() {
        let Some((state, report)) = future::block_on(future::poll_once(&mut task.0)) else {
            continue;
        };
        commands.entity(entity).despawn();
        async_op.finish();

        let complete = report.is_complete();
        if let Some(project) = project.as_mut()
            && project.file.room_format != state
        {
            project.file.room_format = state;
            project.dirty = true;
            save.write(SaveProjectRequest);
        }

        let mut total = progress.last_report.take().unwrap_or_default();
        total.merge(report);
        upgraded.write(RoomsUpgraded {
            complete: complete && total.failed.is_empty(),
            converted: total.converted.len(),
            failed: total.failed.len(),
        });
        progress.last_report = Some(total);
    }
}

pub fn cancel_upgrade_system(
    mut events: MessageReader<CancelUpgradeRequest>,
    progress: Res<UpgradeProgress>,
) {
    for _ in events.read() {
        info!("Cancelling room upgrade");
        progress.cancel.store(true, Ordering::SeqCst);
    }
}
