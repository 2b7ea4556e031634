//! Resource types for room operation state tracking.

use bevy::prelude::*;
use bevy::tasks::Task;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::room::error::RoomResult;
use crate::room::persistence::LoadedRoomFiles;
use crate::room::progress::SharedProgress;
use crate::room::upgrade::{RoomConversion, RoomFormatState, UpgradeReport};

#[derive(Resource, Default)]
pub struct RoomLoadError {
    pub message: Option<String>,
}

#[derive(Resource, Default)]
pub struct RoomSaveError {
    pub message: Option<String>,
}

/// Tracks background room work for a progress dialog
#[derive(Resource, Default)]
pub struct AsyncRoomOperation {
    pub is_loading: bool,
    pub is_upgrading: bool,
    pub operation_description: Option<String>,
}

impl AsyncRoomOperation {
    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_upgrading
    }

    pub(super) fn finish(&mut self) {
        self.is_loading = false;
        self.is_upgrading = false;
        self.operation_description = None;
    }
}

/// Holds room loads back while a freshly opened project is being upgraded.
#[derive(Resource, Default)]
pub struct RoomUpgradeGate {
    /// An upgrade was requested on open and has not reported back yet
    pub awaiting_upgrade: bool,
    /// Latest load requested in the meantime
    pub held_load: Option<u32>,
}

/// Progress of the running upgrade, shared with its tasks.
#[derive(Resource, Default)]
pub struct UpgradeProgress {
    pub progress: SharedProgress,
    pub(super) cancel: Arc<AtomicBool>,
    /// Conversions finished so far in the running batch
    pub(super) conversions: Vec<RoomConversion>,
    pub(super) expected: usize,
    /// Report of the last finished upgrade
    pub last_report: Option<UpgradeReport>,
}

impl UpgradeProgress {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub(super) fn start(&mut self, expected: usize) {
        self.progress = SharedProgress::new();
        self.cancel = Arc::new(AtomicBool::new(false));
        self.conversions.clear();
        self.expected = expected;
    }
}

/// Component for a background room load
#[derive(Component)]
pub struct LoadRoomTask(pub Task<LoadResult>);

pub struct LoadResult {
    pub number: u32,
    pub files: RoomResult<LoadedRoomFiles>,
}

/// Component for converting one room
#[derive(Component)]
pub struct ConvertRoomTask(pub Task<RoomConversion>);

/// Component for the data-version pass that follows conversion
#[derive(Component)]
pub struct UpgradeDataTask(pub Task<(RoomFormatState, UpgradeReport)>);
