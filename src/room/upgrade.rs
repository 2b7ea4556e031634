//! Migration of a project's rooms to the open format.
//!
//! Rooms still stored as compiled `.crm` files are decoded through the
//! legacy codec and written out as `room<N>/` directories. Each room is
//! converted independently, so the work is spread over a task pool and a
//! failed room never affects the others. The project marker only flips to
//! [`RoomFormatVersion::Open`] once every room made it; until then a retry
//! picks up the rooms that are left.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bevy::log::{error, info, warn};
use bevy::tasks::TaskPool;
use serde::{Deserialize, Serialize};

use crate::constants::LATEST_XML_VERSION;
use crate::project::layout::make_unique_directory;

use super::error::{RoomError, RoomResult};
use super::model::UnloadedRoom;
use super::persistence::{LoadWarning, LoadedRoomFiles, RoomPersistence};
use super::progress::ProgressReporter;
use super::xml::{read_room_xml, write_room_xml};

/// Storage format of a project's rooms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RoomFormatVersion {
    #[default]
    Legacy,
    Open,
}

/// Upgrade progress persisted in the project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RoomFormatState {
    pub version: RoomFormatVersion,
    /// Rooms already converted by an earlier, incomplete upgrade
    #[serde(default)]
    pub converted_rooms: BTreeSet<u32>,
    /// Data file version every room was last brought up to
    #[serde(default)]
    pub xml_version: Option<String>,
}

impl RoomFormatState {
    /// State of a project whose rooms were created in open format.
    pub fn open() -> Self {
        Self {
            version: RoomFormatVersion::Open,
            converted_rooms: BTreeSet::new(),
            xml_version: Some(LATEST_XML_VERSION.to_string()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.version == RoomFormatVersion::Open
    }

    /// Rooms that still have to be converted.
    pub fn pending<'a>(&self, rooms: &'a [UnloadedRoom]) -> Vec<&'a UnloadedRoom> {
        if self.is_open() {
            return Vec::new();
        }
        rooms
            .iter()
            .filter(|r| !self.converted_rooms.contains(&r.number))
            .collect()
    }

    /// Records a conversion run. Flips to open format when no room is left.
    pub fn apply(&mut self, report: &UpgradeReport, rooms: &[UnloadedRoom]) {
        self.converted_rooms.extend(report.converted.iter().copied());
        if rooms.iter().all(|r| self.converted_rooms.contains(&r.number)) {
            self.version = RoomFormatVersion::Open;
            self.converted_rooms.clear();
            info!("All {} rooms are in open format", rooms.len());
        }
    }
}

/// What happened to one room during a batch.
#[derive(Debug)]
pub enum RoomConversion {
    Converted {
        number: u32,
        backup: Option<PathBuf>,
        /// Repairs the decoder made to the compiled room
        warnings: Vec<LoadWarning>,
    },
    /// Already at the target format, nothing written
    UpToDate { number: u32 },
    Failed { number: u32, error: RoomError },
    /// Not attempted because the batch was cancelled
    Skipped { number: u32 },
}

/// Outcome of a batch over the project's rooms.
#[derive(Debug, Default)]
pub struct UpgradeReport {
    pub converted: Vec<u32>,
    pub up_to_date: Vec<u32>,
    pub failed: Vec<(u32, RoomError)>,
    pub skipped: Vec<u32>,
    /// Directories moved aside because they were in the way
    pub backups: Vec<PathBuf>,
    /// Repairs made while converting, by room
    pub warnings: Vec<(u32, LoadWarning)>,
}

impl UpgradeReport {
    pub fn from_conversions(conversions: impl IntoIterator<Item = RoomConversion>) -> Self {
        let mut report = Self::default();
        for conversion in conversions {
            report.record(conversion);
        }
        report.converted.sort_unstable();
        report.up_to_date.sort_unstable();
        report.skipped.sort_unstable();
        report.failed.sort_by_key(|(number, _)| *number);
        report.warnings.sort_by_key(|(number, _)| *number);
        report
    }

    pub fn record(&mut self, conversion: RoomConversion) {
        match conversion {
            RoomConversion::Converted {
                number,
                backup,
                warnings,
            } => {
                self.converted.push(number);
                self.backups.extend(backup);
                self.warnings
                    .extend(warnings.into_iter().map(|warning| (number, warning)));
            }
            RoomConversion::UpToDate { number } => self.up_to_date.push(number),
            RoomConversion::Failed { number, error } => self.failed.push((number, error)),
            RoomConversion::Skipped { number } => self.skipped.push(number),
        }
    }

    /// Appends the results of a later pass over the same rooms.
    pub fn merge(&mut self, other: UpgradeReport) {
        self.converted.extend(other.converted);
        self.up_to_date.extend(other.up_to_date);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
        self.backups.extend(other.backups);
        self.warnings.extend(other.warnings);
    }

    /// Every attempted room succeeded and none were skipped.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Human readable list of per-room failures.
    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|(number, e)| format!("Room {number}: {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A room written in open format by [`RoomFormatUpgrader::convert_room`].
#[derive(Debug, Default)]
pub struct ConvertedRoom {
    /// Where a directory that was in the way was moved to
    pub backup: Option<PathBuf>,
    pub warnings: Vec<LoadWarning>,
}

/// Converts rooms of one project. Cheap to clone into background tasks.
#[derive(Clone)]
pub struct RoomFormatUpgrader {
    persistence: RoomPersistence,
}

impl RoomFormatUpgrader {
    pub fn new(persistence: RoomPersistence) -> Self {
        Self { persistence }
    }

    /// Converts one legacy room to open format.
    ///
    /// The compiled room is decoded first, so a room that cannot be read
    /// leaves the disk untouched. An existing `room<N>` directory is moved
    /// to `room<N>-Backup-<k>` before writing.
    pub fn convert_room(&self, unloaded: &UnloadedRoom) -> RoomResult<ConvertedRoom> {
        let layout = self.persistence.layout();
        let number = unloaded.number;
        let crm = layout.crm_file(number);

        let LoadedRoomFiles {
            mut room,
            mut images,
            warnings,
            ..
        } = self
            .persistence
            .codec()
            .decode_legacy_crm(&crm, number, self.persistence.palette())?;

        let dir = layout.room_dir(number);
        let backup = if dir.exists() {
            let backup = make_unique_directory(layout.root(), &format!("room{number}"), "-Backup-");
            fs::rename(&dir, &backup).map_err(RoomError::io(&dir))?;
            warn!("Moved existing {:?} to {:?} before converting", dir, backup);
            Some(backup)
        } else {
            None
        };

        room.number = number;
        room.description = unloaded.description.clone();
        room.sync_interaction_script_modules();
        images.mark_all_modified();
        self.persistence.write_open_format(&mut room, &mut images)?;

        move_if_present(&layout.legacy_script_file(number), &layout.script_file(number))?;
        move_if_present(&layout.legacy_user_file(number), &layout.user_file(number))?;

        for warning in &warnings {
            warn!("Room {}: {} while converting", number, warning);
        }
        info!("Converted room {} to open format", number);
        Ok(ConvertedRoom { backup, warnings })
    }

    /// Converts one room as part of a batch of `total` and reports progress.
    /// Does nothing once `cancel` is set.
    pub fn convert_reported(
        &self,
        unloaded: &UnloadedRoom,
        completed: &AtomicUsize,
        total: usize,
        progress: &dyn ProgressReporter,
        cancel: &AtomicBool,
    ) -> RoomConversion {
        let number = unloaded.number;
        if cancel.load(Ordering::SeqCst) {
            return RoomConversion::Skipped { number };
        }

        let result = self.convert_room(unloaded);
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        progress.report(
            done,
            total,
            &format!("Converting rooms from .crm to open format. {done} of {total} rooms converted."),
        );

        match result {
            Ok(converted) => RoomConversion::Converted {
                number,
                backup: converted.backup,
                warnings: converted.warnings,
            },
            Err(error) => {
                error!("Failed to convert room {}: {}", number, error);
                RoomConversion::Failed { number, error }
            }
        }
    }

    /// Converts `rooms` in parallel on `pool`, blocking until all are done.
    pub fn run(
        &self,
        rooms: &[&UnloadedRoom],
        pool: &TaskPool,
        progress: &dyn ProgressReporter,
        cancel: &AtomicBool,
    ) -> UpgradeReport {
        let total = rooms.len();
        let completed = AtomicUsize::new(0);
        let conversions = pool.scope(|scope| {
            for &room in rooms {
                let completed = &completed;
                scope.spawn(async move {
                    self.convert_reported(room, completed, total, progress, cancel)
                });
            }
        });
        UpgradeReport::from_conversions(conversions)
    }

    /// Converts whatever rooms of the project are still in legacy format
    /// and updates `state` accordingly.
    pub fn upgrade_project(
        &self,
        state: &mut RoomFormatState,
        rooms: &[UnloadedRoom],
        pool: &TaskPool,
        progress: &dyn ProgressReporter,
        cancel: &AtomicBool,
    ) -> UpgradeReport {
        if state.is_open() {
            return UpgradeReport::default();
        }
        let pending = state.pending(rooms);
        info!(
            "Converting {} of {} rooms to open format",
            pending.len(),
            rooms.len()
        );
        let report = self.run(&pending, pool, progress, cancel);
        state.apply(&report, rooms);
        report
    }

    /// Rewrites the data file of one open-format room if it was saved by an
    /// older version, re-pointing its interactions at the room script.
    pub fn upgrade_room_data(&self, number: u32) -> RoomResult<bool> {
        let path = self.persistence.layout().room_data_file(number);
        let mut room = read_room_xml(&path)?.into_room(&path)?;
        let outdated = room
            .saved_xml_version
            .as_deref()
            .is_none_or(|v| is_older_version(v, LATEST_XML_VERSION));
        if !outdated {
            return Ok(false);
        }

        room.number = number;
        room.sync_interaction_script_modules();
        write_room_xml(&room, &path)?;
        info!(
            "Upgraded data of room {} from version {}",
            number,
            room.saved_xml_version.as_deref().unwrap_or("unknown")
        );
        Ok(true)
    }

    /// Brings every room's data file up to the latest version. Only runs on
    /// open-format projects that were not upgraded to this version yet.
    pub fn upgrade_all_room_data(
        &self,
        state: &mut RoomFormatState,
        rooms: &[UnloadedRoom],
        progress: &dyn ProgressReporter,
    ) -> UpgradeReport {
        if !state.is_open() || state.xml_version.as_deref() == Some(LATEST_XML_VERSION) {
            return UpgradeReport::default();
        }

        let total = rooms.len();
        let mut report = UpgradeReport::default();
        for (i, unloaded) in rooms.iter().enumerate() {
            let number = unloaded.number;
            report.record(match self.upgrade_room_data(number) {
                Ok(true) => RoomConversion::Converted {
                    number,
                    backup: None,
                    warnings: Vec::new(),
                },
                Ok(false) => RoomConversion::UpToDate { number },
                Err(error) => {
                    error!("Failed to upgrade room {}: {}", number, error);
                    RoomConversion::Failed { number, error }
                }
            });
            progress.report(
                i + 1,
                total,
                &format!("Upgrading rooms. {} of {total} rooms upgraded.", i + 1),
            );
        }

        if report.is_complete() {
            state.xml_version = Some(LATEST_XML_VERSION.to_string());
        }
        report
    }
}

fn move_if_present(from: &Path, to: &Path) -> RoomResult<()> {
    if !from.exists() {
        return Ok(());
    }
    fs::rename(from, to).map_err(RoomError::io(from))
}

/// Compares dotted numeric versions; missing parts count as 0.
fn is_older_version(version: &str, than: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };
    let (a, b) = (parse(version), parse(than));
    let len = a.len().max(b.len());
    let at = |parts: &[u32], i: usize| parts.get(i).copied().unwrap_or(0);
    for i in 0..len {
        match at(&a, i).cmp(&at(&b, i)) {
            std::cmp::Ordering::Less => return true,
            std::cmp::Ordering::Greater => return false,
            std::cmp::Ordering::Equal => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::layout::ProjectLayout;
    use crate::room::model::RoomAreaMaskType;
    use crate::room::native::LegacyRoomCodec;
    use crate::room::palette::GamePalette;
    use crate::room::progress::SharedProgress;
    use crate::room::test_support::{FakeCodec, TestProject};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn legacy_project(codec: FakeCodec, rooms: &[u32]) -> (TestProject, Vec<UnloadedRoom>) {
        let project = TestProject::with_codec(codec);
        let mut unloaded = Vec::new();
        for &number in rooms {
            project
                .codec
                .save_default_room(&project.layout().crm_file(number))
                .unwrap();
            unloaded.push(UnloadedRoom::new(number, format!("Room {number}")));
        }
        (project, unloaded)
    }

    fn upgrader(project: &TestProject) -> RoomFormatUpgrader {
        RoomFormatUpgrader::new(project.persistence.clone())
    }

    #[test]
    fn test_existing_directory_is_backed_up() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[5]);
        let layout = project.layout();
        fs::create_dir_all(layout.room_dir(5)).unwrap();
        fs::write(layout.room_dir(5).join("notes.txt"), "keep me").unwrap();

        let converted = upgrader(&project).convert_room(&rooms[0]).unwrap();

        let backup = converted.backup.unwrap();
        assert_eq!(backup, layout.root().join("room5-Backup-0"));
        assert_eq!(
            fs::read_to_string(backup.join("notes.txt")).unwrap(),
            "keep me"
        );
        assert!(layout.room_data_file(5).is_file());
        assert!(!layout.room_dir(5).join("notes.txt").exists());

        let loaded = project.persistence.load(5).unwrap();
        assert_eq!(loaded.room.description, "Room 5");
        assert_eq!(loaded.room.background_count, 2);
        assert_eq!(loaded.room.interactions.script_module, "room5.asc");
        let hotspots = &loaded.images.masks.get(RoomAreaMaskType::Hotspots).unwrap().image;
        assert_eq!(hotspots.get(10, 10), Some(3));
    }

    #[test]
    fn test_backup_uses_next_free_number() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[5]);
        let layout = project.layout();
        fs::create_dir_all(layout.room_dir(5)).unwrap();
        fs::create_dir_all(layout.root().join("room5-Backup-0")).unwrap();

        let converted = upgrader(&project).convert_room(&rooms[0]).unwrap();
        assert_eq!(converted.backup, Some(layout.root().join("room5-Backup-1")));
    }

    #[test]
    fn test_failed_decode_leaves_directory_alone() {
        let (project, rooms) = legacy_project(
            FakeCodec {
                fail_decode: HashSet::from([4]),
                ..FakeCodec::default()
            },
            &[4],
        );
        let layout = project.layout();
        fs::create_dir_all(layout.room_dir(4)).unwrap();

        assert!(upgrader(&project).convert_room(&rooms[0]).is_err());
        assert!(layout.room_dir(4).is_dir());
        assert!(!layout.root().join("room4-Backup-0").exists());
    }

    #[test]
    fn test_legacy_script_and_user_files_move_into_room_dir() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[2]);
        let layout = project.layout();
        fs::write(layout.legacy_script_file(2), "function room_Load() {}").unwrap();
        fs::write(layout.legacy_user_file(2), "<AGSRoomUserData/>").unwrap();

        upgrader(&project).convert_room(&rooms[0]).unwrap();

        assert_eq!(
            fs::read_to_string(layout.script_file(2)).unwrap(),
            "function room_Load() {}"
        );
        assert!(layout.user_file(2).is_file());
        assert!(!layout.legacy_script_file(2).exists());
        assert!(!layout.legacy_user_file(2).exists());
    }

    #[test]
    fn test_failed_room_keeps_project_in_legacy_state() {
        let (project, rooms) = legacy_project(
            FakeCodec {
                fail_decode: HashSet::from([2]),
                ..FakeCodec::default()
            },
            &[1, 2, 3],
        );
        let pool = TaskPool::new();
        let mut state = RoomFormatState::default();

        let report = upgrader(&project).upgrade_project(
            &mut state,
            &rooms,
            &pool,
            &SharedProgress::new(),
            &AtomicBool::new(false),
        );

        assert_eq!(report.converted, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(!report.is_complete());
        assert!(report.failure_summary().contains("Room 2"));
        assert_eq!(state.version, RoomFormatVersion::Legacy);
        assert_eq!(state.converted_rooms, BTreeSet::from([1, 3]));

        // Retry with a working codec only touches the remaining room
        let persistence = RoomPersistence::new(
            ProjectLayout::new(project.dir.path()),
            Arc::new(FakeCodec::default()),
            GamePalette::default(),
        );
        let report = RoomFormatUpgrader::new(persistence).upgrade_project(
            &mut state,
            &rooms,
            &pool,
            &SharedProgress::new(),
            &AtomicBool::new(false),
        );
        assert_eq!(report.converted, vec![2]);
        assert!(state.is_open());
        assert!(state.converted_rooms.is_empty());
    }

    #[test]
    fn test_decoder_repairs_are_reported() {
        let repair = LoadWarning::BackgroundCountCorrected {
            recorded: 3,
            found: 2,
        };
        let (project, rooms) = legacy_project(
            FakeCodec {
                decode_warnings: vec![repair.clone()],
                ..FakeCodec::default()
            },
            &[4, 1],
        );
        let mut state = RoomFormatState::default();

        let report = upgrader(&project).upgrade_project(
            &mut state,
            &rooms,
            &TaskPool::new(),
            &SharedProgress::new(),
            &AtomicBool::new(false),
        );

        assert!(report.is_complete());
        assert_eq!(report.warnings, vec![(1, repair.clone()), (4, repair)]);
    }

    #[test]
    fn test_cancelled_upgrade_converts_nothing() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[1, 2]);
        let mut state = RoomFormatState::default();

        let report = upgrader(&project).upgrade_project(
            &mut state,
            &rooms,
            &TaskPool::new(),
            &SharedProgress::new(),
            &AtomicBool::new(true),
        );

        assert_eq!(report.skipped, vec![1, 2]);
        assert!(report.converted.is_empty());
        assert!(!report.is_complete());
        assert!(!state.is_open());
        assert!(!project.layout().room_dir(1).exists());
    }

    #[test]
    fn test_progress_counts_rooms() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[1, 2]);
        let progress = SharedProgress::new();
        let pending: Vec<&UnloadedRoom> = rooms.iter().collect();

        upgrader(&project).run(&pending, &TaskPool::new(), &progress, &AtomicBool::new(false));

        assert_eq!(progress.completed(), 2);
        assert_eq!(progress.total(), 2);
        assert_eq!(
            progress.message(),
            "Converting rooms from .crm to open format. 2 of 2 rooms converted."
        );
    }

    #[test]
    fn test_open_project_is_not_converted_again() {
        let (project, rooms) = legacy_project(FakeCodec::default(), &[1]);
        let mut state = RoomFormatState::open();

        let report = upgrader(&project).upgrade_project(
            &mut state,
            &rooms,
            &TaskPool::new(),
            &SharedProgress::new(),
            &AtomicBool::new(false),
        );

        assert!(report.converted.is_empty());
        assert!(!project.layout().room_dir(1).exists());
    }

    #[test]
    fn test_outdated_room_data_is_rewritten() {
        let project = TestProject::new();
        let (mut room, _) = project.write_room(1, 1);
        room.interactions.script_module = "global.asc".to_string();
        let path = project.layout().room_data_file(1);
        write_room_xml(&room, &path).unwrap();
        let xml = fs::read_to_string(&path).unwrap();
        fs::write(
            &path,
            xml.replace(
                &format!("Version=\"{LATEST_XML_VERSION}\""),
                "Version=\"3.99.99.01\"",
            ),
        )
        .unwrap();
        project.write_room(2, 1);

        let mut state = RoomFormatState {
            xml_version: None,
            ..RoomFormatState::open()
        };
        let rooms = vec![UnloadedRoom::new(1, ""), UnloadedRoom::new(2, "")];
        let report = upgrader(&project).upgrade_all_room_data(&mut state, &rooms, &SharedProgress::new());

        assert_eq!(report.converted, vec![1]);
        assert_eq!(report.up_to_date, vec![2]);
        assert_eq!(state.xml_version.as_deref(), Some(LATEST_XML_VERSION));
        let upgraded = read_room_xml(&path).unwrap().into_room(&path).unwrap();
        assert_eq!(upgraded.saved_xml_version.as_deref(), Some(LATEST_XML_VERSION));
        assert_eq!(upgraded.interactions.script_module, "room1.asc");
    }

    #[test]
    fn test_version_ordering() {
        assert!(is_older_version("3.99.99.01", "4.00.00.21"));
        assert!(is_older_version("4.00.00.20", "4.00.00.21"));
        assert!(!is_older_version("4.00.00.21", "4.00.00.21"));
        assert!(!is_older_version("4.1", "4.00.00.21"));
    }
}
