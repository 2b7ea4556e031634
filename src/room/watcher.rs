//! File watchers for the files backing the loaded room.
//!
//! The OS notification thread only forwards changed paths into a channel.
//! Whoever owns the room store drains the channel on its own thread and
//! applies the refresh there.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use bevy::log::{debug, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::constants::MAX_BACKGROUNDS;
use crate::project::layout::ProjectLayout;

use super::model::RoomAreaMaskType;

/// Which cache slot a watched file feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedSlot {
    Data,
    Background(usize),
    Mask(RoomAreaMaskType),
}

/// One watched file.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    pub path: PathBuf,
    pub slot: WatchedSlot,
    pub enabled: bool,
    /// Modification time of our own last write to this file
    self_written: Option<SystemTime>,
}

/// A change to a watched file, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged {
    pub room: u32,
    pub slot: WatchedSlot,
    pub path: PathBuf,
}

/// Watchers for one loaded room.
pub struct FileWatcherSet {
    room: Option<u32>,
    entries: Vec<FileWatcher>,
    suspended: Arc<AtomicBool>,
    sender: Sender<PathBuf>,
    receiver: Mutex<Receiver<PathBuf>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Default for FileWatcherSet {
    fn default() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            room: None,
            entries: Vec::new(),
            suspended: Arc::new(AtomicBool::new(false)),
            sender,
            receiver: Mutex::new(receiver),
            watcher: Mutex::new(None),
        }
    }
}

impl FileWatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self) -> Option<u32> {
        self.room
    }

    pub fn entries(&self) -> &[FileWatcher] {
        &self.entries
    }

    /// Replaces the current watchers with ones for room `number`.
    ///
    /// Background watchers at or past `background_count` start disabled.
    /// If the OS watcher cannot be created the room still loads, it just
    /// won't pick up external edits.
    pub fn watch_room(&mut self, layout: &ProjectLayout, number: u32, background_count: usize) {
        self.clear();

        self.entries.push(FileWatcher {
            path: layout.room_data_file(number),
            slot: WatchedSlot::Data,
            enabled: true,
            self_written: None,
        });
        for index in 0..MAX_BACKGROUNDS {
            self.entries.push(FileWatcher {
                path: layout.background_file(number, index),
                slot: WatchedSlot::Background(index),
                enabled: index < background_count,
                self_written: None,
            });
        }
        for &kind in RoomAreaMaskType::all() {
            if let Some(path) = layout.mask_file(number, kind) {
                self.entries.push(FileWatcher {
                    path,
                    slot: WatchedSlot::Mask(kind),
                    enabled: true,
                    self_written: None,
                });
            }
        }
        self.room = Some(number);

        match self.spawn_os_watcher(&layout.room_dir(number)) {
            Ok(watcher) => {
                *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(watcher);
                debug!("Watching files of room {}", number);
            }
            Err(e) => warn!("Live reload disabled for room {}: {}", number, e),
        }
    }

    fn spawn_os_watcher(&self, dir: &Path) -> notify::Result<RecommendedWatcher> {
        let sender = self.sender.clone();
        let suspended = self.suspended.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if suspended.load(Ordering::SeqCst) {
                return;
            }
            match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    for path in event.paths {
                        // Receiver gone means the set was dropped
                        let _ = sender.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("File watcher error: {}", e),
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }

    /// Stops watching and forgets pending notifications.
    pub fn clear(&mut self) {
        *self.watcher.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.entries.clear();
        self.room = None;
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        while receiver.try_recv().is_ok() {}
    }

    pub fn set_background_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.slot == WatchedSlot::Background(index))
        {
            entry.enabled = enabled;
        }
    }

    pub fn is_enabled(&self, slot: WatchedSlot) -> bool {
        self.entries.iter().any(|e| e.slot == slot && e.enabled)
    }

    /// Runs `f` with notifications ignored, then resumes watching.
    pub fn temporarily_disable<R>(&self, f: impl FnOnce() -> R) -> R {
        self.suspended.store(true, Ordering::SeqCst);
        let result = f();
        self.suspended.store(false, Ordering::SeqCst);
        result
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Remembers the current modification time of every watched file so
    /// that late notifications about our own writes are dropped.
    pub fn record_self_written(&mut self) {
        for entry in &mut self.entries {
            entry.self_written = modified_time(&entry.path);
        }
    }

    /// Queues a change notification for `path`, as the OS watcher does.
    pub fn notify_changed(&self, path: &Path) {
        if self.is_suspended() {
            return;
        }
        let _ = self.sender.send(path.to_path_buf());
    }

    /// Takes every pending notification and maps it to a slot of the loaded
    /// room. Disabled watchers, unknown files and files whose content is
    /// still what we wrote ourselves are skipped. Each slot appears once.
    pub fn drain(&self) -> Vec<FileChanged> {
        let Some(room) = self.room else {
            return Vec::new();
        };
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let mut seen = HashSet::new();
        let mut changes = Vec::new();

        while let Ok(path) = receiver.try_recv() {
            let Some(entry) = self.entry_for(&path) else {
                continue;
            };
            if !entry.enabled || !seen.insert(entry.slot) {
                continue;
            }
            if entry.self_written.is_some() && entry.self_written == modified_time(&entry.path) {
                debug!("Ignoring our own write to {:?}", entry.path);
                continue;
            }
            changes.push(FileChanged {
                room,
                slot: entry.slot,
                path: entry.path.clone(),
            });
        }
        changes
    }

    fn entry_for(&self, path: &Path) -> Option<&FileWatcher> {
        let name = path.file_name()?;
        self.entries
            .iter()
            .find(|e| e.path.file_name() == Some(name))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn watched_room(backgrounds: usize) -> (TempDir, ProjectLayout, FileWatcherSet) {
        let dir = TempDir::new().unwrap();
        let layout = ProjectLayout::new(dir.path());
        std::fs::create_dir_all(layout.room_dir(2)).unwrap();
        let mut set = FileWatcherSet::new();
        set.watch_room(&layout, 2, backgrounds);
        (dir, layout, set)
    }

    #[test]
    fn test_one_watcher_per_backing_file() {
        let (_dir, _layout, set) = watched_room(2);
        assert_eq!(set.entries().len(), 1 + MAX_BACKGROUNDS + 4);
        assert!(set.is_enabled(WatchedSlot::Data));
        assert!(set.is_enabled(WatchedSlot::Background(1)));
        assert!(!set.is_enabled(WatchedSlot::Background(2)));
        assert!(set.is_enabled(WatchedSlot::Mask(RoomAreaMaskType::Regions)));
    }

    #[test]
    fn test_drain_maps_and_dedups() {
        let (_dir, layout, set) = watched_room(1);
        let bg = layout.background_file(2, 0);
        set.notify_changed(&bg);
        set.notify_changed(&bg);
        set.notify_changed(&layout.room_dir(2).join("notes.txt"));

        let changes = set.drain();
        assert_eq!(
            changes,
            vec![FileChanged {
                room: 2,
                slot: WatchedSlot::Background(0),
                path: bg,
            }]
        );
        assert!(set.drain().is_empty());
    }

    #[test]
    fn test_disabled_watchers_are_skipped() {
        let (_dir, layout, mut set) = watched_room(1);
        set.notify_changed(&layout.background_file(2, 3));
        assert!(set.drain().is_empty());

        set.set_background_enabled(3, true);
        set.notify_changed(&layout.background_file(2, 3));
        assert_eq!(set.drain().len(), 1);
    }

    #[test]
    fn test_suspended_set_drops_notifications() {
        let (_dir, layout, set) = watched_room(1);
        set.temporarily_disable(|| {
            assert!(set.is_suspended());
            set.notify_changed(&layout.room_data_file(2));
        });
        assert!(!set.is_suspended());
        assert!(set.drain().is_empty());
    }

    #[test]
    fn test_own_writes_are_ignored() {
        let (_dir, layout, mut set) = watched_room(1);
        let data = layout.room_data_file(2);
        std::fs::write(&data, "<Room/>").unwrap();
        set.record_self_written();

        set.notify_changed(&data);
        assert!(set.drain().is_empty());
    }

    #[test]
    fn test_clear_forgets_room_and_pending_changes() {
        let (_dir, layout, mut set) = watched_room(1);
        set.notify_changed(&layout.room_data_file(2));
        set.clear();
        assert_eq!(set.room(), None);
        assert!(set.entries().is_empty());
        assert!(set.drain().is_empty());
    }
}
