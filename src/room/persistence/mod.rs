//! Open-format room storage.
//!
//! A room is stored as `room<N>/room.xml` plus one PNG per background and
//! one per area mask. This module reads and writes those files and, on an
//! ordinary save, asks the legacy codec to rebuild the compiled `.crm`.
//!
//! ## Module Structure
//!
//! - [`results`] - Loaded files, load warnings and save outcomes
//! - `load` - Reading a room directory
//! - `save` - Writing images then the data file
//!
//! All disk access for rooms goes through one [`RoomPersistence`] and its
//! clones, which share a single I/O lock.

mod load;
mod results;
mod save;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bevy::log::{error, info, warn};
use chrono::Local;

use crate::project::layout::ProjectLayout;

use super::design_data::RoomDesignData;
use super::error::RoomResult;
use super::images::RoomImages;
use super::model::Room;
use super::native::LegacyRoomCodec;
use super::palette::GamePalette;

pub(crate) use load::{load_background, load_mask, read_room_dir};
pub use results::{LoadWarning, LoadedRoomFiles, SaveMode, SaveOutcome};

/// Reads and writes rooms of one project.
#[derive(Clone)]
pub struct RoomPersistence {
    layout: ProjectLayout,
    codec: Arc<dyn LegacyRoomCodec>,
    palette: Arc<GamePalette>,
    io_lock: Arc<Mutex<()>>,
    files_read: Arc<AtomicUsize>,
}

impl RoomPersistence {
    pub fn new(layout: ProjectLayout, codec: Arc<dyn LegacyRoomCodec>, palette: GamePalette) -> Self {
        Self {
            layout,
            codec,
            palette: Arc::new(palette),
            io_lock: Arc::new(Mutex::new(())),
            files_read: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn palette(&self) -> &GamePalette {
        &self.palette
    }

    pub fn codec(&self) -> &dyn LegacyRoomCodec {
        self.codec.as_ref()
    }

    /// Number of files read from disk so far, across all clones.
    pub fn files_read(&self) -> usize {
        self.files_read.load(Ordering::Relaxed)
    }

    pub(crate) fn files_read_counter(&self) -> &AtomicUsize {
        &self.files_read
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.io_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads room `number` from its directory.
    pub fn load(&self, number: u32) -> RoomResult<LoadedRoomFiles> {
        let _guard = self.lock();
        read_room_dir(
            &self.layout.room_dir(number),
            number,
            &self.palette,
            &self.files_read,
        )
    }

    /// Saves a loaded room.
    ///
    /// Nothing is written for an unmodified room unless `mode.force` is set.
    /// The design sidecar is always written; failing to write it is only
    /// logged. When the compiled room cannot be regenerated the open-format
    /// files stay saved and the failure is reported in
    /// [`SaveOutcome::legacy_crm`].
    pub fn save(
        &self,
        room: &mut Room,
        images: &mut RoomImages,
        design: &RoomDesignData,
        mode: SaveMode,
    ) -> RoomResult<SaveOutcome> {
        let _guard = self.lock();
        let dir = self.layout.room_dir(room.number);

        let mut images_written = 0;
        let data_written = mode.force || room.is_modified() || images.any_modified();
        if data_written {
            images_written = save::write_room_dir(&dir, room, images, mode.force)?;
            info!(
                "Saved room {} ({} images written)",
                room.number, images_written
            );
        }

        if let Err(e) = design.save(&self.layout.user_file(room.number)) {
            warn!("Unable to write design-time preferences of room {}: {}", room.number, e);
        }

        let saved_at = Local::now();
        let legacy_crm = if mode.regenerate_legacy {
            self.codec
                .regenerate_legacy_crm(&self.layout.crm_file(room.number), &dir, room, images)
        } else {
            Ok(())
        };
        if let Err(e) = &legacy_crm {
            error!("Room {} saved but the compiled room was not updated: {}", room.number, e);
        }

        Ok(SaveOutcome {
            saved_at,
            images_written,
            data_written,
            legacy_crm,
        })
    }

    /// Writes every file of a room in open format without touching the
    /// compiled room. Used for conversions and new rooms; callers make sure
    /// no one else is writing the same room.
    pub fn write_open_format(&self, room: &mut Room, images: &mut RoomImages) -> RoomResult<usize> {
        save::write_room_dir(&self.layout.room_dir(room.number), room, images, true)
    }
}
