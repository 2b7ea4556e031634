//! The single resident room and its image caches.
//!
//! [`RoomAssetStore`] owns at most one fully loaded [`Room`]. Loading a
//! different room replaces it; loading the same number again is a cache
//! hit. Every accessor hands out copies so callers never mutate the caches
//! behind the store's back.

use std::path::Path;
use std::sync::atomic::Ordering;

use bevy::log::{debug, info, warn};
use bevy::prelude::Resource;
use chrono::{DateTime, Local};

use crate::constants::MAX_BACKGROUNDS;

use super::bitmap::{Bitmap, IndexedBitmap};
use super::design_data::RoomDesignData;
use super::error::{RoomError, RoomResult};
use super::images::{RoomImage, RoomImages};
use super::mask::{self, mask_size, validate_mask, MaskValidation, RescaleOutcome};
use super::model::{Room, RoomAreaMaskType};
use super::palette::RemapStats;
use super::persistence::{
    load_background, load_mask, LoadWarning, LoadedRoomFiles, RoomPersistence, SaveMode,
    SaveOutcome,
};
use super::watcher::{FileWatcherSet, WatchedSlot};
use super::xml::read_room_xml;

/// Lifecycle of the resident room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomStoreState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

struct LoadedRoom {
    room: Room,
    images: RoomImages,
    design: RoomDesignData,
    warnings: Vec<LoadWarning>,
}

/// Side effects of [`RoomAssetStore::set_background`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundChange {
    pub appended: bool,
    /// The room size changed, so every mask was replaced by a blank one
    pub masks_reset: bool,
    /// Palette statistics for 8-bit backgrounds
    pub remap: Option<RemapStats>,
}

#[derive(Resource)]
pub struct RoomAssetStore {
    persistence: RoomPersistence,
    loaded: Option<LoadedRoom>,
    watchers: FileWatcherSet,
    state: RoomStoreState,
    last_saved_at: Option<DateTime<Local>>,
    is_being_saved: bool,
    remap_palettized_backgrounds: bool,
}

impl RoomAssetStore {
    pub fn new(persistence: RoomPersistence) -> Self {
        Self {
            persistence,
            loaded: None,
            watchers: FileWatcherSet::new(),
            state: RoomStoreState::Unloaded,
            last_saved_at: None,
            is_being_saved: false,
            remap_palettized_backgrounds: true,
        }
    }

    /// Whether 8-bit backgrounds are remapped onto free palette slots
    /// (otherwise their pixel indices are kept exactly).
    pub fn with_palette_remap(mut self, remap: bool) -> Self {
        self.remap_palettized_backgrounds = remap;
        self
    }

    pub fn persistence(&self) -> &RoomPersistence {
        &self.persistence
    }

    pub fn state(&self) -> RoomStoreState {
        self.state
    }

    /// Flags a background load as in flight; finished by [`Self::install`]
    /// or [`Self::cancel_loading`].
    pub fn begin_loading(&mut self) {
        self.state = RoomStoreState::Loading;
    }

    pub fn cancel_loading(&mut self) {
        self.state = if self.loaded.is_some() {
            RoomStoreState::Loaded
        } else {
            RoomStoreState::Unloaded
        };
    }

    pub fn loaded_room_number(&self) -> Option<u32> {
        self.loaded.as_ref().map(|l| l.room.number)
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.loaded.as_ref().map(|l| &l.room)
    }

    pub fn current_room_mut(&mut self) -> Option<&mut Room> {
        self.loaded.as_mut().map(|l| &mut l.room)
    }

    pub fn design(&self) -> Option<&RoomDesignData> {
        self.loaded.as_ref().map(|l| &l.design)
    }

    pub fn design_mut(&mut self) -> Option<&mut RoomDesignData> {
        self.loaded.as_mut().map(|l| &mut l.design)
    }

    /// Warnings produced when the resident room was loaded.
    pub fn load_warnings(&self) -> &[LoadWarning] {
        self.loaded.as_ref().map_or(&[], |l| l.warnings.as_slice())
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Local>> {
        self.last_saved_at
    }

    pub fn is_being_saved(&self) -> bool {
        self.is_being_saved
    }

    pub fn watchers(&self) -> &FileWatcherSet {
        &self.watchers
    }

    fn resident(&self) -> RoomResult<&LoadedRoom> {
        self.loaded.as_ref().ok_or(RoomError::NoRoomLoaded)
    }

    /// Makes room `number` the resident room and returns it.
    ///
    /// If it is already resident nothing is read. On failure the previously
    /// resident room stays loaded.
    pub fn load(&mut self, number: u32) -> RoomResult<&mut Room> {
        if self.loaded_room_number() == Some(number) {
            debug!("Room {} already loaded", number);
            return self.current_room_mut().ok_or(RoomError::NoRoomLoaded);
        }

        self.begin_loading();
        match self.persistence.load(number) {
            Ok(files) => Ok(self.install(files)),
            Err(e) => {
                self.cancel_loading();
                Err(e)
            }
        }
    }

    /// Replaces the resident room with files read elsewhere (for example by
    /// a background task) and starts watching them.
    pub fn install(&mut self, files: LoadedRoomFiles) -> &mut Room {
        let LoadedRoomFiles {
            room,
            images,
            design,
            warnings,
        } = files;
        self.unload();

        self.watchers
            .watch_room(self.persistence.layout(), room.number, images.backgrounds.len());
        info!("Loaded room {}", room.number);
        self.state = RoomStoreState::Loaded;

        let loaded = self.loaded.insert(LoadedRoom {
            room,
            images,
            design,
            warnings,
        });
        &mut loaded.room
    }

    /// Drops the resident room and its watchers. Unsaved edits are lost.
    pub fn unload(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            info!("Unloaded room {}", loaded.room.number);
        }
        self.watchers.clear();
        self.state = RoomStoreState::Unloaded;
    }

    /// Saves the resident room with its watchers suspended.
    ///
    /// A failure to regenerate the compiled room does not fail the save; it
    /// is returned in [`SaveOutcome::legacy_crm`].
    pub fn save(&mut self, mode: SaveMode) -> RoomResult<SaveOutcome> {
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        let persistence = &self.persistence;

        self.is_being_saved = true;
        let result = self.watchers.temporarily_disable(|| {
            persistence.save(&mut loaded.room, &mut loaded.images, &loaded.design, mode)
        });
        self.is_being_saved = false;

        let outcome = result?;
        self.watchers.record_self_written();
        self.last_saved_at = Some(outcome.saved_at);
        Ok(outcome)
    }

    /// Copy of background `index`.
    pub fn background(&self, index: usize) -> RoomResult<Bitmap> {
        let loaded = self.resident()?;
        loaded
            .images
            .backgrounds
            .get(index)
            .map(|b| b.image.clone())
            .ok_or(RoomError::BackgroundOutOfRange {
                number: loaded.room.number,
                index,
                count: loaded.images.backgrounds.len(),
            })
    }

    /// Replaces background `index`, or appends one when `index` equals the
    /// current count.
    ///
    /// All backgrounds share one color depth; only a room's sole background
    /// may change it. A new size resets every mask.
    pub fn set_background(&mut self, index: usize, mut bitmap: Bitmap) -> RoomResult<BackgroundChange> {
        let exact = !self.remap_palettized_backgrounds;
        let palette = self.persistence.palette();
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        let room = &mut loaded.room;
        let count = loaded.images.backgrounds.len();

        if index > count {
            return Err(RoomError::BackgroundOutOfRange {
                number: room.number,
                index,
                count,
            });
        }
        if index == count && count >= MAX_BACKGROUNDS {
            return Err(RoomError::TooManyBackgrounds {
                number: room.number,
                max: MAX_BACKGROUNDS,
            });
        }
        if bitmap.is_empty() {
            return Err(RoomError::EmptyBackground {
                number: room.number,
                index,
            });
        }
        let depth = bitmap.depth_for_room(room.color_depth);
        let sole_background = index == 0 && count == 1;
        if depth != room.color_depth && !sole_background {
            return Err(RoomError::ColorDepthMismatch {
                number: room.number,
                expected: room.color_depth.bits(),
                found: depth.bits(),
            });
        }

        let remap = match &mut bitmap {
            Bitmap::Indexed(image) => {
                let stats = palette.remap_background(image, exact);
                if stats.exceeds_limit() {
                    warn!(
                        "Background {} of room {} uses {} colours but only {} palette slots are free; some colours were lost",
                        index, room.number, stats.colors_image, stats.colors_limit
                    );
                }
                Some(stats)
            }
            Bitmap::TrueColor(_) => None,
        };

        let (width, height) = bitmap.dimensions();
        let masks_reset = (width, height) != (room.width, room.height);
        if masks_reset {
            room.width = width;
            room.height = height;
            mask::reset_masks(room, &mut loaded.images.masks, &palette.mask_palette());
            info!(
                "Room {} is now {}x{}; its masks were cleared",
                room.number, width, height
            );
        }
        room.color_depth = depth;

        let appended = index == count;
        if appended {
            loaded.images.backgrounds.push(RoomImage::dirty(bitmap));
            room.background_count = loaded.images.backgrounds.len();
            self.watchers.set_background_enabled(index, true);
        } else {
            loaded.images.backgrounds[index] = RoomImage::dirty(bitmap);
        }
        room.set_modified(true);

        Ok(BackgroundChange {
            appended,
            masks_reset,
            remap,
        })
    }

    /// Removes background `index`; later backgrounds move down one slot.
    pub fn delete_background(&mut self, index: usize) -> RoomResult<()> {
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        let room = &mut loaded.room;
        let count = loaded.images.backgrounds.len();

        if index >= count {
            return Err(RoomError::BackgroundOutOfRange {
                number: room.number,
                index,
                count,
            });
        }
        if count == 1 {
            return Err(RoomError::LastBackground {
                number: room.number,
            });
        }

        loaded.images.backgrounds.remove(index);
        // Shifted backgrounds now belong to different files
        for bg in loaded.images.backgrounds.iter_mut().skip(index) {
            bg.modified = true;
        }
        room.background_count = count - 1;
        room.set_modified(true);
        self.watchers.set_background_enabled(count - 1, false);
        Ok(())
    }

    /// Copy of the `kind` mask.
    pub fn mask(&self, kind: RoomAreaMaskType) -> RoomResult<IndexedBitmap> {
        Ok(self.resident()?.images.masks.get(kind)?.image.clone())
    }

    /// Validates `bitmap` and stores it as the `kind` mask.
    ///
    /// Out-of-range pixels are cleared and reported in the returned
    /// [`MaskValidation`]. An image that cannot be repaired is rejected and
    /// the current mask is left untouched.
    pub fn set_mask(&mut self, kind: RoomAreaMaskType, bitmap: Bitmap) -> RoomResult<MaskValidation> {
        let mask_palette = self.persistence.palette().mask_palette();
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        let room = &mut loaded.room;

        let (mut image, validation) = validate_mask(room.number, kind, bitmap, &mask_palette)?;
        let (w, h) = mask_size(room.width, room.height, room.mask_resolution);
        if (image.width(), image.height()) != (w, h) {
            debug!(
                "Scaling {} mask of room {} from {}x{} to {}x{}",
                kind,
                room.number,
                image.width(),
                image.height(),
                w,
                h
            );
            image = image.scale_indexed(w, h);
        }

        loaded.images.masks.set(kind, RoomImage::dirty(image))?;
        room.set_modified(true);
        Ok(validation)
    }

    /// Area number under room coordinate (`x`, `y`); 0 outside the mask.
    pub fn area_mask_pixel(&self, kind: RoomAreaMaskType, x: i32, y: i32) -> RoomResult<u8> {
        let loaded = self.resident()?;
        let mask = &loaded.images.masks.get(kind)?.image;
        if x < 0 || y < 0 {
            return Ok(0);
        }
        let resolution = loaded.room.mask_resolution.max(1);
        Ok(mask
            .get(x as u32 / resolution, y as u32 / resolution)
            .unwrap_or(0))
    }

    /// See [`mask::adjust_mask_resolution`]. Confirming a lossy change with
    /// the user is up to the caller.
    pub fn adjust_mask_resolution(&mut self, resolution: u32) -> RoomResult<RescaleOutcome> {
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        mask::adjust_mask_resolution(&mut loaded.room, &mut loaded.images.masks, resolution)
    }

    pub fn reset_masks(&mut self) -> RoomResult<()> {
        let mask_palette = self.persistence.palette().mask_palette();
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        mask::reset_masks(&loaded.room, &mut loaded.images.masks, &mask_palette);
        loaded.room.set_modified(true);
        Ok(())
    }

    /// See [`mask::resize_masks`].
    pub fn resize_masks(
        &mut self,
        do_scale: bool,
        new_width: u32,
        new_height: u32,
        x_offset: i64,
        y_offset: i64,
    ) -> RoomResult<()> {
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        mask::resize_masks(
            &loaded.room,
            &mut loaded.images.masks,
            do_scale,
            new_width,
            new_height,
            x_offset,
            y_offset,
        )?;
        loaded.room.set_modified(true);
        Ok(())
    }

    /// Applies pending external file changes to the resident room and
    /// returns the slots that were refreshed.
    pub fn process_file_changes(&mut self) -> Vec<WatchedSlot> {
        let mut refreshed = Vec::new();
        for change in self.watchers.drain() {
            if self.loaded_room_number() != Some(change.room) {
                debug!("Dropping change to {:?}, room {} is no longer loaded", change.path, change.room);
                continue;
            }
            match self.refresh(change.slot, &change.path) {
                Ok(true) => refreshed.push(change.slot),
                Ok(false) => {}
                Err(e) => warn!("Could not reload {:?}: {}", change.path, e),
            }
        }
        refreshed
    }

    fn refresh(&mut self, slot: WatchedSlot, path: &Path) -> RoomResult<bool> {
        let palette = self.persistence.palette();
        let files_read = self.persistence.files_read_counter();
        let loaded = self.loaded.as_mut().ok_or(RoomError::NoRoomLoaded)?;
        let room = &mut loaded.room;

        match slot {
            WatchedSlot::Data => {
                files_read.fetch_add(1, Ordering::Relaxed);
                let saved = read_room_xml(path)?;
                // Geometry comes from the cached backgrounds, not the file
                let number = room.number;
                let (width, height) = (room.width, room.height);
                let color_depth = room.color_depth;
                let background_count = room.background_count;
                let mask_resolution = room.mask_resolution;
                saved.apply_to(room, path)?;
                room.number = number;
                room.width = width;
                room.height = height;
                room.color_depth = color_depth;
                room.background_count = background_count;
                room.mask_resolution = mask_resolution;
            }
            WatchedSlot::Background(index) => {
                if index >= loaded.images.backgrounds.len() {
                    return Ok(false);
                }
                let bitmap = load_background(path, palette, files_read)?;
                if index == 0 && bitmap.dimensions() != (room.width, room.height) {
                    let (width, height) = bitmap.dimensions();
                    room.width = width;
                    room.height = height;
                    mask::reset_masks(room, &mut loaded.images.masks, &palette.mask_palette());
                }
                loaded.images.backgrounds[index] = RoomImage::clean(bitmap);
            }
            WatchedSlot::Mask(kind) => match load_mask(room, kind, path, palette, files_read) {
                Ok(mask) => {
                    let modified = mask.validation.corrected() || mask.rescaled_from.is_some();
                    loaded.images.masks.set(
                        kind,
                        RoomImage {
                            image: mask.image,
                            modified,
                        },
                    )?;
                }
                Err(e) => {
                    warn!("Keeping the previous {} mask of room {}: {}", kind, room.number, e);
                    return Ok(false);
                }
            },
        }

        room.set_modified(true);
        debug!("Reloaded {:?} of room {}", slot, room.number);
        Ok(true)
    }
}
