//! Reading a room directory into memory.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::log::{debug, warn};

use crate::constants::{MAX_BACKGROUNDS, ROOM_DATA_FILE_NAME};
use crate::project::layout::{background_file_name, mask_file_name, user_file_name};
use crate::room::bitmap::{Bitmap, IndexedBitmap};
use crate::room::design_data::RoomDesignData;
use crate::room::error::{RoomError, RoomResult};
use crate::room::images::{MaskCache, RoomImage, RoomImages};
use crate::room::mask::{create_mask, mask_size, validate_mask, MaskValidation};
use crate::room::model::{Room, RoomAreaMaskType};
use crate::room::palette::GamePalette;
use crate::room::xml::read_room_xml;

use super::results::{LoadWarning, LoadedRoomFiles};

/// Reads a background PNG. Palettized images get the game's fixed palette
/// slots applied.
pub(crate) fn load_background(
    path: &Path,
    palette: &GamePalette,
    files_read: &AtomicUsize,
) -> RoomResult<Bitmap> {
    files_read.fetch_add(1, Ordering::Relaxed);
    let mut bitmap = Bitmap::load_png(path)?;
    if let Bitmap::Indexed(indexed) = &mut bitmap {
        palette.enforce_locked_entries(indexed.palette_mut());
    }
    Ok(bitmap)
}

/// A mask read from disk and fitted to the room.
pub(crate) struct LoadedMask {
    pub image: IndexedBitmap,
    pub validation: MaskValidation,
    /// Original size when the file had to be scaled
    pub rescaled_from: Option<(u32, u32)>,
}

pub(crate) fn load_mask(
    room: &Room,
    kind: RoomAreaMaskType,
    path: &Path,
    palette: &GamePalette,
    files_read: &AtomicUsize,
) -> RoomResult<LoadedMask> {
    files_read.fetch_add(1, Ordering::Relaxed);
    let bitmap = Bitmap::load_png(path)?;
    let (mut image, validation) = validate_mask(room.number, kind, bitmap, &palette.mask_palette())?;

    let expected = mask_size(room.width, room.height, room.mask_resolution);
    let actual = (image.width(), image.height());
    let rescaled_from = if actual != expected {
        image = image.scale_indexed(expected.0, expected.1);
        Some(actual)
    } else {
        None
    };

    Ok(LoadedMask {
        image,
        validation,
        rescaled_from,
    })
}

/// Reads the data file, backgrounds, masks and design sidecar of a room.
///
/// Only a missing directory, data file or primary background fails the
/// load. Everything else is repaired and reported as a [`LoadWarning`].
pub(crate) fn read_room_dir(
    dir: &Path,
    number: u32,
    palette: &GamePalette,
    files_read: &AtomicUsize,
) -> RoomResult<LoadedRoomFiles> {
    if !dir.is_dir() {
        return Err(RoomError::RoomDirectoryMissing {
            number,
            path: dir.to_path_buf(),
        });
    }
    let data_path = dir.join(ROOM_DATA_FILE_NAME);
    if !data_path.is_file() {
        return Err(RoomError::RoomDataMissing {
            number,
            path: data_path,
        });
    }
    let primary = dir.join(background_file_name(0));
    if !primary.is_file() {
        return Err(RoomError::PrimaryBackgroundMissing {
            number,
            path: primary,
        });
    }

    files_read.fetch_add(1, Ordering::Relaxed);
    let mut room = read_room_xml(&data_path)?.into_room(&data_path)?;
    room.number = number;
    let mut warnings = Vec::new();

    // Backgrounds are positional, so the first gap ends the list
    let mut backgrounds = Vec::new();
    for index in 0..MAX_BACKGROUNDS {
        let path = dir.join(background_file_name(index));
        if !path.is_file() {
            break;
        }
        backgrounds.push(RoomImage::clean(load_background(&path, palette, files_read)?));
    }
    if backgrounds.len() != room.background_count {
        warnings.push(LoadWarning::BackgroundCountCorrected {
            recorded: room.background_count,
            found: backgrounds.len(),
        });
        room.background_count = backgrounds.len();
        room.set_modified(true);
    }

    let (width, height) = backgrounds[0].image.dimensions();
    room.width = width;
    room.height = height;
    room.color_depth = backgrounds[0].image.depth_for_room(room.color_depth);

    let mask_palette = palette.mask_palette();
    let mut masks = MaskCache::blank(1, 1, &mask_palette);
    for &kind in RoomAreaMaskType::all() {
        let Some(name) = mask_file_name(kind) else {
            continue;
        };
        let path = dir.join(name);
        let slot = masks.get_mut(kind)?;

        if !path.is_file() {
            *slot = RoomImage::dirty(create_mask(&room, &mask_palette));
            warnings.push(LoadWarning::MaskMissing { kind, path });
            room.set_modified(true);
            continue;
        }

        match load_mask(&room, kind, &path, palette, files_read) {
            Ok(loaded) => {
                let mut dirty = false;
                if loaded.validation.corrected() {
                    warnings.push(LoadWarning::MaskPixelsStripped {
                        kind,
                        count: loaded.validation.stripped_pixels,
                    });
                    dirty = true;
                }
                if let Some(from) = loaded.rescaled_from {
                    warnings.push(LoadWarning::MaskRescaled {
                        kind,
                        from,
                        to: (loaded.image.width(), loaded.image.height()),
                    });
                    dirty = true;
                }
                room.mark_modified_if(dirty);
                *slot = RoomImage {
                    image: loaded.image,
                    modified: dirty,
                };
            }
            Err(e) => {
                *slot = RoomImage::dirty(create_mask(&room, &mask_palette));
                warnings.push(LoadWarning::MaskUnreadable {
                    kind,
                    path,
                    reason: e.to_string(),
                });
                room.set_modified(true);
            }
        }
    }

    let user_path = dir.join(user_file_name(number));
    if user_path.is_file() {
        files_read.fetch_add(1, Ordering::Relaxed);
    }
    let design = match RoomDesignData::load(&user_path) {
        Ok(design) => design,
        Err(e) => {
            warnings.push(LoadWarning::DesignDataIgnored {
                path: user_path,
                reason: e.to_string(),
            });
            RoomDesignData::default()
        }
    };

    for warning in &warnings {
        warn!("Room {}: {}", number, warning);
    }
    debug!(
        "Read room {} from {:?}: {}x{}, {} backgrounds",
        number,
        dir,
        room.width,
        room.height,
        backgrounds.len()
    );

    Ok(LoadedRoomFiles {
        room,
        images: RoomImages { backgrounds, masks },
        design,
        warnings,
    })
}
