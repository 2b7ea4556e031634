//! Writing a room's images and data file.

use std::io::ErrorKind;
use std::path::Path;

use bevy::log::debug;

use crate::constants::{MAX_BACKGROUNDS, ROOM_DATA_FILE_NAME};
use crate::project::layout::{background_file_name, mask_file_name};
use crate::room::error::{RoomError, RoomResult};
use crate::room::images::RoomImages;
use crate::room::model::Room;
use crate::room::xml::write_room_xml;

/// Writes images first and the data file last, so the data file never
/// refers to images that failed to write.
///
/// Returns the number of image files written.
pub(crate) fn write_room_dir(
    dir: &Path,
    room: &mut Room,
    images: &mut RoomImages,
    force: bool,
) -> RoomResult<usize> {
    std::fs::create_dir_all(dir).map_err(RoomError::io(dir))?;
    let mut written = 0;

    for index in 0..MAX_BACKGROUNDS {
        let path = dir.join(background_file_name(index));
        let Some(background) = images.backgrounds.get_mut(index) else {
            remove_stale_file(&path);
            continue;
        };
        if force || background.modified {
            background.image.save_png(&path)?;
            background.modified = false;
            written += 1;
        }
    }

    for (kind, mask) in images.masks.iter_mut() {
        if !(force || mask.modified) {
            continue;
        }
        let Some(name) = mask_file_name(kind) else {
            continue;
        };
        mask.image.save_png(&dir.join(name))?;
        mask.modified = false;
        written += 1;
    }

    room.background_count = images.backgrounds.len();
    write_room_xml(room, &dir.join(ROOM_DATA_FILE_NAME))?;
    room.set_modified(false);
    Ok(written)
}

/// Deletes a leftover file, ignoring failures.
fn remove_stale_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed unused background {:?}", path),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!("Could not remove unused background {:?}: {}", path, e),
    }
}
