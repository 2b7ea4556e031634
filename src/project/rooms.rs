//! Creating, deleting and renumbering room files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bevy::log::{debug, info, warn};
use image::{Rgba, RgbaImage};

use crate::constants::{EMPTY_ROOM_SCRIPT, HIGHEST_ROOM_NUMBER, MAX_MASK_RESOLUTION};
use crate::room::{
    mask_size, Bitmap, ColorDepth, GamePalette, IndexedBitmap, MaskCache, Room, RoomDesignData,
    RoomError, RoomFormatUpgrader, RoomImage, RoomImages, RoomPersistence, RoomResult, SaveMode,
    UnloadedRoom,
};
use crate::room::xml::{read_room_xml, write_room_xml};

use super::layout::ProjectLayout;
use super::source_control::{existing, NoSourceControl, SourceControlProvider};
use super::GameSettings;

/// Text of a room script and whether it had to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomScript {
    pub text: String,
    pub created: bool,
}

fn check_new_room_number(layout: &ProjectLayout, number: u32) -> RoomResult<()> {
    if number > HIGHEST_ROOM_NUMBER {
        return Err(RoomError::RoomNumberTooHigh {
            number,
            max: HIGHEST_ROOM_NUMBER,
        });
    }
    if layout.room_files_exist(number) {
        return Err(RoomError::RoomAlreadyExists {
            number,
            path: layout.room_dir(number),
        });
    }
    Ok(())
}

fn blank_background(width: u32, height: u32, depth: ColorDepth, palette: &GamePalette) -> Bitmap {
    if depth.is_palettized() {
        Bitmap::Indexed(IndexedBitmap::new(width, height, palette.mask_palette()))
    } else {
        Bitmap::TrueColor(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])))
    }
}

/// Creates room `number` with a black background, blank masks and an
/// empty script, using the game's size, depth and mask resolution.
pub fn create_empty_room(
    persistence: &RoomPersistence,
    settings: &GameSettings,
    number: u32,
) -> RoomResult<Room> {
    let layout = persistence.layout();
    check_new_room_number(layout, number)?;

    let mut room = Room::new(number);
    room.width = settings.room_width.max(1);
    room.height = settings.room_height.max(1);
    room.right_edge_x = room.width as i32 - 1;
    room.bottom_edge_y = room.height as i32 - 1;
    room.mask_resolution = settings
        .default_room_mask_resolution
        .clamp(1, MAX_MASK_RESOLUTION);
    room.sync_interaction_script_modules();

    let depth = ColorDepth::from_bits(settings.color_depth).unwrap_or_default();
    let background = blank_background(room.width, room.height, depth, persistence.palette());
    room.color_depth = background.depth_for_room(depth);

    let (mask_w, mask_h) = mask_size(room.width, room.height, room.mask_resolution);
    let mut images = RoomImages {
        backgrounds: vec![RoomImage::dirty(background)],
        masks: MaskCache::blank(mask_w, mask_h, &persistence.palette().mask_palette()),
    };

    let saved = persistence
        .save(
            &mut room,
            &mut images,
            &RoomDesignData::default(),
            SaveMode {
                force: true,
                regenerate_legacy: true,
            },
        )
        .and_then(|_| try_load_script_and_create_missing(layout, number));
    if let Err(e) = saved {
        discard_partial_room(layout, number, &[]);
        return Err(e);
    }

    info!("Created room {}", number);
    Ok(room)
}

/// Creates room `number` from a room template: the template is unpacked
/// into the project through the legacy codec and then converted.
pub fn create_room_from_template(
    persistence: &RoomPersistence,
    template: &Path,
    number: u32,
) -> RoomResult<()> {
    let layout = persistence.layout();
    check_new_room_number(layout, number)?;

    let extracted = persistence
        .codec()
        .extract_room_template_files(template, number, layout.root())?;

    let converted = RoomFormatUpgrader::new(persistence.clone())
        .convert_room(&UnloadedRoom::new(number, ""))
        .and_then(|_| try_load_script_and_create_missing(layout, number));
    if let Err(e) = converted {
        discard_partial_room(layout, number, &extracted);
        return Err(e);
    }

    info!("Created room {} from template {:?}", number, template);
    Ok(())
}

/// Cleans up after a room that failed to be created.
fn discard_partial_room(layout: &ProjectLayout, number: u32, extra_files: &[PathBuf]) {
    for file in extra_files {
        if let Err(e) = fs::remove_file(file) {
            debug!("Could not remove {:?}: {}", file, e);
        }
    }
    if let Err(e) = delete_room_files(layout, &NoSourceControl, number) {
        warn!("Could not clean up room {}: {}", number, e);
    }
}

/// Deletes every source and compiled file of room `number`, then its
/// directory. Source control is told first and may veto the deletion.
///
/// Returns the deleted files.
pub fn delete_room_files(
    layout: &ProjectLayout,
    source_control: &dyn SourceControlProvider,
    number: u32,
) -> RoomResult<Vec<PathBuf>> {
    let mut candidates = vec![layout.crm_file(number)];
    candidates.extend(layout.room_source_files(number));
    let files = existing(candidates);

    source_control
        .delete_files(&files)
        .map_err(RoomError::SourceControl)?;
    for file in &files {
        fs::remove_file(file).map_err(RoomError::io(file))?;
    }

    let dir = layout.room_dir(number);
    if dir.is_dir() {
        // Anything the user put there themselves stays
        if let Err(e) = fs::remove_dir(&dir) {
            warn!("Room {} directory {:?} was not removed: {}", number, dir, e);
        }
    }

    info!("Deleted {} files of room {}", files.len(), number);
    Ok(files)
}

/// Gives room `old` the number `new`: moves its files and rewrites the
/// number stored in its data file. `rooms` is the project's room list.
pub fn renumber_room(
    layout: &ProjectLayout,
    source_control: &dyn SourceControlProvider,
    rooms: &mut [UnloadedRoom],
    loaded_room: Option<u32>,
    old: u32,
    new: u32,
) -> RoomResult<()> {
    if loaded_room == Some(old) {
        return Err(RoomError::RoomInUse { number: old });
    }
    if rooms.iter().any(|r| r.number == new) || layout.room_files_exist(new) {
        return Err(RoomError::RoomAlreadyExists {
            number: new,
            path: layout.room_dir(new),
        });
    }
    if new > HIGHEST_ROOM_NUMBER {
        return Err(RoomError::RoomNumberTooHigh {
            number: new,
            max: HIGHEST_ROOM_NUMBER,
        });
    }
    let entry = rooms
        .iter_mut()
        .find(|r| r.number == old)
        .ok_or(RoomError::UnknownRoom { number: old })?;

    let mut moves = vec![(layout.crm_file(old), layout.crm_file(new))];
    moves.extend(
        layout
            .room_source_files(old)
            .into_iter()
            .zip(layout.room_source_files(new)),
    );
    let moves: Vec<(PathBuf, PathBuf)> = moves.into_iter().filter(|(from, _)| from.exists()).collect();

    source_control
        .rename_files(&moves)
        .map_err(RoomError::SourceControl)?;

    let new_dir = layout.room_dir(new);
    fs::create_dir_all(&new_dir).map_err(RoomError::io(&new_dir))?;
    for (from, to) in &moves {
        fs::rename(from, to).map_err(RoomError::io(from))?;
    }
    let old_dir = layout.room_dir(old);
    if old_dir.is_dir() {
        if let Err(e) = fs::remove_dir(&old_dir) {
            warn!("Old directory {:?} was not removed: {}", old_dir, e);
        }
    }

    let data = layout.room_data_file(new);
    if data.is_file() {
        let mut room = read_room_xml(&data)?.into_room(&data)?;
        room.number = new;
        room.sync_interaction_script_modules();
        write_room_xml(&room, &data)?;
    }

    entry.number = new;
    info!("Room {} is now room {}", old, new);
    Ok(())
}

/// Reads the script of room `number`, creating an empty one if the file is
/// missing.
pub fn try_load_script_and_create_missing(
    layout: &ProjectLayout,
    number: u32,
) -> RoomResult<RoomScript> {
    let path = layout.script_file(number);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(RoomScript {
            text,
            created: false,
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "The script file {:?} is missing. An empty script has been created instead.",
                path
            );
            let dir = layout.room_dir(number);
            fs::create_dir_all(&dir).map_err(RoomError::io(&dir))?;
            fs::write(&path, EMPTY_ROOM_SCRIPT).map_err(RoomError::io(&path))?;
            Ok(RoomScript {
                text: EMPTY_ROOM_SCRIPT.to_string(),
                created: true,
            })
        }
        Err(e) => Err(RoomError::Io { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::test_support::TestProject;
    use crate::room::RoomAreaMaskType;
    use std::sync::Mutex;

    /// Records calls and optionally refuses them.
    #[derive(Default)]
    struct RecordingSourceControl {
        renamed: Mutex<Vec<(PathBuf, PathBuf)>>,
        deleted: Mutex<Vec<PathBuf>>,
        refuse: bool,
    }

    impl SourceControlProvider for RecordingSourceControl {
        fn rename_files(&self, moves: &[(PathBuf, PathBuf)]) -> Result<(), String> {
            if self.refuse {
                return Err("checked out by someone else".to_string());
            }
            self.renamed.lock().unwrap().extend_from_slice(moves);
            Ok(())
        }

        fn delete_files(&self, files: &[PathBuf]) -> Result<(), String> {
            if self.refuse {
                return Err("checked out by someone else".to_string());
            }
            self.deleted.lock().unwrap().extend_from_slice(files);
            Ok(())
        }
    }

    #[test]
    fn test_create_empty_room_uses_game_settings() {
        let project = TestProject::new();
        let settings = GameSettings {
            room_width: 640,
            room_height: 400,
            default_room_mask_resolution: 2,
            color_depth: 8,
            ..GameSettings::default()
        };

        create_empty_room(&project.persistence, &settings, 4).unwrap();

        let loaded = project.persistence.load(4).unwrap();
        assert_eq!((loaded.room.width, loaded.room.height), (640, 400));
        assert_eq!(loaded.room.color_depth, ColorDepth::Palette8);
        assert_eq!(loaded.room.mask_resolution, 2);
        let regions = &loaded.images.masks.get(RoomAreaMaskType::Regions).unwrap().image;
        assert_eq!((regions.width(), regions.height()), (320, 200));
        assert_eq!(
            fs::read_to_string(project.layout().script_file(4)).unwrap(),
            EMPTY_ROOM_SCRIPT
        );
        assert_eq!(project.codec.regenerated.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_create_empty_hicolor_room_stays_hicolor() {
        let project = TestProject::new();
        let settings = GameSettings {
            color_depth: 16,
            ..GameSettings::default()
        };

        let room = create_empty_room(&project.persistence, &settings, 6).unwrap();

        assert_eq!(room.color_depth, ColorDepth::HiColor16);
        let loaded = project.persistence.load(6).unwrap();
        assert_eq!(loaded.room.color_depth, ColorDepth::HiColor16);
    }

    #[test]
    fn test_create_refuses_existing_or_out_of_range_numbers() {
        let project = TestProject::new();
        project.write_room(1, 1);
        let settings = GameSettings::default();

        assert!(matches!(
            create_empty_room(&project.persistence, &settings, 1),
            Err(RoomError::RoomAlreadyExists { number: 1, .. })
        ));
        assert!(matches!(
            create_empty_room(&project.persistence, &settings, HIGHEST_ROOM_NUMBER + 1),
            Err(RoomError::RoomNumberTooHigh { .. })
        ));
    }

    #[test]
    fn test_create_room_from_template_converts_it() {
        let project = TestProject::new();
        create_room_from_template(&project.persistence, Path::new("blank.art"), 6).unwrap();

        let loaded = project.persistence.load(6).unwrap();
        assert_eq!(loaded.room.background_count, 2);
        assert!(project.layout().script_file(6).is_file());
    }

    #[test]
    fn test_delete_room_files_removes_everything() {
        let project = TestProject::new();
        project.write_room(3, 2);
        fs::write(project.layout().crm_file(3), b"CRM").unwrap();
        let source_control = RecordingSourceControl::default();

        let deleted = delete_room_files(project.layout(), &source_control, 3).unwrap();

        assert_eq!(deleted.len(), 1 + 1 + 2 + 4);
        assert_eq!(*source_control.deleted.lock().unwrap(), deleted);
        assert!(!project.layout().room_dir(3).exists());
        assert!(!project.layout().crm_file(3).exists());
    }

    #[test]
    fn test_source_control_can_veto_deletion() {
        let project = TestProject::new();
        project.write_room(3, 1);
        let source_control = RecordingSourceControl {
            refuse: true,
            ..RecordingSourceControl::default()
        };

        assert!(matches!(
            delete_room_files(project.layout(), &source_control, 3),
            Err(RoomError::SourceControl(_))
        ));
        assert!(project.layout().room_data_file(3).is_file());
    }

    #[test]
    fn test_renumber_moves_files_and_rewrites_number() {
        let project = TestProject::new();
        project.write_room(2, 2);
        try_load_script_and_create_missing(project.layout(), 2).unwrap();
        let mut rooms = vec![UnloadedRoom::new(2, "Hall")];
        let source_control = RecordingSourceControl::default();

        renumber_room(project.layout(), &source_control, &mut rooms, None, 2, 12).unwrap();

        let layout = project.layout();
        assert_eq!(rooms[0].number, 12);
        assert!(!layout.room_dir(2).exists());
        assert!(layout.background_file(12, 1).is_file());
        assert!(layout.script_file(12).is_file());
        assert_eq!(source_control.renamed.lock().unwrap().len(), 1 + 1 + 2 + 4);

        let loaded = project.persistence.load(12).unwrap();
        assert_eq!(loaded.room.number, 12);
        assert_eq!(loaded.room.interactions.script_module, "room12.asc");
    }

    #[test]
    fn test_renumber_refusals() {
        let project = TestProject::new();
        project.write_room(2, 1);
        project.write_room(3, 1);
        let mut rooms = vec![UnloadedRoom::new(2, ""), UnloadedRoom::new(3, "")];
        let layout = project.layout();

        assert!(matches!(
            renumber_room(layout, &NoSourceControl, &mut rooms, Some(2), 2, 5),
            Err(RoomError::RoomInUse { number: 2 })
        ));
        assert!(matches!(
            renumber_room(layout, &NoSourceControl, &mut rooms, None, 2, 3),
            Err(RoomError::RoomAlreadyExists { number: 3, .. })
        ));
        assert!(matches!(
            renumber_room(layout, &NoSourceControl, &mut rooms, None, 2, 1000),
            Err(RoomError::RoomNumberTooHigh { .. })
        ));
        assert!(matches!(
            renumber_room(layout, &NoSourceControl, &mut rooms, None, 8, 9),
            Err(RoomError::UnknownRoom { number: 8 })
        ));
    }

    #[test]
    fn test_missing_script_is_created_once() {
        let project = TestProject::new();
        project.write_room(1, 1);

        let first = try_load_script_and_create_missing(project.layout(), 1).unwrap();
        let second = try_load_script_and_create_missing(project.layout(), 1).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.text, EMPTY_ROOM_SCRIPT);
    }
}
