//! Unit tests for room persistence.

use crate::room::bitmap::{ColorDepth, IndexedBitmap};
use crate::room::design_data::RoomDesignData;
use crate::room::error::RoomError;
use crate::room::images::RoomImage;
use crate::room::model::RoomAreaMaskType;
use crate::room::test_support::{background, FakeCodec, TestProject};
use crate::room::xml::room_to_xml;

use super::{LoadWarning, SaveMode};

#[test]
fn test_save_then_load_round_trip() {
    let project = TestProject::new();
    let (mut room, mut images) = project.write_room(3, 2);
    room.hotspots[2].name = "hWindow".to_string();
    room.set_modified(true);
    project
        .persistence
        .save(&mut room, &mut images, &RoomDesignData::default(), SaveMode::default())
        .unwrap();

    let loaded = project.persistence.load(3).unwrap();

    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    assert!(!loaded.room.is_modified());
    let path = project.layout().room_data_file(3);
    assert_eq!(
        room_to_xml(&loaded.room, &path).unwrap(),
        room_to_xml(&room, &path).unwrap()
    );
    assert_eq!(loaded.images, images);
}

#[test]
fn test_hicolor_room_keeps_its_depth() {
    let project = TestProject::new();
    let (mut room, mut images) = project.write_room(5, 1);
    room.color_depth = ColorDepth::HiColor16;
    room.set_modified(true);
    project
        .persistence
        .save(&mut room, &mut images, &RoomDesignData::default(), SaveMode::default())
        .unwrap();

    let loaded = project.persistence.load(5).unwrap();

    assert_eq!(loaded.room.color_depth, ColorDepth::HiColor16);
    assert!(!loaded.room.is_modified());
}

#[test]
fn test_depth_follows_background_when_class_differs() {
    let project = TestProject::new();
    let (mut room, mut images) = project.write_room(6, 1);
    room.color_depth = ColorDepth::Palette8;
    room.set_modified(true);
    project
        .persistence
        .save(&mut room, &mut images, &RoomDesignData::default(), SaveMode::default())
        .unwrap();

    let loaded = project.persistence.load(6).unwrap();

    assert_eq!(loaded.room.color_depth, ColorDepth::TrueColor32);
}

#[test]
fn test_missing_directory_is_reported_with_path() {
    let project = TestProject::new();
    let err = project.persistence.load(9).unwrap_err();
    match &err {
        RoomError::RoomDirectoryMissing { number, path } => {
            assert_eq!(*number, 9);
            assert_eq!(path, &project.layout().room_dir(9));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("Exclude From Game"));
}

#[test]
fn test_missing_data_file_is_reported() {
    let project = TestProject::new();
    project.write_room(2, 1);
    std::fs::remove_file(project.layout().room_data_file(2)).unwrap();
    assert!(matches!(
        project.persistence.load(2),
        Err(RoomError::RoomDataMissing { number: 2, .. })
    ));
}

#[test]
fn test_missing_primary_background_is_fatal() {
    let project = TestProject::new();
    project.write_room(2, 1);
    std::fs::remove_file(project.layout().background_file(2, 0)).unwrap();
    assert!(matches!(
        project.persistence.load(2),
        Err(RoomError::PrimaryBackgroundMissing { number: 2, .. })
    ));
}

#[test]
fn test_missing_background_reduces_count() {
    let project = TestProject::new();
    project.write_room(4, 3);
    std::fs::remove_file(project.layout().background_file(4, 2)).unwrap();

    let loaded = project.persistence.load(4).unwrap();

    assert_eq!(loaded.room.background_count, 2);
    assert_eq!(loaded.images.backgrounds.len(), 2);
    assert!(loaded.room.is_modified());
    assert!(loaded.warnings.contains(&LoadWarning::BackgroundCountCorrected {
        recorded: 3,
        found: 2
    }));
}

#[test]
fn test_extra_background_files_raise_count() {
    let project = TestProject::new();
    project.write_room(4, 1);
    background(320, 200, 1)
        .save_png(&project.layout().background_file(4, 1))
        .unwrap();

    let loaded = project.persistence.load(4).unwrap();

    assert_eq!(loaded.room.background_count, 2);
    assert!(loaded.room.is_modified());
}

#[test]
fn test_missing_mask_is_synthesized() {
    let project = TestProject::new();
    project.write_room(1, 1);
    let path = project
        .layout()
        .mask_file(1, RoomAreaMaskType::Regions)
        .unwrap();
    std::fs::remove_file(&path).unwrap();

    let loaded = project.persistence.load(1).unwrap();

    let regions = loaded.images.masks.get(RoomAreaMaskType::Regions).unwrap();
    assert_eq!((regions.image.width(), regions.image.height()), (320, 200));
    assert!(regions.modified);
    assert!(loaded.room.is_modified());
    assert!(loaded.warnings.contains(&LoadWarning::MaskMissing {
        kind: RoomAreaMaskType::Regions,
        path
    }));
}

#[test]
fn test_out_of_range_mask_pixels_are_stripped_on_load() {
    let project = TestProject::new();
    project.write_room(1, 1);
    let mut bad = IndexedBitmap::new(320, 200, vec![[0, 0, 0]; 256]);
    bad.put(0, 0, 40);
    bad.put(1, 0, 3);
    bad.save_png(
        &project
            .layout()
            .mask_file(1, RoomAreaMaskType::WalkBehinds)
            .unwrap(),
    )
    .unwrap();

    let loaded = project.persistence.load(1).unwrap();

    let mask = &loaded.images.masks.get(RoomAreaMaskType::WalkBehinds).unwrap().image;
    assert_eq!(mask.get(0, 0), Some(0));
    assert_eq!(mask.get(1, 0), Some(3));
    assert!(loaded.warnings.contains(&LoadWarning::MaskPixelsStripped {
        kind: RoomAreaMaskType::WalkBehinds,
        count: 1
    }));
}

#[test]
fn test_mis_sized_mask_is_rescaled() {
    let project = TestProject::new();
    project.write_room(1, 1);
    IndexedBitmap::new(160, 100, vec![[0, 0, 0]; 256])
        .save_png(
            &project
                .layout()
                .mask_file(1, RoomAreaMaskType::Hotspots)
                .unwrap(),
        )
        .unwrap();

    let loaded = project.persistence.load(1).unwrap();

    let mask = &loaded.images.masks.get(RoomAreaMaskType::Hotspots).unwrap().image;
    assert_eq!((mask.width(), mask.height()), (320, 200));
    assert!(loaded.warnings.iter().any(|w| matches!(
        w,
        LoadWarning::MaskRescaled {
            kind: RoomAreaMaskType::Hotspots,
            from: (160, 100),
            ..
        }
    )));
}

#[test]
fn test_save_writes_only_modified_images() {
    let project = TestProject::new();
    project.write_room(6, 2);
    let mut loaded = project.persistence.load(6).unwrap();

    loaded.images.backgrounds[1] = RoomImage::dirty(background(320, 200, 4));
    loaded.room.set_modified(true);
    let outcome = project
        .persistence
        .save(
            &mut loaded.room,
            &mut loaded.images,
            &loaded.design,
            SaveMode::default(),
        )
        .unwrap();

    assert!(outcome.data_written);
    assert_eq!(outcome.images_written, 1);
    assert!(!loaded.images.any_modified());
    assert_eq!(project.codec.regenerated.lock().unwrap().len(), 1);
}

#[test]
fn test_unmodified_room_is_not_rewritten() {
    let project = TestProject::new();
    project.write_room(6, 1);
    let mut loaded = project.persistence.load(6).unwrap();

    let outcome = project
        .persistence
        .save(
            &mut loaded.room,
            &mut loaded.images,
            &loaded.design,
            SaveMode {
                force: false,
                regenerate_legacy: false,
            },
        )
        .unwrap();

    assert!(!outcome.data_written);
    assert_eq!(outcome.images_written, 0);
    assert!(project.codec.regenerated.lock().unwrap().is_empty());
}

#[test]
fn test_save_removes_unused_background_files() {
    let project = TestProject::new();
    let (mut room, mut images) = project.write_room(8, 3);
    images.backgrounds.truncate(1);
    room.set_modified(true);

    project
        .persistence
        .save(&mut room, &mut images, &RoomDesignData::default(), SaveMode::default())
        .unwrap();

    assert_eq!(room.background_count, 1);
    assert!(project.layout().background_file(8, 0).exists());
    assert!(!project.layout().background_file(8, 1).exists());
    assert!(!project.layout().background_file(8, 2).exists());
}

#[test]
fn test_failed_crm_regeneration_keeps_room_saved() {
    let project = TestProject::with_codec(FakeCodec {
        fail_regenerate: true,
        ..FakeCodec::default()
    });
    let (mut room, mut images) = project.write_room(5, 1);
    room.description = "Changed".to_string();
    room.set_modified(true);

    let outcome = project
        .persistence
        .save(&mut room, &mut images, &RoomDesignData::default(), SaveMode::default())
        .unwrap();

    assert!(matches!(outcome.legacy_crm, Err(RoomError::LegacyTool { .. })));
    assert!(!room.is_modified());
    assert_eq!(project.persistence.load(5).unwrap().room.description, "Changed");
}

#[test]
fn test_corrupt_design_data_is_ignored() {
    let project = TestProject::new();
    project.write_room(2, 1);
    std::fs::write(project.layout().user_file(2), "garbage").unwrap();

    let loaded = project.persistence.load(2).unwrap();

    assert_eq!(loaded.design, RoomDesignData::default());
    assert!(loaded
        .warnings
        .iter()
        .any(|w| matches!(w, LoadWarning::DesignDataIgnored { .. })));
}

#[test]
fn test_load_counts_file_reads() {
    let project = TestProject::new();
    project.write_room(2, 2);
    let before = project.persistence.files_read();
    project.persistence.load(2).unwrap();
    // data file + 2 backgrounds + 4 masks
    assert_eq!(project.persistence.files_read() - before, 7);
}
