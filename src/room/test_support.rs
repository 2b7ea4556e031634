//! Fixtures shared by the room tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use crate::project::layout::ProjectLayout;

use super::bitmap::Bitmap;
use super::design_data::RoomDesignData;
use super::error::{RoomError, RoomResult};
use super::images::{MaskCache, RoomImage, RoomImages};
use super::model::{Room, RoomAreaMaskType};
use super::native::LegacyRoomCodec;
use super::palette::GamePalette;
use super::persistence::{LoadWarning, LoadedRoomFiles, RoomPersistence};

/// In-memory stand-in for the external room tool.
#[derive(Default)]
pub struct FakeCodec {
    pub regenerated: Mutex<Vec<PathBuf>>,
    pub fail_regenerate: bool,
    pub fail_decode: HashSet<u32>,
    /// Repairs reported with every decoded room
    pub decode_warnings: Vec<LoadWarning>,
}

impl LegacyRoomCodec for FakeCodec {
    fn decode_legacy_crm(
        &self,
        crm: &Path,
        number: u32,
        palette: &GamePalette,
    ) -> RoomResult<LoadedRoomFiles> {
        if self.fail_decode.contains(&number) || !crm.exists() {
            return Err(RoomError::LegacyTool {
                path: crm.to_path_buf(),
                message: "corrupt room".to_string(),
            });
        }
        let mut room = Room::new(number);
        room.description = "decoded".to_string();
        let mut images = sample_images(&room, palette, 2);
        images
            .masks
            .get_mut(RoomAreaMaskType::Hotspots)?
            .image
            .put(10, 10, 3);
        room.background_count = 2;
        Ok(LoadedRoomFiles {
            room,
            images,
            design: RoomDesignData::default(),
            warnings: self.decode_warnings.clone(),
        })
    }

    fn regenerate_legacy_crm(
        &self,
        crm: &Path,
        _room_dir: &Path,
        _room: &Room,
        _images: &RoomImages,
    ) -> RoomResult<()> {
        if let Ok(mut calls) = self.regenerated.lock() {
            calls.push(crm.to_path_buf());
        }
        if self.fail_regenerate {
            return Err(RoomError::LegacyTool {
                path: crm.to_path_buf(),
                message: "encoder crashed".to_string(),
            });
        }
        Ok(())
    }

    fn save_default_room(&self, crm: &Path) -> RoomResult<()> {
        std::fs::write(crm, b"CRM").map_err(RoomError::io(crm))
    }

    fn extract_room_template_files(
        &self,
        _template: &Path,
        number: u32,
        dest_dir: &Path,
    ) -> RoomResult<Vec<PathBuf>> {
        let crm = dest_dir.join(format!("room{number}.crm"));
        std::fs::write(&crm, b"CRM").map_err(RoomError::io(&crm))?;
        Ok(vec![crm])
    }
}

/// A truecolor background with a marker pixel that differs per index.
pub fn background(width: u32, height: u32, index: usize) -> Bitmap {
    let mut image = RgbaImage::from_pixel(width, height, Rgba([20, 40, 60, 255]));
    image.put_pixel(index as u32, 0, Rgba([255, index as u8 * 40, 0, 255]));
    Bitmap::TrueColor(image)
}

pub fn sample_images(room: &Room, palette: &GamePalette, backgrounds: usize) -> RoomImages {
    let mask_palette = palette.mask_palette();
    let (w, h) = super::mask::mask_size(room.width, room.height, room.mask_resolution);
    RoomImages {
        backgrounds: (0..backgrounds)
            .map(|i| RoomImage::dirty(background(room.width, room.height, i)))
            .collect(),
        masks: MaskCache::blank(w, h, &mask_palette),
    }
}

pub struct TestProject {
    pub dir: TempDir,
    pub persistence: RoomPersistence,
    pub codec: Arc<FakeCodec>,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_codec(FakeCodec::default())
    }

    pub fn with_codec(codec: FakeCodec) -> Self {
        let dir = TempDir::new().unwrap();
        let codec = Arc::new(codec);
        let persistence = RoomPersistence::new(
            ProjectLayout::new(dir.path()),
            codec.clone(),
            GamePalette::default(),
        );
        Self {
            dir,
            persistence,
            codec,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        self.persistence.layout()
    }

    /// Writes a 320x200 room with `backgrounds` backgrounds and a marked
    /// hotspot pixel at (5, 5).
    pub fn write_room(&self, number: u32, backgrounds: usize) -> (Room, RoomImages) {
        let mut room = Room::new(number);
        room.description = format!("Room {number}");
        room.background_count = backgrounds;
        let mut images = sample_images(&room, self.persistence.palette(), backgrounds);
        images
            .masks
            .get_mut(RoomAreaMaskType::Hotspots)
            .unwrap()
            .image
            .put(5, 5, 2);
        self.persistence
            .write_open_format(&mut room, &mut images)
            .unwrap();
        (room, images)
    }
}
