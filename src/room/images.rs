//! Background and mask caches for the loaded room.

use super::bitmap::{Bitmap, IndexedBitmap};
use super::error::{RoomError, RoomResult};
use super::model::RoomAreaMaskType;

/// A cached image plus whether it differs from the file on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomImage<T> {
    pub image: T,
    pub modified: bool,
}

impl<T> RoomImage<T> {
    /// An image that matches its file on disk.
    pub fn clean(image: T) -> Self {
        Self {
            image,
            modified: false,
        }
    }

    /// An image that still has to be written.
    pub fn dirty(image: T) -> Self {
        Self {
            image,
            modified: true,
        }
    }
}

/// One mask per real [`RoomAreaMaskType`].
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCache {
    masks: [RoomImage<IndexedBitmap>; 4],
}

impl MaskCache {
    /// Blank masks of the given size, all flagged for writing.
    pub fn blank(width: u32, height: u32, palette: &[[u8; 3]]) -> Self {
        let make = || RoomImage::dirty(IndexedBitmap::new(width, height, palette.to_vec()));
        Self {
            masks: [make(), make(), make(), make()],
        }
    }

    pub fn get(&self, kind: RoomAreaMaskType) -> RoomResult<&RoomImage<IndexedBitmap>> {
        let slot = kind.slot().ok_or(RoomError::InvalidMaskType)?;
        Ok(&self.masks[slot])
    }

    pub fn get_mut(&mut self, kind: RoomAreaMaskType) -> RoomResult<&mut RoomImage<IndexedBitmap>> {
        let slot = kind.slot().ok_or(RoomError::InvalidMaskType)?;
        Ok(&mut self.masks[slot])
    }

    pub fn set(&mut self, kind: RoomAreaMaskType, image: RoomImage<IndexedBitmap>) -> RoomResult<()> {
        *self.get_mut(kind)? = image;
        Ok(())
    }

    /// Masks paired with their type, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (RoomAreaMaskType, &RoomImage<IndexedBitmap>)> {
        RoomAreaMaskType::all().iter().copied().zip(self.masks.iter())
    }

    pub fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (RoomAreaMaskType, &mut RoomImage<IndexedBitmap>)> {
        RoomAreaMaskType::all().iter().copied().zip(self.masks.iter_mut())
    }
}

/// All images belonging to one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomImages {
    pub backgrounds: Vec<RoomImage<Bitmap>>,
    pub masks: MaskCache,
}

impl RoomImages {
    pub fn any_modified(&self) -> bool {
        self.backgrounds.iter().any(|b| b.modified) || self.masks.iter().any(|(_, m)| m.modified)
    }

    pub fn mark_all_modified(&mut self) {
        for bg in &mut self.backgrounds {
            bg.modified = true;
        }
        for (_, mask) in self.masks.iter_mut() {
            mask.modified = true;
        }
    }

    pub fn clear_modified(&mut self) {
        for bg in &mut self.backgrounds {
            bg.modified = false;
        }
        for (_, mask) in self.masks.iter_mut() {
            mask.modified = false;
        }
    }
}
