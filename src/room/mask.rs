//! Area mask sizing, validation and rescaling.
//!
//! Every mask of a room shares one resolution: a mask pixel covers
//! `mask_resolution x mask_resolution` room pixels.

use bevy::log::{debug, warn};

use crate::constants::MAX_MASK_RESOLUTION;

use super::bitmap::{Bitmap, IndexedBitmap};
use super::error::{RoomError, RoomResult};
use super::images::{MaskCache, RoomImage};
use super::model::{Room, RoomAreaMaskType};

/// Explanation shown whenever out-of-range mask colors were removed.
pub const MASK_PALETTE_HELP: &str = "When drawing a mask in an external paint package, make sure \
the image is set as 256-colour (indexed palette) and that you only use the first palette \
entries for drawing your areas. Palette entry 0 corresponds to No Area, palette index 1 \
corresponds to area 1, and so forth.";

/// Pixel size of a mask for a room of `width x height` at `resolution`.
pub fn mask_size(width: u32, height: u32, resolution: u32) -> (u32, u32) {
    let resolution = resolution.max(1);
    ((width / resolution).max(1), (height / resolution).max(1))
}

/// A blank mask sized for the room's current dimensions and resolution.
pub fn create_mask(room: &Room, palette: &[[u8; 3]]) -> IndexedBitmap {
    let (w, h) = mask_size(room.width, room.height, room.mask_resolution);
    IndexedBitmap::new(w, h, palette.to_vec())
}

/// Outcome of a successful mask validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskValidation {
    /// Pixels whose value was out of range and were reset to "no area"
    pub stripped_pixels: usize,
}

impl MaskValidation {
    pub fn corrected(&self) -> bool {
        self.stripped_pixels > 0
    }

    /// User-facing note about the correction, if one happened.
    pub fn message(&self, kind: RoomAreaMaskType) -> Option<String> {
        self.corrected().then(|| {
            format!(
                "Invalid colours were found in the {kind} mask ({} pixels). They have now been removed.\n\n{MASK_PALETTE_HELP}",
                self.stripped_pixels
            )
        })
    }
}

/// Checks that `image` can be used as a `kind` mask and repairs what can be
/// repaired: the palette is replaced by the game mask palette and pixel
/// values `>= max_color(kind)` become 0.
///
/// Only images that are not 8-bit, or are empty, are rejected.
pub fn validate_mask(
    room_number: u32,
    kind: RoomAreaMaskType,
    image: Bitmap,
    mask_palette: &[[u8; 3]],
) -> RoomResult<(IndexedBitmap, MaskValidation)> {
    let max_color = kind.max_color().ok_or(RoomError::InvalidMaskType)?;
    let invalid = |reason: &str| RoomError::InvalidMask {
        number: room_number,
        mask: kind,
        reason: reason.to_string(),
    };

    let mut mask = match image {
        Bitmap::Indexed(mask) => mask,
        Bitmap::TrueColor(_) => return Err(invalid("make sure it's an 8-bit image")),
    };
    if mask.is_empty() {
        return Err(invalid("the image is empty"));
    }

    mask.set_palette(mask_palette.to_vec());

    let mut stripped_pixels = 0;
    for p in mask.pixels_mut() {
        if *p as usize >= max_color {
            *p = 0;
            stripped_pixels += 1;
        }
    }
    if stripped_pixels > 0 {
        warn!(
            "Stripped {} out-of-range pixels from the {} mask of room {}",
            stripped_pixels, kind, room_number
        );
    }

    Ok((mask, MaskValidation { stripped_pixels }))
}

/// Result of a mask resolution change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescaleOutcome {
    pub previous: u32,
    pub current: u32,
    /// Masks were scaled down and may have lost detail
    pub lossy: bool,
}

/// Changes the room's mask resolution and index-scales every mask to match.
///
/// Going to a coarser resolution discards detail; the outcome reports this
/// through `lossy` and the change is applied regardless.
pub fn adjust_mask_resolution(
    room: &mut Room,
    masks: &mut MaskCache,
    resolution: u32,
) -> RoomResult<RescaleOutcome> {
    if resolution == 0 || resolution > MAX_MASK_RESOLUTION {
        return Err(RoomError::InvalidMaskResolution {
            value: resolution,
            max: MAX_MASK_RESOLUTION,
        });
    }

    let previous = room.mask_resolution;
    room.mask_resolution = resolution;
    let (w, h) = mask_size(room.width, room.height, resolution);
    for (_, mask) in masks.iter_mut() {
        *mask = RoomImage::dirty(mask.image.scale_indexed(w, h));
    }
    room.set_modified(true);

    debug!(
        "Room {} mask resolution {} -> {} ({}x{})",
        room.number, previous, resolution, w, h
    );

    Ok(RescaleOutcome {
        previous,
        current: resolution,
        lossy: resolution > previous,
    })
}

/// Replaces every mask with a blank one of the room's current size.
pub fn reset_masks(room: &Room, masks: &mut MaskCache, mask_palette: &[[u8; 3]]) {
    for (_, mask) in masks.iter_mut() {
        *mask = RoomImage::dirty(create_mask(room, mask_palette));
    }
}

/// Resizes every mask for a room that is about to become
/// `new_width x new_height`.
///
/// With `do_scale` the old content is stretched over the new size, otherwise
/// it is kept at its size and moved by (`x_offset`, `y_offset`) room pixels.
pub fn resize_masks(
    room: &Room,
    masks: &mut MaskCache,
    do_scale: bool,
    new_width: u32,
    new_height: u32,
    x_offset: i64,
    y_offset: i64,
) -> RoomResult<()> {
    if new_width == 0 || new_height == 0 {
        return Err(RoomError::InvalidMask {
            number: room.number,
            mask: RoomAreaMaskType::None,
            reason: "masks cannot be resized to an empty size".to_string(),
        });
    }

    let resolution = room.mask_resolution.max(1) as i64;
    let (canvas_w, canvas_h) = mask_size(new_width, new_height, room.mask_resolution);
    for (_, mask) in masks.iter_mut() {
        let (draw_w, draw_h) = if do_scale {
            (canvas_w, canvas_h)
        } else {
            (mask.image.width(), mask.image.height())
        };
        mask.image = mask.image.resize_scale_and_offset(
            draw_w,
            draw_h,
            canvas_w,
            canvas_h,
            x_offset / resolution,
            y_offset / resolution,
        );
        mask.modified = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<[u8; 3]> {
        vec![[0, 0, 0]; 256]
    }

    fn room_320x200() -> (Room, MaskCache) {
        let room = Room::new(3);
        let masks = MaskCache::blank(320, 200, &palette());
        (room, masks)
    }

    #[test]
    fn test_mask_size_floors_with_minimum_of_one() {
        assert_eq!(mask_size(320, 200, 1), (320, 200));
        assert_eq!(mask_size(320, 200, 3), (106, 66));
        assert_eq!(mask_size(2, 2, 4), (1, 1));
        assert_eq!(mask_size(320, 200, 0), (320, 200));
    }

    #[test]
    fn test_adjust_mask_resolution_sizes_every_mask() {
        for m in 1..=MAX_MASK_RESOLUTION {
            let (mut room, mut masks) = room_320x200();
            adjust_mask_resolution(&mut room, &mut masks, m).unwrap();
            for (_, mask) in masks.iter() {
                assert_eq!(
                    (mask.image.width(), mask.image.height()),
                    (320 / m, 200 / m)
                );
                assert!(mask.modified);
            }
            assert_eq!(room.mask_resolution, m);
            assert!(room.is_modified());
        }
    }

    #[test]
    fn test_coarser_resolution_is_lossy_and_not_reversible() {
        let (mut room, mut masks) = room_320x200();
        let hotspots = masks.get_mut(RoomAreaMaskType::Hotspots).unwrap();
        // A one pixel wide vertical line at x = 1
        for y in 0..200 {
            hotspots.image.put(1, y, 5);
        }
        let before = hotspots.image.clone();

        let down = adjust_mask_resolution(&mut room, &mut masks, 4).unwrap();
        assert!(down.lossy);
        let hotspots = &masks.get(RoomAreaMaskType::Hotspots).unwrap().image;
        assert_eq!((hotspots.width(), hotspots.height()), (80, 50));

        let up = adjust_mask_resolution(&mut room, &mut masks, 1).unwrap();
        assert!(!up.lossy);
        assert_eq!(up.previous, 4);
        let restored = &masks.get(RoomAreaMaskType::Hotspots).unwrap().image;
        assert_eq!((restored.width(), restored.height()), (320, 200));
        assert_ne!(restored, &before);
        assert!(restored.pixels().iter().all(|p| *p == 0));
    }

    #[test]
    fn test_adjust_rejects_out_of_range_resolution() {
        let (mut room, mut masks) = room_320x200();
        assert!(matches!(
            adjust_mask_resolution(&mut room, &mut masks, 0),
            Err(RoomError::InvalidMaskResolution { .. })
        ));
        assert!(adjust_mask_resolution(&mut room, &mut masks, MAX_MASK_RESOLUTION + 1).is_err());
        assert_eq!(room.mask_resolution, 1);
    }

    #[test]
    fn test_validate_mask_strips_out_of_range_pixels() {
        let mut image = IndexedBitmap::new(4, 4, vec![[9, 9, 9]; 4]);
        image.put(0, 0, 15);
        image.put(1, 0, 16);
        image.put(2, 0, 200);

        let (mask, result) =
            validate_mask(1, RoomAreaMaskType::Regions, Bitmap::Indexed(image), &palette())
                .unwrap();

        assert_eq!(result.stripped_pixels, 2);
        assert!(result.message(RoomAreaMaskType::Regions).is_some());
        assert_eq!(mask.get(0, 0), Some(15));
        assert_eq!(mask.get(1, 0), Some(0));
        assert_eq!(mask.get(2, 0), Some(0));
        assert_eq!(mask.palette().len(), 256);
    }

    #[test]
    fn test_validate_mask_rejects_truecolor_and_none() {
        let rgba = Bitmap::TrueColor(image::RgbaImage::new(4, 4));
        assert!(matches!(
            validate_mask(1, RoomAreaMaskType::Hotspots, rgba, &palette()),
            Err(RoomError::InvalidMask { .. })
        ));

        let indexed = Bitmap::Indexed(IndexedBitmap::new(4, 4, palette()));
        assert!(matches!(
            validate_mask(1, RoomAreaMaskType::None, indexed, &palette()),
            Err(RoomError::InvalidMaskType)
        ));
    }

    #[test]
    fn test_reset_masks_blanks_at_room_size() {
        let (mut room, mut masks) = room_320x200();
        masks
            .get_mut(RoomAreaMaskType::WalkableAreas)
            .unwrap()
            .image
            .put(3, 3, 2);
        room.width = 640;
        room.height = 400;
        room.mask_resolution = 2;
        reset_masks(&room, &mut masks, &palette());
        for (_, mask) in masks.iter() {
            assert_eq!((mask.image.width(), mask.image.height()), (320, 200));
            assert!(mask.image.pixels().iter().all(|p| *p == 0));
        }
    }

    #[test]
    fn test_resize_masks_with_offset_keeps_content() {
        let (room, mut masks) = room_320x200();
        masks
            .get_mut(RoomAreaMaskType::Regions)
            .unwrap()
            .image
            .put(0, 0, 3);

        resize_masks(&room, &mut masks, false, 400, 300, 10, 20).unwrap();

        let regions = &masks.get(RoomAreaMaskType::Regions).unwrap().image;
        assert_eq!((regions.width(), regions.height()), (400, 300));
        assert_eq!(regions.get(10, 20), Some(3));
        assert_eq!(regions.get(0, 0), Some(0));
    }

    #[test]
    fn test_resize_masks_rejects_empty_size() {
        let (room, mut masks) = room_320x200();
        assert!(resize_masks(&room, &mut masks, true, 0, 100, 0, 0).is_err());
    }
}
