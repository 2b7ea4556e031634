//! Game palette and the rules for which palette slots a room may own.
//!
//! 8-bit games share one 256 entry palette. Gamewide and locked slots always
//! hold the game's colors; background slots may be redefined by each room's
//! primary background.

use serde::{Deserialize, Serialize};

use super::bitmap::IndexedBitmap;

/// Which owner a palette slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaletteSlot {
    #[default]
    Gamewide,
    Locked,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub color: [u8; 3],
    #[serde(default)]
    pub slot: PaletteSlot,
}

/// Number of leading slots that are gamewide in a new game
const DEFAULT_GAMEWIDE_SLOTS: usize = 42;

/// Standard 16 color set used for the first entries (and for drawing areas)
const BASE_COLORS: [[u8; 3]; 16] = [
    [0, 0, 0],
    [0, 0, 170],
    [0, 170, 0],
    [0, 170, 170],
    [170, 0, 0],
    [170, 0, 170],
    [170, 85, 0],
    [170, 170, 170],
    [85, 85, 85],
    [85, 85, 255],
    [85, 255, 85],
    [85, 255, 255],
    [255, 85, 85],
    [255, 85, 255],
    [255, 255, 85],
    [255, 255, 255],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePalette {
    pub entries: Vec<PaletteEntry>,
}

impl Default for GamePalette {
    fn default() -> Self {
        let entries = (0..256usize)
            .map(|i| {
                let color = match i {
                    0..=15 => BASE_COLORS[i],
                    // Gray ramp for everything past the base colors
                    _ => {
                        let v = i as u8;
                        [v, v, v]
                    }
                };
                let slot = if i < DEFAULT_GAMEWIDE_SLOTS {
                    PaletteSlot::Gamewide
                } else {
                    PaletteSlot::Background
                };
                PaletteEntry { color, slot }
            })
            .collect();
        Self { entries }
    }
}

impl GamePalette {
    /// Palette colors written into every mask PNG, always 256 entries.
    pub fn mask_palette(&self) -> Vec<[u8; 3]> {
        let mut colors: Vec<[u8; 3]> = self.entries.iter().map(|e| e.color).collect();
        colors.resize(256, [0, 0, 0]);
        colors
    }

    /// Number of slots a room background may redefine.
    pub fn background_slot_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.slot == PaletteSlot::Background)
            .count()
    }

    /// Forces every gamewide and locked slot of `palette` to the game color.
    ///
    /// Returns how many entries had to be changed.
    pub fn enforce_locked_entries(&self, palette: &mut Vec<[u8; 3]>) -> usize {
        if palette.len() < self.entries.len() {
            palette.resize(self.entries.len(), [0, 0, 0]);
        }
        let mut changed = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.slot != PaletteSlot::Background && palette[i] != entry.color {
                palette[i] = entry.color;
                changed += 1;
            }
        }
        changed
    }

    /// Prepares an 8-bit background for use with this game palette.
    ///
    /// Gamewide and locked slots are forced to the game colors. With `exact`
    /// set the pixel indices are kept as they are; otherwise pixels that
    /// used a game slot whose color had to change are moved to the closest
    /// background slot color.
    pub fn remap_background(&self, image: &mut IndexedBitmap, exact: bool) -> RemapStats {
        let original: Vec<[u8; 3]> = image.palette().to_vec();
        let mut used = [false; 256];
        for &p in image.pixels() {
            used[p as usize] = true;
        }
        let stats = RemapStats {
            colors_image: used.iter().filter(|u| **u).count(),
            colors_limit: self.background_slot_count(),
        };

        let mut palette = original.clone();
        self.enforce_locked_entries(&mut palette);

        if !exact {
            let mut mapping: Vec<u8> = (0..=255u8).collect();
            for (index, entry) in self.entries.iter().enumerate().take(256) {
                let Some(&source) = original.get(index) else {
                    continue;
                };
                if !used[index] || entry.slot == PaletteSlot::Background || source == entry.color {
                    continue;
                }
                if let Some(target) = self.closest_background_slot(source, &palette) {
                    mapping[index] = target;
                }
            }
            for p in image.pixels_mut() {
                *p = mapping[*p as usize];
            }
        }

        image.set_palette(palette);
        stats
    }

    fn closest_background_slot(&self, color: [u8; 3], palette: &[[u8; 3]]) -> Option<u8> {
        self.entries
            .iter()
            .enumerate()
            .take(256)
            .filter(|(_, e)| e.slot == PaletteSlot::Background)
            .filter_map(|(i, _)| palette.get(i).map(|c| (i, *c)))
            .min_by_key(|(_, c)| {
                c.iter()
                    .zip(color.iter())
                    .map(|(a, b)| (*a as i32 - *b as i32).pow(2))
                    .sum::<i32>()
            })
            .map(|(i, _)| i as u8)
    }
}

/// Color usage of a remapped background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapStats {
    pub colors_image: usize,
    pub colors_limit: usize,
}

impl RemapStats {
    /// Some colors were necessarily lost when remapping
    pub fn exceeds_limit(&self) -> bool {
        self.colors_image > self.colors_limit
    }
}
