//! In-memory room images and their PNG encoding.
//!
//! Masks and 8-bit backgrounds are palettized: each pixel is an index into a
//! palette, and for masks the index *is* the area number. The `image` crate
//! expands palettes on decode, so indexed PNGs go through `png` directly and
//! everything else through `image`.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::{ImageFormat, RgbaImage};

use super::error::{RoomError, RoomResult};

/// Color depth of a room, in bits per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorDepth {
    Palette8,
    HiColor16,
    #[default]
    TrueColor32,
}

impl ColorDepth {
    pub fn bits(self) -> u32 {
        match self {
            ColorDepth::Palette8 => 8,
            ColorDepth::HiColor16 => 16,
            ColorDepth::TrueColor32 => 32,
        }
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(ColorDepth::Palette8),
            16 => Some(ColorDepth::HiColor16),
            32 => Some(ColorDepth::TrueColor32),
            _ => None,
        }
    }

    pub fn is_palettized(self) -> bool {
        self == ColorDepth::Palette8
    }
}

/// An 8-bit palettized image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedBitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    palette: Vec<[u8; 3]>,
}

impl IndexedBitmap {
    /// Creates an image filled with index 0.
    pub fn new(width: u32, height: u32, palette: Vec<[u8; 3]>) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
            palette,
        }
    }

    /// Wraps raw pixel indices; `None` if the buffer does not match the size.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>, palette: Vec<[u8; 3]>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
            palette,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Vec<[u8; 3]>) {
        self.palette = palette;
    }

    pub(crate) fn palette_mut(&mut self) -> &mut Vec<[u8; 3]> {
        &mut self.palette
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    pub fn put(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            self.pixels[y as usize * self.width as usize + x as usize] = value;
        }
    }

    /// Nearest-neighbour resize that never invents new indices.
    pub fn scale_indexed(&self, new_width: u32, new_height: u32) -> Self {
        let mut scaled = Self::new(new_width, new_height, self.palette.clone());
        if self.is_empty() {
            return scaled;
        }
        for y in 0..new_height {
            let sy = (y as u64 * self.height as u64 / new_height as u64) as u32;
            for x in 0..new_width {
                let sx = (x as u64 * self.width as u64 / new_width as u64) as u32;
                scaled.pixels[y as usize * new_width as usize + x as usize] =
                    self.pixels[sy as usize * self.width as usize + sx as usize];
            }
        }
        scaled
    }

    /// Places this image, stretched to `draw_width x draw_height`, at
    /// (`x_offset`, `y_offset`) on a new blank canvas of the given size.
    pub fn resize_scale_and_offset(
        &self,
        draw_width: u32,
        draw_height: u32,
        canvas_width: u32,
        canvas_height: u32,
        x_offset: i64,
        y_offset: i64,
    ) -> Self {
        let mut canvas = Self::new(canvas_width, canvas_height, self.palette.clone());
        if self.is_empty() || draw_width == 0 || draw_height == 0 {
            return canvas;
        }
        for y in 0..canvas_height {
            let dy = y as i64 - y_offset;
            if dy < 0 || dy >= draw_height as i64 {
                continue;
            }
            let sy = (dy as u64 * self.height as u64 / draw_height as u64) as usize;
            for x in 0..canvas_width {
                let dx = x as i64 - x_offset;
                if dx < 0 || dx >= draw_width as i64 {
                    continue;
                }
                let sx = (dx as u64 * self.width as u64 / draw_width as u64) as usize;
                canvas.pixels[y as usize * canvas_width as usize + x as usize] =
                    self.pixels[sy * self.width as usize + sx];
            }
        }
        canvas
    }

    pub fn save_png(&self, path: &Path) -> RoomResult<()> {
        let file = File::create(path).map_err(RoomError::io(path))?;
        let mut encoder = png::Encoder::new(BufWriter::new(file), self.width, self.height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);

        let mut palette = self.palette.clone();
        palette.resize(256, [0, 0, 0]);
        let flat: Vec<u8> = palette.iter().take(256).flatten().copied().collect();
        encoder.set_palette(flat);

        let encode_err = |source: png::EncodingError| RoomError::PngEncode {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(&self.pixels).map_err(encode_err)?;
        writer.finish().map_err(encode_err)
    }
}

/// A background or mask image as stored in the room caches.
#[derive(Debug, Clone, PartialEq)]
pub enum Bitmap {
    Indexed(IndexedBitmap),
    TrueColor(RgbaImage),
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        match self {
            Bitmap::Indexed(b) => b.width(),
            Bitmap::TrueColor(b) => b.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Bitmap::Indexed(b) => b.height(),
            Bitmap::TrueColor(b) => b.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Depth this image would give a room if used as its main background
    pub fn color_depth(&self) -> ColorDepth {
        match self {
            Bitmap::Indexed(_) => ColorDepth::Palette8,
            Bitmap::TrueColor(_) => ColorDepth::TrueColor32,
        }
    }

    /// Depth of a room using this image when it currently records `recorded`.
    ///
    /// Truecolor images back both 16 and 32-bit rooms, so the recorded depth
    /// is kept unless it is of the other class.
    pub fn depth_for_room(&self, recorded: ColorDepth) -> ColorDepth {
        let depth = self.color_depth();
        if depth.is_palettized() == recorded.is_palettized() {
            recorded
        } else {
            depth
        }
    }

    pub fn as_indexed(&self) -> Option<&IndexedBitmap> {
        match self {
            Bitmap::Indexed(b) => Some(b),
            Bitmap::TrueColor(_) => None,
        }
    }

    /// Decodes a PNG file, keeping palette indices when the file is palettized.
    pub fn load_png(path: &Path) -> RoomResult<Self> {
        let bytes = std::fs::read(path).map_err(RoomError::io(path))?;
        Self::decode_png(&bytes, path)
    }

    pub fn decode_png(bytes: &[u8], path: &Path) -> RoomResult<Self> {
        let decode_err = |source: png::DecodingError| RoomError::PngDecode {
            path: path.to_path_buf(),
            source,
        };

        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().map_err(decode_err)?;

        let (color_type, bit_depth, palette) = {
            let info = reader.info();
            let palette: Option<Vec<[u8; 3]>> = info.palette.as_ref().map(|p| {
                p.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
            });
            (info.color_type, info.bit_depth, palette)
        };

        let indexed = color_type == png::ColorType::Indexed
            || (color_type == png::ColorType::Grayscale && bit_depth == png::BitDepth::Eight);

        if !indexed {
            let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(
                |source| RoomError::Image {
                    path: path.to_path_buf(),
                    source,
                },
            )?;
            return Ok(Bitmap::TrueColor(image.to_rgba8()));
        }

        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader.next_frame(&mut buf).map_err(decode_err)?;
        let bits = match frame.bit_depth {
            png::BitDepth::One => 1,
            png::BitDepth::Two => 2,
            png::BitDepth::Four => 4,
            _ => 8,
        };
        let pixels = unpack_rows(&buf, frame.width, frame.height, frame.line_size, bits);

        let palette = palette.unwrap_or_else(|| (0..=255u8).map(|v| [v, v, v]).collect());
        IndexedBitmap::from_raw(frame.width, frame.height, pixels, palette)
            .map(Bitmap::Indexed)
            .ok_or_else(|| RoomError::InvalidData {
                path: path.to_path_buf(),
                message: "PNG frame size does not match its header".to_string(),
            })
    }

    pub fn save_png(&self, path: &Path) -> RoomResult<()> {
        match self {
            Bitmap::Indexed(b) => b.save_png(path),
            Bitmap::TrueColor(b) => {
                b.save_with_format(path, ImageFormat::Png)
                    .map_err(|source| RoomError::Image {
                        path: path.to_path_buf(),
                        source,
                    })
            }
        }
    }
}

/// Expands packed 1/2/4-bit rows into one byte per pixel.
fn unpack_rows(buf: &[u8], width: u32, height: u32, line_size: usize, bits: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    let per_byte = (8 / bits) as usize;
    let mask = ((1u16 << bits) - 1) as u8;
    for y in 0..height as usize {
        let row = &buf[y * line_size..(y + 1) * line_size];
        for x in 0..width as usize {
            if bits == 8 {
                pixels.push(row[x]);
            } else {
                let byte = row[x / per_byte];
                let shift = 8 - bits as usize * (x % per_byte + 1);
                pixels.push((byte >> shift) & mask);
            }
        }
    }
    pixels
}
