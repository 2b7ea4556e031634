//! Access to the legacy compiled room format.
//!
//! Decoding and encoding `.crm` files is done by an external room tool. The
//! rest of the pipeline only sees the [`LegacyRoomCodec`] trait.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::AtomicUsize;

use bevy::log::{debug, info};

use super::error::{RoomError, RoomResult};
use super::images::RoomImages;
use super::model::Room;
use super::palette::GamePalette;
use super::persistence::{read_room_dir, LoadedRoomFiles};

pub trait LegacyRoomCodec: Send + Sync {
    /// Decodes a legacy `.crm` into a room model and its images.
    fn decode_legacy_crm(
        &self,
        crm: &Path,
        number: u32,
        palette: &GamePalette,
    ) -> RoomResult<LoadedRoomFiles>;

    /// Rebuilds the compiled room from the open-format files in `room_dir`.
    fn regenerate_legacy_crm(
        &self,
        crm: &Path,
        room_dir: &Path,
        room: &Room,
        images: &RoomImages,
    ) -> RoomResult<()>;

    /// Writes a compiled blank room.
    fn save_default_room(&self, crm: &Path) -> RoomResult<()>;

    /// Unpacks a room template into `dest_dir`, returning the created files.
    fn extract_room_template_files(
        &self,
        template: &Path,
        number: u32,
        dest_dir: &Path,
    ) -> RoomResult<Vec<PathBuf>>;
}

/// Codec backed by a command-line room tool.
///
/// The tool is invoked as:
/// - `decode <crm> <out_dir>`: writes an open-format room into `out_dir`
/// - `encode <room_dir> <crm>`
/// - `new-room <crm>`
/// - `extract-template <template> <number> <dest_dir>`: prints created files, one per line
#[derive(Debug, Clone)]
pub struct ExternalRoomTool {
    program: PathBuf,
}

impl ExternalRoomTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, subject: &Path, args: &[&OsStr]) -> RoomResult<String> {
        debug!("Running {:?} {:?}", self.program, args);
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| RoomError::LegacyTool {
                path: subject.to_path_buf(),
                message: format!("could not start {:?}: {}", self.program, e),
            })?;
        if !output.status.success() {
            return Err(RoomError::LegacyTool {
                path: subject.to_path_buf(),
                message: format!(
                    "{} ({})",
                    String::from_utf8_lossy(&output.stderr).trim(),
                    output.status
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LegacyRoomCodec for ExternalRoomTool {
    fn decode_legacy_crm(
        &self,
        crm: &Path,
        number: u32,
        palette: &GamePalette,
    ) -> RoomResult<LoadedRoomFiles> {
        let scratch = tempfile::Builder::new()
            .prefix("roomforge-decode-")
            .tempdir()
            .map_err(RoomError::io(crm))?;
        let out_dir = scratch.path();

        let result = self
            .run(crm, &[OsStr::new("decode"), crm.as_os_str(), out_dir.as_os_str()])
            .and_then(|_| read_room_dir(out_dir, number, palette, &AtomicUsize::new(0)));

        if let Err(e) = scratch.close() {
            debug!("Could not remove decode directory: {}", e);
        }
        result
    }

    fn regenerate_legacy_crm(
        &self,
        crm: &Path,
        room_dir: &Path,
        _room: &Room,
        _images: &RoomImages,
    ) -> RoomResult<()> {
        self.run(crm, &[OsStr::new("encode"), room_dir.as_os_str(), crm.as_os_str()])?;
        info!("Regenerated {:?}", crm);
        Ok(())
    }

    fn save_default_room(&self, crm: &Path) -> RoomResult<()> {
        self.run(crm, &[OsStr::new("new-room"), crm.as_os_str()])
            .map(|_| ())
    }

    fn extract_room_template_files(
        &self,
        template: &Path,
        number: u32,
        dest_dir: &Path,
    ) -> RoomResult<Vec<PathBuf>> {
        let number = number.to_string();
        let stdout = self.run(
            template,
            &[
                OsStr::new("extract-template"),
                template.as_os_str(),
                OsStr::new(&number),
                dest_dir.as_os_str(),
            ],
        )?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}

/// Used when no room tool is configured.
///
/// Conversions fail with a hint to configure the tool; compiled rooms are
/// simply not regenerated.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRoomCodec;

impl LegacyRoomCodec for UnavailableRoomCodec {
    fn decode_legacy_crm(
        &self,
        crm: &Path,
        _number: u32,
        _palette: &GamePalette,
    ) -> RoomResult<LoadedRoomFiles> {
        Err(RoomError::LegacyToolUnavailable {
            path: crm.to_path_buf(),
        })
    }

    fn regenerate_legacy_crm(
        &self,
        crm: &Path,
        _room_dir: &Path,
        _room: &Room,
        _images: &RoomImages,
    ) -> RoomResult<()> {
        debug!("No room tool configured, {:?} not regenerated", crm);
        Ok(())
    }

    fn save_default_room(&self, crm: &Path) -> RoomResult<()> {
        Err(RoomError::LegacyToolUnavailable {
            path: crm.to_path_buf(),
        })
    }

    fn extract_room_template_files(
        &self,
        template: &Path,
        _number: u32,
        _dest_dir: &Path,
    ) -> RoomResult<Vec<PathBuf>> {
        Err(RoomError::LegacyToolUnavailable {
            path: template.to_path_buf(),
        })
    }
}
