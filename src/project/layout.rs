//! Deterministic file names of everything belonging to a room.
//!
//! Open-format rooms live in `room<N>/` below the project root. The compiled
//! `room<N>.crm` and, before conversion, the legacy script and user files sit
//! directly in the project root.

use std::path::{Path, PathBuf};

use crate::constants::{PROJECT_FILE_NAME, ROOM_DATA_FILE_NAME};
use crate::room::RoomAreaMaskType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_file(&self) -> PathBuf {
        self.root.join(PROJECT_FILE_NAME)
    }

    pub fn room_dir(&self, number: u32) -> PathBuf {
        self.root.join(format!("room{number}"))
    }

    pub fn room_data_file(&self, number: u32) -> PathBuf {
        self.room_dir(number).join(ROOM_DATA_FILE_NAME)
    }

    pub fn background_file(&self, number: u32, index: usize) -> PathBuf {
        self.room_dir(number).join(background_file_name(index))
    }

    /// `None` for [`RoomAreaMaskType::None`].
    pub fn mask_file(&self, number: u32, kind: RoomAreaMaskType) -> Option<PathBuf> {
        mask_file_name(kind).map(|name| self.room_dir(number).join(name))
    }

    pub fn script_file(&self, number: u32) -> PathBuf {
        self.room_dir(number).join(script_file_name(number))
    }

    pub fn user_file(&self, number: u32) -> PathBuf {
        self.room_dir(number).join(user_file_name(number))
    }

    /// Compiled room, also the legacy single-file source before conversion.
    pub fn crm_file(&self, number: u32) -> PathBuf {
        self.root.join(format!("room{number}.crm"))
    }

    pub fn legacy_script_file(&self, number: u32) -> PathBuf {
        self.root.join(script_file_name(number))
    }

    pub fn legacy_user_file(&self, number: u32) -> PathBuf {
        self.root.join(user_file_name(number))
    }

    /// Every source file a room can have inside its directory.
    pub fn room_source_files(&self, number: u32) -> Vec<PathBuf> {
        let mut files = vec![
            self.room_data_file(number),
            self.script_file(number),
            self.user_file(number),
        ];
        files.extend(
            (0..crate::constants::MAX_BACKGROUNDS).map(|i| self.background_file(number, i)),
        );
        files.extend(
            RoomAreaMaskType::all()
                .iter()
                .filter_map(|kind| self.mask_file(number, *kind)),
        );
        files
    }

    /// Whether anything named after room `number` already exists.
    pub fn room_files_exist(&self, number: u32) -> bool {
        self.room_dir(number).exists()
            || self.crm_file(number).exists()
            || self.legacy_script_file(number).exists()
    }
}

pub fn background_file_name(index: usize) -> String {
    format!("background{index}.png")
}

pub fn mask_file_name(kind: RoomAreaMaskType) -> Option<String> {
    kind.slot()?;
    Some(format!("mask_{}.png", kind.file_stem()))
}

pub fn script_file_name(number: u32) -> String {
    format!("room{number}.asc")
}

pub fn user_file_name(number: u32) -> String {
    format!("room{number}.crm.user")
}

/// Returns `parent/<name><separator><k>` for the first `k` that does not exist.
pub fn make_unique_directory(parent: &Path, name: &str, separator: &str) -> PathBuf {
    let mut k = 0usize;
    loop {
        let candidate = parent.join(format!("{name}{separator}{k}"));
        if !candidate.exists() {
            return candidate;
        }
        k += 1;
    }
}
