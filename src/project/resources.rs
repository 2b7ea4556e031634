//! Resource types for the open project.

use bevy::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::room::{
    ExternalRoomTool, LegacyRoomCodec, RoomAssetStore, RoomPersistence, RoomResult,
    UnavailableRoomCodec,
};

use super::file::ProjectFile;
use super::layout::ProjectLayout;
use super::source_control::{NoSourceControl, SourceControlProvider};

/// The open project.
#[derive(Resource)]
pub struct GameProject {
    pub file: ProjectFile,
    pub(crate) persistence: RoomPersistence,
    pub(crate) source_control: Arc<dyn SourceControlProvider>,
    /// Project file needs saving
    pub dirty: bool,
}

impl GameProject {
    /// Reads `<root>/project.json`. Room files are accessed through `codec`
    /// when they still need the compiled format.
    pub fn open(root: impl Into<PathBuf>, codec: Arc<dyn LegacyRoomCodec>) -> RoomResult<Self> {
        let layout = ProjectLayout::new(root);
        let file = ProjectFile::load(&layout.project_file())?;
        let persistence = RoomPersistence::new(layout, codec, file.settings.palette.clone());
        Ok(Self {
            file,
            persistence,
            source_control: Arc::new(NoSourceControl),
            dirty: false,
        })
    }

    pub fn with_source_control(mut self, provider: Arc<dyn SourceControlProvider>) -> Self {
        self.source_control = provider;
        self
    }

    pub fn layout(&self) -> &ProjectLayout {
        self.persistence.layout()
    }

    pub fn persistence(&self) -> &RoomPersistence {
        &self.persistence
    }

    pub fn source_control(&self) -> &dyn SourceControlProvider {
        self.source_control.as_ref()
    }

    /// A room store sharing this project's I/O lock.
    pub fn room_store(&self, remap_palettized_backgrounds: bool) -> RoomAssetStore {
        RoomAssetStore::new(self.persistence.clone()).with_palette_remap(remap_palettized_backgrounds)
    }

    pub fn save(&mut self) -> RoomResult<()> {
        self.file.save(&self.layout().project_file())?;
        self.dirty = false;
        Ok(())
    }
}

/// Picks the codec for compiled rooms from the configured tool path.
pub fn legacy_codec(tool: Option<&PathBuf>) -> Arc<dyn LegacyRoomCodec> {
    match tool {
        Some(program) => Arc::new(ExternalRoomTool::new(program.clone())),
        None => Arc::new(UnavailableRoomCodec),
    }
}

/// Last failed project or room file operation, for display to the user.
#[derive(Resource, Default)]
pub struct ProjectError {
    pub message: Option<String>,
}
