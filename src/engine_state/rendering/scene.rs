//! Scene graph attach points.
//!
//! The chunk manager never talks to a GPU. It hands finished geometry to a
//! [`SceneGraph`], which owns whatever materials, buffers and draw calls the
//! host renderer uses.

use std::collections::{HashMap, HashSet};

use crate::engine_state::voxels::chunk::ChunkCoord;

use super::meshing::mesh::ChunkGeometry;

/// The renderer-facing side of chunk streaming.
pub trait SceneGraph {
    /// Shows `geometry` for `chunk`, replacing anything attached before.
    fn attach(&mut self, chunk: ChunkCoord, geometry: &ChunkGeometry);

    /// Removes a chunk's geometry from the scene.
    fn detach(&mut self, chunk: ChunkCoord);

    /// Toggles whether a chunk's geometry is drawn.
    fn set_visible(&mut self, chunk: ChunkCoord, visible: bool);
}

/// A scene graph without a renderer, recording what would be drawn.
///
/// Used by the headless driver and the tests.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    attached: HashMap<ChunkCoord, usize>,
    hidden: HashSet<ChunkCoord>,
    attach_count: usize,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, chunk: ChunkCoord) -> bool {
        self.attached.contains_key(&chunk)
    }

    /// Attached and not hidden.
    pub fn is_visible(&self, chunk: ChunkCoord) -> bool {
        self.is_attached(chunk) && !self.hidden.contains(&chunk)
    }

    pub fn attached_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.attached.keys().copied()
    }

    pub fn attached_len(&self) -> usize {
        self.attached.len()
    }

    /// Triangles currently attached, hidden chunks included.
    pub fn triangle_count(&self) -> usize {
        self.attached.values().sum()
    }

    /// Number of `attach` calls so far, remeshes included.
    pub fn attach_count(&self) -> usize {
        self.attach_count
    }
}

impl SceneGraph for HeadlessScene {
    fn attach(&mut self, chunk: ChunkCoord, geometry: &ChunkGeometry) {
        self.attached.insert(chunk, geometry.triangle_count());
        self.attach_count += 1;
    }

    fn detach(&mut self, chunk: ChunkCoord) {
        self.attached.remove(&chunk);
        self.hidden.remove(&chunk);
    }

    fn set_visible(&mut self, chunk: ChunkCoord, visible: bool) {
        if visible {
            self.hidden.remove(&chunk);
        } else {
            self.hidden.insert(chunk);
        }
    }
}
