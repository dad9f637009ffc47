//! Mesh generation on worker threads.
//!
//! This module contains the messages exchanged with mesh workers and the
//! [`MeshWorker`] service that rebuilds a chunk's grid from its serialized
//! pairs and runs the greedy mesher over it. Keeping this off the main thread
//! keeps the chunk manager responsive while large chunks are meshed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine_state::{
    rendering::meshing::mesh::{build_chunk_geometry, ChunkGeometry, GeometryKey, MeshData},
    task_management::{
        PoolError, PoolStrategy, RequestContext, ResponseKind, WorkerError, WorkerHandle,
        WorkerService,
    },
    voxels::{
        block::BlockTable,
        chunk::{Chunk, ChunkCoord, GridEntry, VoxelGrid, WaterBlock},
    },
};

/// A chunk's grid as it travels to a mesh worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    pub grid: Vec<GridEntry>,
    pub size: i32,
    pub height: i32,
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl ChunkData {
    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.chunk_x, self.chunk_z)
    }
}

/// Messages sent to a mesh worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MeshRequest {
    /// Hands the worker the block table it meshes with.
    Initialize { block_table: Arc<BlockTable> },

    /// Meshes one chunk.
    BuildMesh {
        chunk_data: ChunkData,
        water_blocks: Vec<WaterBlock>,
        frameno: usize,
    },
}

impl MeshRequest {
    /// Snapshots a chunk into a `buildMesh` request. The frame is stamped
    /// when the request is dispatched.
    pub fn build(chunk: &Chunk) -> Self {
        MeshRequest::BuildMesh {
            chunk_data: ChunkData {
                grid: chunk.grid().to_pairs(),
                size: chunk.size(),
                height: chunk.height(),
                chunk_x: chunk.coord.x,
                chunk_z: chunk.coord.z,
            },
            water_blocks: chunk.water_blocks().to_vec(),
            frameno: 0,
        }
    }
}

/// Messages sent back by a mesh worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MeshResponse {
    Initialized,

    MeshCompleted {
        chunk_id: ChunkCoord,
        terrain_mesh_data: BTreeMap<GeometryKey, MeshData>,
        water_mesh_data: Option<MeshData>,
        frameno: usize,
    },

    Error {
        chunk_id: Option<ChunkCoord>,
        error: String,
        frameno: Option<usize>,
    },
}

impl MeshResponse {
    /// The geometry carried by a `meshCompleted` response.
    pub fn into_geometry(self) -> Option<ChunkGeometry> {
        match self {
            MeshResponse::MeshCompleted {
                terrain_mesh_data,
                water_mesh_data,
                ..
            } => Some(ChunkGeometry {
                terrain: terrain_mesh_data,
                water: water_mesh_data,
            }),
            _ => None,
        }
    }
}

/// The service run by every mesh worker thread.
#[derive(Default)]
pub struct MeshWorker {
    block_table: Option<Arc<BlockTable>>,
}

impl MeshWorker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkerService for MeshWorker {
    type Request = MeshRequest;
    type Response = MeshResponse;

    fn handle(&mut self, request: MeshRequest) -> Result<MeshResponse, WorkerError> {
        match request {
            MeshRequest::Initialize { block_table } => {
                self.block_table = Some(block_table);
                Ok(MeshResponse::Initialized)
            }
            MeshRequest::BuildMesh {
                chunk_data,
                water_blocks,
                frameno,
            } => {
                let table = self.block_table.as_ref().ok_or(WorkerError::NotInitialized)?;
                if chunk_data.size <= 0 || chunk_data.height <= 0 {
                    return Err(WorkerError::InvalidRequest(format!(
                        "chunk dimensions {}x{} are empty",
                        chunk_data.size, chunk_data.height
                    )));
                }

                let coord = chunk_data.coord();
                let grid = VoxelGrid::from_pairs(chunk_data.size, chunk_data.height, &chunk_data.grid);
                let geometry = build_chunk_geometry(&grid, &water_blocks, coord, table);

                Ok(MeshResponse::MeshCompleted {
                    chunk_id: coord,
                    terrain_mesh_data: geometry.terrain,
                    water_mesh_data: geometry.water,
                    frameno,
                })
            }
        }
    }

    fn context(request: &MeshRequest) -> RequestContext {
        match request {
            MeshRequest::Initialize { .. } => RequestContext::default(),
            MeshRequest::BuildMesh {
                chunk_data, frameno, ..
            } => RequestContext {
                chunk_id: Some(chunk_data.coord()),
                frameno: Some(*frameno),
            },
        }
    }

    fn error_response(context: RequestContext, error: String) -> MeshResponse {
        MeshResponse::Error {
            chunk_id: context.chunk_id,
            error,
            frameno: context.frameno,
        }
    }
}

/// Pool behavior of the mesh stage.
pub struct MeshStrategy {
    block_table: Arc<BlockTable>,
}

impl MeshStrategy {
    pub fn new(block_table: Arc<BlockTable>) -> Self {
        MeshStrategy { block_table }
    }
}

impl PoolStrategy for MeshStrategy {
    type Request = MeshRequest;
    type Response = MeshResponse;

    const NAME: &'static str = "mesh";

    fn spawn(&mut self, frameno: usize) -> Result<WorkerHandle<MeshRequest, MeshResponse>, PoolError> {
        WorkerHandle::spawn(Self::NAME, frameno, MeshWorker::new())
    }

    fn initialize_request(&self) -> MeshRequest {
        MeshRequest::Initialize {
            block_table: Arc::clone(&self.block_table),
        }
    }

    fn assign_frame(request: &mut MeshRequest, slot: usize) {
        if let MeshRequest::BuildMesh { frameno, .. } = request {
            *frameno = slot;
        }
    }

    fn classify(response: &MeshResponse) -> ResponseKind {
        match response {
            MeshResponse::Initialized => ResponseKind::Initialized,
            MeshResponse::MeshCompleted { .. } => ResponseKind::Completed,
            MeshResponse::Error { frameno: Some(_), .. } => ResponseKind::Failed,
            MeshResponse::Error { frameno: None, .. } => ResponseKind::Notice,
        }
    }

    fn failure_response(chunk: ChunkCoord, frameno: usize, error: String) -> MeshResponse {
        MeshResponse::Error {
            chunk_id: Some(chunk),
            error,
            frameno: Some(frameno),
        }
    }
}
