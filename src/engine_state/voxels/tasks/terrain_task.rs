//! # Terrain Task
//!
//! This module defines the message protocol of terrain workers and the
//! [`TerrainWorker`] service that answers it. Terrain workers generate chunk
//! grids away from the main thread and keep the chunks they generated so that
//! block updates can be served against them.
//!
//! ## Protocol
//!
//! | Request          | Response          |
//! |------------------|-------------------|
//! | `initialize`     | `initialized`     |
//! | `generateChunk`  | `chunkGenerated`  |
//! | `updateBlock`    | `chunkUpdated`    |
//! | `unloadChunk`    | `chunkUnloaded`   |
//!
//! Any failure is answered with `error`, carrying the chunk and frame of the
//! request when known.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::engine_state::{
    task_management::{
        PoolError, PoolStrategy, RequestContext, ResponseKind, WorkerError, WorkerHandle,
        WorkerService,
    },
    voxels::{
        block::BlockId,
        chunk::{ChunkCoord, GridEntry, WaterBlock},
        terrain::{classify_water, TerrainGenerator, TerrainParams, WorkerChunk},
    },
};

/// Messages sent to a terrain worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TerrainRequest {
    /// Hands the worker the world it generates for.
    Initialize { params: TerrainParams },

    /// Generates the chunk at `(chunk_x, chunk_z)`.
    GenerateChunk {
        chunk_x: i32,
        chunk_z: i32,
        frameno: usize,
    },

    /// Writes one block of a chunk this worker generated.
    UpdateBlock {
        chunk_id: ChunkCoord,
        x: i32,
        y: i32,
        z: i32,
        block_type: BlockId,
        update_water_mesh: bool,
        frameno: usize,
    },

    /// Forgets a chunk.
    UnloadChunk { chunk_id: ChunkCoord },
}

impl TerrainRequest {
    /// A `generateChunk` request. The frame is stamped when it is dispatched.
    pub fn generate(coord: ChunkCoord) -> Self {
        TerrainRequest::GenerateChunk {
            chunk_x: coord.x,
            chunk_z: coord.z,
            frameno: 0,
        }
    }
}

/// Messages sent back by a terrain worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TerrainResponse {
    Initialized,

    ChunkGenerated {
        chunk_id: ChunkCoord,
        chunk_x: i32,
        chunk_z: i32,
        grid: Vec<GridEntry>,
        water_blocks: Vec<WaterBlock>,
        size: i32,
        height: i32,
        frameno: usize,
    },

    ChunkUpdated {
        chunk_id: ChunkCoord,
        grid: Vec<GridEntry>,
        water_blocks: Vec<WaterBlock>,
        frameno: usize,
    },

    ChunkUnloaded { chunk_id: ChunkCoord },

    Error {
        chunk_id: Option<ChunkCoord>,
        error: String,
        frameno: Option<usize>,
    },
}

/// The service run by every terrain worker thread.
///
/// # Fields
/// - `generator`: Set by `initialize`; every other request except unloads needs it
/// - `chunks`: Chunks generated by this worker, kept for `updateBlock`
#[derive(Default)]
pub struct TerrainWorker {
    generator: Option<TerrainGenerator>,
    chunks: HashMap<ChunkCoord, WorkerChunk>,
}

impl TerrainWorker {
    pub fn new() -> Self {
        Self::default()
    }

    fn generator(&self) -> Result<&TerrainGenerator, WorkerError> {
        self.generator.as_ref().ok_or(WorkerError::NotInitialized)
    }

    /// Number of chunks held for block updates.
    pub fn cached_chunks(&self) -> usize {
        self.chunks.len()
    }
}

impl WorkerService for TerrainWorker {
    type Request = TerrainRequest;
    type Response = TerrainResponse;

    fn handle(&mut self, request: TerrainRequest) -> Result<TerrainResponse, WorkerError> {
        match request {
            TerrainRequest::Initialize { params } => {
                self.generator = Some(TerrainGenerator::new(params));
                self.chunks.clear();
                Ok(TerrainResponse::Initialized)
            }
            TerrainRequest::GenerateChunk {
                chunk_x,
                chunk_z,
                frameno,
            } => {
                let coord = ChunkCoord::new(chunk_x, chunk_z);
                let chunk = self.generator()?.generate_chunk(coord);
                let response = TerrainResponse::ChunkGenerated {
                    chunk_id: coord,
                    chunk_x,
                    chunk_z,
                    grid: chunk.grid.to_pairs(),
                    water_blocks: chunk.water_blocks.clone(),
                    size: chunk.grid.size(),
                    height: chunk.grid.height(),
                    frameno,
                };
                self.chunks.insert(coord, chunk);
                Ok(response)
            }
            TerrainRequest::UpdateBlock {
                chunk_id,
                x,
                y,
                z,
                block_type,
                update_water_mesh,
                frameno,
            } => {
                let generator = self.generator.as_ref().ok_or(WorkerError::NotInitialized)?;
                let chunk = self
                    .chunks
                    .get_mut(&chunk_id)
                    .ok_or(WorkerError::UnknownChunk(chunk_id))?;
                if !chunk.set_block(x, y, z, block_type, generator.blocks()) {
                    return Err(WorkerError::InvalidRequest(format!(
                        "block ({x}, {y}, {z}) lies outside chunk {chunk_id}"
                    )));
                }
                if update_water_mesh {
                    chunk.build_lakes(generator);
                } else {
                    chunk.water_blocks = classify_water(&chunk.grid, generator.palette().water);
                }
                Ok(TerrainResponse::ChunkUpdated {
                    chunk_id,
                    grid: chunk.grid.to_pairs(),
                    water_blocks: chunk.water_blocks.clone(),
                    frameno,
                })
            }
            TerrainRequest::UnloadChunk { chunk_id } => {
                self.chunks.remove(&chunk_id);
                Ok(TerrainResponse::ChunkUnloaded { chunk_id })
            }
        }
    }

    fn context(request: &TerrainRequest) -> RequestContext {
        match request {
            TerrainRequest::Initialize { .. } => RequestContext::default(),
            TerrainRequest::GenerateChunk {
                chunk_x,
                chunk_z,
                frameno,
            } => RequestContext {
                chunk_id: Some(ChunkCoord::new(*chunk_x, *chunk_z)),
                frameno: Some(*frameno),
            },
            TerrainRequest::UpdateBlock {
                chunk_id, frameno, ..
            } => RequestContext {
                chunk_id: Some(*chunk_id),
                frameno: Some(*frameno),
            },
            TerrainRequest::UnloadChunk { chunk_id } => RequestContext {
                chunk_id: Some(*chunk_id),
                frameno: None,
            },
        }
    }

    fn error_response(context: RequestContext, error: String) -> TerrainResponse {
        TerrainResponse::Error {
            chunk_id: context.chunk_id,
            error,
            frameno: context.frameno,
        }
    }
}

/// Pool behavior of the terrain stage.
pub struct TerrainStrategy {
    params: TerrainParams,
}

impl TerrainStrategy {
    pub fn new(params: TerrainParams) -> Self {
        TerrainStrategy { params }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }
}

impl PoolStrategy for TerrainStrategy {
    type Request = TerrainRequest;
    type Response = TerrainResponse;

    const NAME: &'static str = "terrain";

    fn spawn(&mut self, frameno: usize) -> Result<WorkerHandle<TerrainRequest, TerrainResponse>, PoolError> {
        WorkerHandle::spawn(Self::NAME, frameno, TerrainWorker::new())
    }

    fn initialize_request(&self) -> TerrainRequest {
        TerrainRequest::Initialize {
            params: self.params.clone(),
        }
    }

    fn assign_frame(request: &mut TerrainRequest, slot: usize) {
        match request {
            TerrainRequest::GenerateChunk { frameno, .. } | TerrainRequest::UpdateBlock { frameno, .. } => {
                *frameno = slot;
            }
            TerrainRequest::Initialize { .. } | TerrainRequest::UnloadChunk { .. } => {}
        }
    }

    fn classify(response: &TerrainResponse) -> ResponseKind {
        match response {
            TerrainResponse::Initialized => ResponseKind::Initialized,
            TerrainResponse::ChunkGenerated { .. } | TerrainResponse::ChunkUpdated { .. } => ResponseKind::Completed,
            TerrainResponse::ChunkUnloaded { .. } => ResponseKind::Notice,
            TerrainResponse::Error { frameno: Some(_), .. } => ResponseKind::Failed,
            TerrainResponse::Error { frameno: None, .. } => ResponseKind::Notice,
        }
    }

    fn failure_response(chunk: ChunkCoord, frameno: usize, error: String) -> TerrainResponse {
        TerrainResponse::Error {
            chunk_id: Some(chunk),
            error,
            frameno: Some(frameno),
        }
    }
}
