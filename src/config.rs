//! # World Configuration
//!
//! Static parameters shared by the chunk manager, the terrain workers and the
//! mesh workers. A `WorldConfig` is built once at startup (usually from JSON)
//! and then handed around as an `Arc<WorldConfig>`; nothing mutates it afterwards.
//!
//! Every field has a default, so a partial document such as `{"seed": 42}` is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating a [`WorldConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document was not valid JSON or had fields of the wrong type.
    #[error("failed to parse world configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read world configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A field was outside the range the engine supports.
    #[error("invalid world configuration: {field} = {value} ({reason})")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value, formatted.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Parameters of a generated world.
///
/// # Fields
/// - `seed`: World seed feeding every noise permutation table
/// - `chunk_size`: Width and depth of a chunk in blocks
/// - `chunk_height`: Height of a chunk in blocks
/// - `render_distance`: Radius (in chunks) of the active set around the player
/// - `amplitude`: Global vertical scale of the height field
/// - `water_level`: Highest y filled by lakes
/// - `max_loaded_chunks`: Ceiling on resident chunks before LRU eviction kicks in
/// - `terrain_workers` / `mesh_workers`: Slot count of each buffer pool
/// - `max_generations_in_flight`: Cap on queued + running terrain requests
/// - `tree_chance`: Probability that an eligible grass column grows a tree
/// - `spawn_clearance`: Air cells required above a spawn column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorldConfig {
    pub seed: u32,
    pub chunk_size: i32,
    pub chunk_height: i32,
    pub render_distance: i32,
    pub amplitude: f64,
    pub water_level: i32,
    pub max_loaded_chunks: Option<usize>,
    pub terrain_workers: usize,
    pub mesh_workers: usize,
    pub max_generations_in_flight: usize,
    pub tree_chance: f64,
    pub spawn_clearance: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            seed: 69420,
            chunk_size: 16,
            chunk_height: 128,
            render_distance: 4,
            amplitude: 48.0,
            water_level: 6,
            max_loaded_chunks: None,
            terrain_workers: 2,
            mesh_workers: 2,
            max_generations_in_flight: 8,
            tree_chance: 0.01,
            spawn_clearance: 2,
        }
    }
}

impl WorldConfig {
    /// Parses and validates a configuration from a JSON document.
    ///
    /// # Arguments
    /// * `json` - The JSON text; missing fields take their defaults
    ///
    /// # Returns
    /// The validated configuration, or the first parse/validation error.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Checks every field against the ranges the pipeline supports.
    ///
    /// Chunk width is limited to 256 because local coordinates are packed into
    /// 8 bits per horizontal axis.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=256).contains(&self.chunk_size) {
            return Err(invalid("chunkSize", self.chunk_size, "must be within 1..=256"));
        }
        if !(8..=4096).contains(&self.chunk_height) {
            return Err(invalid("chunkHeight", self.chunk_height, "must be within 8..=4096"));
        }
        if self.render_distance < 0 {
            return Err(invalid("renderDistance", self.render_distance, "must not be negative"));
        }
        if !(self.amplitude.is_finite() && self.amplitude >= 0.0) {
            return Err(invalid("amplitude", self.amplitude, "must be a finite, non-negative number"));
        }
        if self.water_level < 0 || self.water_level >= self.chunk_height {
            return Err(invalid("waterLevel", self.water_level, "must lie inside the chunk height"));
        }
        if self.terrain_workers == 0 {
            return Err(invalid("terrainWorkers", self.terrain_workers, "at least one worker is required"));
        }
        if self.mesh_workers == 0 {
            return Err(invalid("meshWorkers", self.mesh_workers, "at least one worker is required"));
        }
        if self.max_generations_in_flight == 0 {
            return Err(invalid(
                "maxGenerationsInFlight",
                self.max_generations_in_flight,
                "must allow at least one request",
            ));
        }
        if !(0.0..=1.0).contains(&self.tree_chance) {
            return Err(invalid("treeChance", self.tree_chance, "must be a probability"));
        }
        if self.max_loaded_chunks == Some(0) {
            return Err(invalid("maxLoadedChunks", 0, "must be positive"));
        }
        Ok(())
    }

    /// The loaded-chunk ceiling, falling back to `max(1024, render_distance² * 4)`.
    pub fn loaded_chunk_limit(&self) -> usize {
        self.max_loaded_chunks.unwrap_or_else(|| {
            let rd = self.render_distance.max(0) as usize;
            (rd * rd * 4).max(1024)
        })
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
        reason,
    }
}
