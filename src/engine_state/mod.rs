//! # Engine State Module
//!
//! The core module that owns the terrain pipeline and drives it once per tick.
//!
//! ## Key Components
//!
//! * `TerrainEngine` - Owns the scheduler and the streamer; one `update` per tick
//! * `terrain` - Noise sampling, band classification and the field task
//! * `rendering` - Mesh building, the display contract and previews
//! * `task_management` - The worker pool and its completion queues
//! * `streaming` - Tile records and the per-tick visibility pass
//! * `config` - Serializable parameters for all of the above
//! * `error` - The crate error type
//!
//! ## Architecture
//!
//! Each subsystem handles one stage of the pipeline. The `TerrainEngine` wires them
//! together: the streamer issues requests through a cloned scheduler handle, and the
//! engine drains the scheduler right after the streamer's tick, so every
//! continuation runs on the thread that calls `update`.

use std::sync::Arc;

use cgmath::Point2;
use log::{debug, info, warn};

use config::TerrainConfig;
use error::TerrainError;
use rendering::{
    display::TerrainDisplay, mesh::SurfaceMesh, tasks::mesh_generation_task::MeshGenerationTask,
};
use streaming::{ChunkStreamer, TickSummary};
use task_management::{task::Task, ComputeScheduler};
use terrain::{TerrainMap, MAP_CHUNK_SIZE};

pub mod config;
pub mod error;
pub mod rendering;
pub mod streaming;
pub mod task_management;
pub mod terrain;

/// The main state container for terrain streaming.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cgmath::Point2;
/// use terrain_streamer::engine_state::{
///     config::TerrainConfig, rendering::display::HeadlessDisplay, TerrainEngine,
/// };
///
/// let display = Arc::new(HeadlessDisplay::new());
/// let mut engine = TerrainEngine::new(&TerrainConfig::default(), display.clone()).unwrap();
///
/// // Main loop
/// let summary = engine.update(Point2::new(0.0, 0.0));
/// assert_eq!(summary.considered, 25);
/// ```
pub struct TerrainEngine {
    /// Worker pool shared with the streamer's continuations
    scheduler: ComputeScheduler,
    /// Tile map and visibility state
    streamer: ChunkStreamer,
    /// Number of completed `update` calls
    ticks: u64,
}

impl TerrainEngine {
    /// Starts the worker pool and creates an empty streamer.
    ///
    /// # Arguments
    ///
    /// * `config` - Pipeline parameters; corrected copies are used
    /// * `display` - Owner of the tiles' visual objects
    ///
    /// # Errors
    ///
    /// Fails only if the worker threads cannot be spawned.
    pub fn new(
        config: &TerrainConfig,
        display: Arc<dyn TerrainDisplay>,
    ) -> Result<Self, TerrainError> {
        let scheduler = ComputeScheduler::new(&config.scheduler)?;
        let streamer = ChunkStreamer::new(config, scheduler.clone(), display);

        info!("Terrain engine initialized");
        Ok(Self {
            scheduler,
            streamer,
            ticks: 0,
        })
    }

    /// Runs one tick: the streamer's visibility pass, then every finished result.
    ///
    /// # Arguments
    ///
    /// * `observer` - Ground-plane position; `y` is world `z`
    pub fn update(&mut self, observer: Point2<f32>) -> TickSummary {
        let summary = self.streamer.tick(observer);
        let completed = self.scheduler.drain_completed();
        self.ticks += 1;

        if summary.created > 0 || summary.evicted > 0 || completed > 0 {
            debug!(
                "Tick {}: {} created, {} evicted, {} visible, {} results applied",
                self.ticks, summary.created, summary.evicted, summary.visible, completed
            );
        }
        summary
    }

    /// The tile streamer.
    pub fn streamer(&self) -> &ChunkStreamer {
        &self.streamer
    }

    /// The shared scheduler handle.
    pub fn scheduler(&self) -> &ComputeScheduler {
        &self.scheduler
    }

    /// Number of `update` calls so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Drop for TerrainEngine {
    fn drop(&mut self) {
        self.scheduler.shutdown();
    }
}

/// A single map built synchronously, for previews and tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMap {
    /// Heights and band colors.
    pub map: TerrainMap,
    /// The surface built from the heights.
    pub mesh: SurfaceMesh,
}

/// Builds one chunk-sized map and its mesh on the calling thread.
///
/// Uses the configured noise offset as the map's origin.
pub fn generate_map(config: &TerrainConfig) -> Result<GeneratedMap, TerrainError> {
    let mut config = config.clone();
    for correction in config.sanitize() {
        warn!("{}", correction);
    }

    let map = TerrainMap::generate(MAP_CHUNK_SIZE, &config.noise, &config.regions);
    let mesh = MeshGenerationTask::from_settings(map.heights.clone(), &config.mesh).process()?;
    Ok(GeneratedMap { map, mesh })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendering::display::HeadlessDisplay;
    use std::thread;
    use std::time::{Duration, Instant};
    use streaming::{tile::GenerationState, StreamingSettings};

    #[test]
    fn update_drives_tiles_to_the_display() {
        let config = TerrainConfig {
            streaming: StreamingSettings {
                view_distance: 100.0,
                retention_distance: None,
            },
            ..TerrainConfig::default()
        };
        let display = Arc::new(HeadlessDisplay::new());
        let mut engine = TerrainEngine::new(&config, display.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        while engine.streamer().count_in_state(GenerationState::MeshReady) < 9 {
            assert!(Instant::now() < deadline, "tiles never finished generating");
            engine.update(Point2::new(0.0, 0.0));
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(display.meshed_count(), 9);
        assert!(display.is_visible(
            engine
                .streamer()
                .tile(Point2::new(0, 0))
                .unwrap()
                .lock()
                .display_handle
        ));
        assert!(engine.ticks() > 0);
        assert_eq!(engine.scheduler().queued(), 0);
    }

    #[test]
    fn generate_map_builds_a_full_detail_chunk() {
        let generated = generate_map(&TerrainConfig::default()).unwrap();

        assert_eq!(generated.map.heights.width(), MAP_CHUNK_SIZE);
        assert_eq!(generated.map.colors.height(), MAP_CHUNK_SIZE);
        assert_eq!(generated.mesh.vertex_count(), MAP_CHUNK_SIZE * MAP_CHUNK_SIZE);
        assert_eq!(
            generated.mesh.triangle_count(),
            2 * (MAP_CHUNK_SIZE - 1) * (MAP_CHUNK_SIZE - 1)
        );
    }
}
