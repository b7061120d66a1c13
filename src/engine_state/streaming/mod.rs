//! # Chunk Streaming
//!
//! The `ChunkStreamer` keeps the tiles around an observer generated and decides
//! which of them are shown.
//!
//! ## Tick
//!
//! Each call to [`ChunkStreamer::tick`]:
//! 1. Hides every tile shown by the previous tick
//! 2. Rounds the observer position to a tile coordinate
//! 3. Walks the square neighborhood of radius `ceil(view_distance / tile edge)`:
//!    known tiles are shown when their bounds are closer than `view_distance`,
//!    unknown coordinates get a new tile and a field request
//! 4. Evicts tiles beyond `retention_distance`, when one is configured
//!
//! ## Generation Chain
//!
//! A field result stores the tile's colors and requests its mesh. A mesh result
//! hands the geometry to the display. Both continuations run on the thread that
//! drains the scheduler, and a mesh is never requested before the tile's field
//! has arrived.

pub mod tile;

use std::collections::HashMap;
use std::sync::Arc;

use cgmath::{Point2, Point3};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use tile::{GenerationState, TerrainTile};

use crate::core::MtResource;
use crate::engine_state::{
    config::TerrainConfig,
    error::TerrainError,
    rendering::{
        display::TerrainDisplay, mesh::SurfaceMesh,
        tasks::mesh_generation_task::MeshGenerationTask, MeshSettings,
    },
    task_management::ComputeScheduler,
    terrain::{
        noise_field::NoiseSettings, regions::TerrainBand,
        tasks::field_generation_task::FieldGenerationTask, TerrainMap, MAP_CHUNK_SIZE,
        TILE_EDGE_LENGTH,
    },
};

/// Largest neighborhood half-width scanned per tick, in tiles.
pub const MAX_VIEW_RADIUS_TILES: i32 = 64;

/// Largest accepted view distance.
pub const MAX_VIEW_DISTANCE: f32 = MAX_VIEW_RADIUS_TILES as f32 * TILE_EDGE_LENGTH;

/// How far around the observer tiles are shown and kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingSettings {
    /// Tiles whose bounds are closer than this are shown.
    pub view_distance: f32,
    /// Tiles whose bounds are farther than this are evicted; `None` keeps every tile.
    pub retention_distance: Option<f32>,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        StreamingSettings {
            view_distance: 450.0,
            retention_distance: None,
        }
    }
}

impl StreamingSettings {
    /// Corrects out-of-range values in place.
    pub fn sanitize(&mut self) -> Vec<TerrainError> {
        let mut corrections = Vec::new();

        if !(self.view_distance > 0.0) || !self.view_distance.is_finite() {
            corrections.push(TerrainError::InvalidParameter {
                name: "view_distance",
                value: self.view_distance as f64,
                corrected: TILE_EDGE_LENGTH as f64,
            });
            self.view_distance = TILE_EDGE_LENGTH;
        } else if self.view_distance > MAX_VIEW_DISTANCE {
            corrections.push(TerrainError::InvalidParameter {
                name: "view_distance",
                value: self.view_distance as f64,
                corrected: MAX_VIEW_DISTANCE as f64,
            });
            self.view_distance = MAX_VIEW_DISTANCE;
        }

        if let Some(retention) = self.retention_distance {
            if !(retention >= self.view_distance) {
                corrections.push(TerrainError::InvalidParameter {
                    name: "retention_distance",
                    value: retention as f64,
                    corrected: self.view_distance as f64,
                });
                self.retention_distance = Some(self.view_distance);
            }
        }

        corrections
    }

    /// Half-width of the scanned neighborhood, in tiles, at most `MAX_VIEW_RADIUS_TILES`.
    pub fn view_radius_in_tiles(&self) -> i32 {
        ((self.view_distance / TILE_EDGE_LENGTH).ceil() as i32).clamp(0, MAX_VIEW_RADIUS_TILES)
    }
}

/// The tile coordinate containing a ground-plane position.
pub fn tile_coord(position: Point2<f32>) -> Point2<i32> {
    Point2::new(
        (position.x / TILE_EDGE_LENGTH).round() as i32,
        (position.y / TILE_EDGE_LENGTH).round() as i32,
    )
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    /// The observer's tile coordinate.
    pub observer_coord: Point2<i32>,
    /// Coordinates in the scanned neighborhood.
    pub considered: usize,
    /// Tiles created this tick.
    pub created: usize,
    /// Tiles shown this tick.
    pub visible: usize,
    /// Tiles evicted this tick.
    pub evicted: usize,
}

/// Parameters shared by every tile's generation requests.
struct GenerationContext {
    noise: NoiseSettings,
    bands: Arc<[TerrainBand]>,
    mesh: MeshSettings,
}

/// Everything a tile's continuations need to carry the chain forward.
#[derive(Clone)]
struct TilePipeline {
    context: Arc<GenerationContext>,
    scheduler: ComputeScheduler,
    display: Arc<dyn TerrainDisplay>,
}

impl TilePipeline {
    fn request_field(&self, tile: MtResource<TerrainTile>) {
        let task = {
            let mut guard = tile.lock();
            let [base_x, base_y] = self.context.noise.offset;
            let [tile_x, tile_y] = guard.noise_offset();
            let settings = self
                .context
                .noise
                .with_offset([base_x + tile_x, base_y + tile_y]);
            guard.advance(GenerationState::FieldRequested);
            FieldGenerationTask::new(MAP_CHUNK_SIZE, settings, self.context.bands.clone())
        };

        let pipeline = self.clone();
        self.scheduler
            .request_field(task, move |result| pipeline.on_field_ready(&tile, result));
    }

    fn on_field_ready(
        &self,
        tile: &MtResource<TerrainTile>,
        result: Result<TerrainMap, TerrainError>,
    ) {
        let task = {
            let mut guard = tile.lock();
            if guard.evicted {
                debug!("Dropping field for evicted tile {:?}", guard.coord);
                return;
            }

            let map = match result {
                Ok(map) => map,
                Err(err) => {
                    guard.fail(&err);
                    return;
                }
            };

            guard.colors = Some(map.colors);
            guard.advance(GenerationState::FieldReady);
            guard.advance(GenerationState::MeshRequested);
            MeshGenerationTask::from_settings(map.heights, &self.context.mesh)
        };

        let pipeline = self.clone();
        let tile = tile.clone();
        self.scheduler
            .request_mesh(task, move |result| pipeline.on_mesh_ready(&tile, result));
    }

    fn on_mesh_ready(
        &self,
        tile: &MtResource<TerrainTile>,
        result: Result<SurfaceMesh, TerrainError>,
    ) {
        let mut guard = tile.lock();
        if guard.evicted {
            debug!("Dropping mesh for evicted tile {:?}", guard.coord);
            return;
        }

        let mesh = match result {
            Ok(mesh) => mesh,
            Err(err) => {
                guard.fail(&err);
                return;
            }
        };

        match &guard.colors {
            Some(colors) => self.display.set_geometry(guard.display_handle, &mesh, colors),
            None => warn!("Tile {:?} meshed without colors", guard.coord),
        }
        guard.mesh = Some(mesh);
        guard.advance(GenerationState::MeshReady);
    }
}

/// Streams terrain tiles around a moving observer.
///
/// The tile map is keyed by coordinate, so each coordinate has at most one tile.
/// Tiles are shared with their in-flight continuations through `MtResource`.
pub struct ChunkStreamer {
    settings: StreamingSettings,
    pipeline: TilePipeline,
    tiles: HashMap<Point2<i32>, MtResource<TerrainTile>>,
    visible_last_tick: Vec<Point2<i32>>,
}

impl ChunkStreamer {
    /// Creates a streamer with no tiles.
    ///
    /// # Arguments
    /// * `config` - Generation and streaming parameters; sanitized copies are kept
    /// * `scheduler` - Handle used for every field and mesh request
    /// * `display` - Owner of the visual objects
    pub fn new(
        config: &TerrainConfig,
        scheduler: ComputeScheduler,
        display: Arc<dyn TerrainDisplay>,
    ) -> Self {
        let mut config = config.clone();
        for correction in config.sanitize() {
            warn!("{}", correction);
        }

        info!(
            "Streaming tiles within {} units (radius {} tiles)",
            config.streaming.view_distance,
            config.streaming.view_radius_in_tiles()
        );

        ChunkStreamer {
            pipeline: TilePipeline {
                context: Arc::new(GenerationContext {
                    noise: config.noise,
                    bands: config.regions.into(),
                    mesh: config.mesh,
                }),
                scheduler,
                display,
            },
            settings: config.streaming,
            tiles: HashMap::new(),
            visible_last_tick: Vec::new(),
        }
    }

    /// Updates visibility and starts generation around `observer`.
    ///
    /// `observer` is a ground-plane position: `x` is world `x`, `y` is world `z`.
    pub fn tick(&mut self, observer: Point2<f32>) -> TickSummary {
        for coord in self.visible_last_tick.drain(..) {
            if let Some(tile) = self.tiles.get(&coord) {
                let handle = tile.lock().display_handle;
                self.pipeline.display.set_visible(handle, false);
            }
        }

        let observer_coord = tile_coord(observer);
        let radius = self.settings.view_radius_in_tiles();
        let max_sqr_distance = self.settings.view_distance * self.settings.view_distance;

        let mut summary = TickSummary {
            observer_coord,
            considered: 0,
            created: 0,
            visible: 0,
            evicted: 0,
        };

        for y_offset in -radius..=radius {
            for x_offset in -radius..=radius {
                let coord = Point2::new(
                    observer_coord.x.saturating_add(x_offset),
                    observer_coord.y.saturating_add(y_offset),
                );
                summary.considered += 1;

                match self.tiles.get(&coord) {
                    Some(tile) => {
                        let tile = tile.lock();
                        if tile.bounds.sqr_distance(observer) < max_sqr_distance {
                            self.pipeline.display.set_visible(tile.display_handle, true);
                            self.visible_last_tick.push(coord);
                        }
                    }
                    None => {
                        self.spawn_tile(coord);
                        summary.created += 1;
                    }
                }
            }
        }

        summary.visible = self.visible_last_tick.len();
        summary.evicted = self.evict_distant(observer);
        summary
    }

    fn spawn_tile(&mut self, coord: Point2<i32>) {
        let world_position = Point3::new(
            coord.x as f32 * TILE_EDGE_LENGTH,
            0.0,
            coord.y as f32 * TILE_EDGE_LENGTH,
        );
        let display_handle = self.pipeline.display.create_visual_object(world_position);
        self.pipeline.display.set_visible(display_handle, false);

        let tile = MtResource::new(TerrainTile::new(coord, display_handle));
        self.tiles.insert(coord, tile.clone());
        self.pipeline.request_field(tile);
    }

    fn evict_distant(&mut self, observer: Point2<f32>) -> usize {
        let Some(retention) = self.settings.retention_distance else {
            return 0;
        };
        let max_sqr_distance = retention * retention;
        let display = &self.pipeline.display;

        let before = self.tiles.len();
        self.tiles.retain(|coord, tile| {
            let mut tile = tile.lock();
            if tile.bounds.sqr_distance(observer) <= max_sqr_distance {
                return true;
            }
            debug!("Evicting tile {:?} in {:?}", coord, tile.state);
            tile.evicted = true;
            display.destroy_visual_object(tile.display_handle);
            false
        });
        self.visible_last_tick
            .retain(|coord| self.tiles.contains_key(coord));

        before - self.tiles.len()
    }

    /// The tile at `coord`, if one exists.
    pub fn tile(&self, coord: Point2<i32>) -> Option<MtResource<TerrainTile>> {
        self.tiles.get(&coord).cloned()
    }

    /// Number of tiles currently held.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of tiles in `state`.
    pub fn count_in_state(&self, state: GenerationState) -> usize {
        self.tiles
            .values()
            .filter(|tile| tile.lock().state == state)
            .count()
    }

    /// Coordinates shown by the most recent tick.
    pub fn visible_tiles(&self) -> &[Point2<i32>] {
        &self.visible_last_tick
    }

    /// The streaming settings in use, after sanitizing.
    pub fn settings(&self) -> &StreamingSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::display::HeadlessDisplay;
    use crate::engine_state::task_management::SchedulerSettings;
    use std::thread;
    use std::time::{Duration, Instant};

    fn origin() -> Point2<f32> {
        Point2::new(0.0, 0.0)
    }

    fn setup(
        streaming: StreamingSettings,
    ) -> (ChunkStreamer, ComputeScheduler, Arc<HeadlessDisplay>) {
        let scheduler = ComputeScheduler::new(&SchedulerSettings {
            worker_count: Some(2),
            ..SchedulerSettings::default()
        })
        .unwrap();
        let display = Arc::new(HeadlessDisplay::new());
        let config = TerrainConfig {
            streaming,
            mesh: MeshSettings {
                level_of_detail: 6,
                ..MeshSettings::default()
            },
            ..TerrainConfig::default()
        };
        let streamer = ChunkStreamer::new(&config, scheduler.clone(), display.clone());
        (streamer, scheduler, display)
    }

    fn view(view_distance: f32, retention_distance: Option<f32>) -> StreamingSettings {
        StreamingSettings {
            view_distance,
            retention_distance,
        }
    }

    fn tick_until(
        streamer: &mut ChunkStreamer,
        scheduler: &ComputeScheduler,
        observer: Point2<f32>,
        done: impl Fn(&ChunkStreamer) -> bool,
    ) {
        let deadline = Instant::now() + Duration::from_secs(30);
        while !done(streamer) {
            assert!(Instant::now() < deadline, "tiles never finished generating");
            streamer.tick(observer);
            scheduler.drain_completed();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn observer_at_origin_considers_a_five_by_five_neighborhood() {
        let (mut streamer, scheduler, display) = setup(view(450.0, None));

        let first = streamer.tick(origin());
        assert_eq!(first.observer_coord, Point2::new(0, 0));
        assert_eq!(first.considered, 25);
        assert_eq!(first.created, 25);
        assert_eq!(first.visible, 0);
        assert_eq!(display.object_count(), 25);

        let second = streamer.tick(origin());
        assert_eq!(second.considered, 25);
        assert_eq!(second.created, 0);
        // the four corner tiles are farther than 450 units
        assert_eq!(second.visible, 21);
        assert_eq!(streamer.tile_count(), 25);
        assert_eq!(display.object_count(), 25);

        scheduler.shutdown();
    }

    #[test]
    fn tiles_reach_mesh_ready_and_get_geometry() {
        let (mut streamer, scheduler, display) = setup(view(100.0, None));

        tick_until(&mut streamer, &scheduler, origin(), |streamer| {
            streamer.tile_count() == 9
                && streamer.count_in_state(GenerationState::MeshReady) == 9
        });

        assert_eq!(display.meshed_count(), 9);
        let tile = streamer.tile(Point2::new(1, -1)).unwrap();
        let tile = tile.lock();
        let mesh = tile.mesh.as_ref().unwrap();
        let object = display.object(tile.display_handle).unwrap();
        assert_eq!(object.vertex_count, mesh.vertex_count());
        assert_eq!(object.position, Point3::new(240.0, 0.0, -240.0));
        assert_eq!(tile.colors.as_ref().unwrap().width(), MAP_CHUNK_SIZE);

        scheduler.shutdown();
    }

    #[test]
    fn visibility_follows_the_observer() {
        let (mut streamer, scheduler, display) = setup(view(100.0, None));
        streamer.tick(origin());

        streamer.tick(origin());
        assert_eq!(streamer.visible_tiles(), &[Point2::new(0, 0)]);
        assert_eq!(display.visible_count(), 1);

        let summary = streamer.tick(Point2::new(240.0, 0.0));
        assert_eq!(summary.observer_coord, Point2::new(1, 0));
        assert_eq!(summary.created, 3);
        assert_eq!(streamer.visible_tiles(), &[Point2::new(1, 0)]);
        assert_eq!(display.visible_count(), 1);

        let origin_tile = streamer.tile(Point2::new(0, 0)).unwrap();
        assert!(!display.is_visible(origin_tile.lock().display_handle));

        scheduler.shutdown();
    }

    #[test]
    fn distant_tiles_are_evicted_and_late_results_ignored() {
        let (mut streamer, scheduler, display) = setup(view(100.0, Some(300.0)));
        streamer.tick(origin());
        let old = streamer.tile(Point2::new(0, 0)).unwrap();

        let far = Point2::new(2400.0, 0.0);
        let summary = streamer.tick(far);
        assert_eq!(summary.created, 9);
        assert_eq!(summary.evicted, 9);
        assert_eq!(streamer.tile_count(), 9);
        assert_eq!(display.object_count(), 9);
        assert!(old.lock().evicted);

        tick_until(&mut streamer, &scheduler, far, |streamer| {
            streamer.count_in_state(GenerationState::MeshReady) == 9
        });
        assert_eq!(old.lock().state, GenerationState::FieldRequested);
        assert!(old.lock().mesh.is_none());
        assert_eq!(display.meshed_count(), 9);

        scheduler.shutdown();
    }

    #[test]
    fn failed_requests_mark_tiles_failed() {
        let (mut streamer, scheduler, _display) = setup(view(100.0, None));
        scheduler.shutdown();

        streamer.tick(origin());
        scheduler.drain_completed();

        assert_eq!(streamer.count_in_state(GenerationState::Failed), 9);
    }

    #[test]
    fn sanitize_keeps_retention_beyond_view() {
        let mut settings = view(-5.0, Some(10.0));

        assert_eq!(settings.sanitize().len(), 2);
        assert_eq!(settings.view_distance, TILE_EDGE_LENGTH);
        assert_eq!(settings.retention_distance, Some(TILE_EDGE_LENGTH));
        assert_eq!(settings.view_radius_in_tiles(), 1);
    }

    #[test]
    fn huge_view_distance_is_capped() {
        let mut settings = view(1e12, None);

        assert_eq!(settings.sanitize().len(), 1);
        assert_eq!(settings.view_distance, MAX_VIEW_DISTANCE);
        assert_eq!(settings.view_radius_in_tiles(), MAX_VIEW_RADIUS_TILES);
        assert_eq!(view(1e12, None).view_radius_in_tiles(), MAX_VIEW_RADIUS_TILES);
    }

    #[test]
    fn neighborhood_at_the_grid_edge_does_not_overflow() {
        let (mut streamer, scheduler, _display) = setup(view(100.0, None));
        scheduler.shutdown();

        let summary = streamer.tick(Point2::new(1e12, 0.0));

        assert_eq!(summary.observer_coord.x, i32::MAX);
        assert_eq!(summary.considered, 9);
        // the two columns past the edge collapse onto i32::MAX
        assert_eq!(summary.created, 6);
        assert_eq!(streamer.tile_count(), 6);
        scheduler.drain_completed();
    }

    #[test]
    fn tile_coord_rounds_to_nearest() {
        assert_eq!(tile_coord(Point2::new(119.0, -121.0)), Point2::new(0, -1));
        assert_eq!(tile_coord(Point2::new(361.0, 0.0)), Point2::new(2, 0));
    }
}
