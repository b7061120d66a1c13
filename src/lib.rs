#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Terrain Streamer
//!
//! Procedural terrain generated in fixed-size chunks on a worker pool and streamed
//! around a moving observer.
//!
//! ## Key Modules
//!
//! * `core` - Shared-resource primitive used across threads
//! * `engine_state` - Noise fields, band classification, meshing, scheduling and streaming
//!
//! ## Architecture
//!
//! Generation runs in two stages per tile:
//! * A field stage samples seeded multi-octave noise and classifies each cell into a band
//! * A mesh stage triangulates the heights at the configured level of detail
//!
//! Both stages run on background workers. Their results are applied on the thread that
//! ticks the engine, which is also the only thread that touches tile visibility.
//!
//! ## Usage
//!
//! ```bash
//! # fly an observer across the terrain for 600 ticks
//! terrain_streamer config.json 600
//!
//! # write noise_map.png and color_map.png for one chunk
//! terrain_streamer preview out/ config.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cgmath::Point2;
use log::{error, info, warn};
use web_time::Instant;

pub mod core;
pub mod engine_state;

pub use engine_state::{config::TerrainConfig, error::TerrainError, generate_map, TerrainEngine};

use engine_state::rendering::{display::HeadlessDisplay, preview};
use engine_state::streaming::tile::GenerationState;

/// Ticks flown by the demo when none are given.
const DEFAULT_TICKS: u32 = 600;

/// World units the demo observer moves per tick.
const OBSERVER_SPEED: f32 = 8.0;

/// Target tick period of the demo loop.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Entry point of the `terrain_streamer` binary.
///
/// Initializes logging from `RUST_LOG`, then either flies an observer across the
/// terrain or, with `preview <dir>`, writes preview images of a single chunk.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("preview") => run_preview(&args[1..]),
        _ => run_flight(&args),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&String>) -> Result<TerrainConfig, TerrainError> {
    match path {
        Some(path) => TerrainConfig::load(Path::new(path)),
        None => Ok(TerrainConfig::default()),
    }
}

fn run_preview(args: &[String]) -> Result<(), TerrainError> {
    let directory = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(args.get(1))?;

    let generated = generate_map(&config)?;
    let (noise_path, color_path) = preview::export(&directory, &generated.map)?;
    info!(
        "Preview chunk: {} vertices, {} triangles ({}, {})",
        generated.mesh.vertex_count(),
        generated.mesh.triangle_count(),
        noise_path.display(),
        color_path.display()
    );
    Ok(())
}

fn run_flight(args: &[String]) -> Result<(), TerrainError> {
    let config = load_config(args.first())?;
    let ticks = match args.get(1) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid tick count {:?}, using {}", raw, DEFAULT_TICKS);
            DEFAULT_TICKS
        }),
        None => DEFAULT_TICKS,
    };

    let display = Arc::new(HeadlessDisplay::new());
    let mut engine = TerrainEngine::new(&config, display.clone())?;

    let started = Instant::now();
    for tick in 0..ticks {
        let observer = Point2::new(tick as f32 * OBSERVER_SPEED, 0.0);
        let summary = engine.update(observer);

        if summary.created > 0 || summary.evicted > 0 {
            info!(
                "Observer at tile ({}, {}): {} tiles, {} new, {} evicted, {} visible",
                summary.observer_coord.x,
                summary.observer_coord.y,
                engine.streamer().tile_count(),
                summary.created,
                summary.evicted,
                summary.visible
            );
        }

        thread::sleep(TICK_INTERVAL);
    }

    let streamer = engine.streamer();
    info!(
        "Flew {} ticks in {:?}: {} tiles held, {} meshed, {} failed, {} objects visible",
        ticks,
        started.elapsed(),
        streamer.tile_count(),
        streamer.count_in_state(GenerationState::MeshReady),
        streamer.count_in_state(GenerationState::Failed),
        display.visible_count()
    );
    info!(
        "{} requests still queued, {} in flight, {} results pending",
        engine.scheduler().queued(),
        engine.scheduler().in_flight(),
        engine.scheduler().pending_completions()
    );
    Ok(())
}
