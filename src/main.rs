//! # Terrain Streamer Entry Point
//!
//! Calls into the library's `run()` function, which sets up logging and runs the
//! headless streaming demo or the preview export.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- [config.json] [ticks]
//! cargo run --release -- preview <dir> [config.json]
//! ```

fn main() {
    terrain_streamer::run();
}
