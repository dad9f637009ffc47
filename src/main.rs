//! # Voxel World Entry Point
//!
//! This is the main entry point for the native headless driver. It simply
//! calls into the library's `run()` function.
//!
//! For web builds, see `run_web()` and `WebWorld` in the library.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info VOXEL_WORLD_CONFIG=world.json cargo run --release
//! ```

fn main() {
    #[cfg(not(target_family = "wasm"))]
    voxel_world::run();
}
