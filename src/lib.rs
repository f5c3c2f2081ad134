#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod placement;
pub mod placement_dump;
pub mod render;
pub mod scene;
pub mod tiles;

#[cfg(feature = "cli")]
pub use cli::run;
