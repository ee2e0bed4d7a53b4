pub mod generator;
pub mod matcher;
pub mod parser;
pub mod registry;
pub mod sweeper;

pub use generator::*;
pub use registry::PlaylistRegistry;
pub use sweeper::PlaylistSweeper;
