pub mod buffer;
pub mod color_table;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod job;
pub mod pool;
pub mod tile;

pub use buffer::{DisplaySurface, RenderBuffer};
pub use color_table::{ColorTable, INTERIOR, MIN_ESCAPE};
pub use coordinator::{Layout, RenderCoordinator, RenderStats, TilePool};
pub use error::{ComputeError, JobError, RenderError};
pub use export::{export_png, ExportMetadata};
pub use job::{compute_tile, TileJob, TileResult};
pub use pool::{JobHandle, WorkerPool};
pub use tile::{partition, Tile};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
