//! Spatial partitioning data structures
//!
//! Provides the uniform horizontal grid the world manager uses to bucket
//! entities for proximity queries and streaming.

mod grid;

pub use grid::{GridCell, GridCoord, SpatialGrid};
