//! Geodatabase Reader (spec.md §4.1): a `DataSource`/`LayerCursor` trait
//! pair so more than one physical backend can satisfy the same cursor
//! contract, plus the concrete `ShapefileDirSource` backend.

pub mod integrity;
pub mod shapefile_source;

use crate::error::Result;
use crate::model::{Extent, Feature, LayerInfo};

pub use shapefile_source::ShapefileDirSource;

/// Opens a source and enumerates its layers. Analogous to the teacher's
/// `MapLayer`/`Map` split, generalized behind a trait so the engine never
/// depends on a concrete file format.
pub trait DataSource: Send + Sync {
    fn list_layers(&self) -> Result<Vec<LayerInfo>>;

    fn open_layer(&self, id: &str) -> Result<Box<dyn LayerCursor>>;
}

/// A forward-only, restartable cursor over one layer's features. Calls to
/// `next` are single-threaded per cursor; multiple cursors over the same
/// layer are permitted (each strategy opens its own).
pub trait LayerCursor: Send {
    fn reset(&mut self) -> Result<()>;

    fn next(&mut self) -> Result<Option<Feature>>;

    /// A negative return means "unknown without a scan" when `force_scan`
    /// is `false` and the backend has no cheap count available.
    fn count(&mut self, force_scan: bool) -> Result<i64>;

    fn extent(&self) -> Option<Extent>;
}
