//! Self-contained spatial-index and geometry-predicate primitives shared by
//! every geometry and relation check strategy in `geoqc`.
//!
//! Kept as an independent workspace member (no dependency on the rest of
//! `geoqc`) so it can be bulk-loaded once per layer and cached by fingerprint
//! without pulling in the engine's rule/orchestration types.

pub mod angle;
pub mod bbox;
pub mod hash;
pub mod predicate;
pub mod snap;

pub use bbox::{IndexedBox, SpatialIndex};
pub use snap::EndpointGraph;
