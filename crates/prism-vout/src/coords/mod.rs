//! Coordinate and geometry types shared by the compositor and backends.
//!
//! Canonical space:
//! - physical pixels of the frame or surface
//! - origin top-left
//! - +X right, +Y down
//!
//! Rectangles are stored as corner pairs. A rectangle whose second corner lies
//! before its first one is mirrored along that axis; this is how flips are
//! expressed in crops and placements.

mod place;
mod rect;

pub use place::Place;
pub use rect::{Rect2D, Rect2Df};
