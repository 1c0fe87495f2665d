pub mod coord;
pub mod point;
pub mod rect;
pub mod rtree;

pub use coord::GridCoord;
pub use point::{LayerPoint, Point, grid_key, round_away_from_zero};
pub use rect::Rect;
pub use rtree::SpatialIndex;
