pub mod convert;
pub mod dense;

pub use convert::GridConverter;
pub use dense::DenseGrid;

use pcb_common::geom::coord::GridCoord;

/// The routing grid's cell-state surface (§4.2). `blocked` is a permanent,
/// net-independent obstruction (board-outside region, keep-out zone);
/// net ownership of pad/clearance footprints and committed wire cells is
/// tracked separately so `is_blocked_for_net` can distinguish "blocked for
/// everyone" from "blocked for every net but this one".
pub trait RoutingGrid: Sync + Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layers(&self) -> u8;

    fn set_obstacle(&mut self, coord: GridCoord);
    fn is_obstacle(&self, coord: GridCoord) -> bool;

    /// Permanently claims a cell for a net's pad footprint (or its
    /// clearance margin). Claimed cells are never touched by `remove_wire`.
    fn claim_anchor(&mut self, coord: GridCoord, net_id: u32);

    fn add_wire(&mut self, coord: GridCoord, net_id: u32);
    fn remove_wire(&mut self, coord: GridCoord);

    /// Claims a cell as part of a committed wire's clearance halo (§4.2's
    /// `shape ⊕ clearance` expansion). Tracked separately from wire
    /// occupancy so a clearance claim blocks foreign nets without counting
    /// toward this cell's negotiated-congestion capacity.
    fn claim_clearance(&mut self, coord: GridCoord, net_id: u32);
    /// Releases one clearance claim made by `claim_clearance`, on ripup.
    fn release_clearance(&mut self, coord: GridCoord);

    /// Net-id owning the cell, or 0 if unclaimed.
    fn owner(&self, coord: GridCoord) -> u32;
    /// True if `coord` cannot be used by `net_id`: permanently blocked, or
    /// claimed/occupied by a different net.
    fn is_blocked_for_net(&self, coord: GridCoord, net_id: u32) -> bool;

    /// Present-congestion + history contribution to the A* cost function,
    /// already scaled by the grid's current penalty weight (§4.3).
    fn get_cost(&self, coord: GridCoord) -> f64;
    fn update_history(&mut self, history_weight: f64);

    fn usage_count(&self, coord: GridCoord) -> u32;
    fn is_congested(&self, coord: GridCoord) -> bool;
    fn total_conflicts(&self) -> usize;
    /// Every cell currently over capacity, for §6 violation reporting.
    fn congested_cells(&self) -> Vec<GridCoord>;

    fn set_penalty(&mut self, penalty: f64);
}
