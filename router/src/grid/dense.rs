use super::RoutingGrid;
use pcb_common::geom::coord::GridCoord;

// Packed per-cell state for cache locality.
#[derive(Clone, Copy)]
struct GridNode {
    occupancy: u16,  // number of nets whose current solution claims this cell
    history: u16,    // quantized history cost, accumulated across ripup iterations
    cost_cache: f32, // present-congestion + history, pre-folded for the A* hot loop
    owner: u32,      // last net to claim the cell; 0 = unclaimed
    clearance: u16,  // clearance-halo claims, tracked apart from occupancy
}

impl Default for GridNode {
    fn default() -> Self {
        Self {
            occupancy: 0,
            history: 0,
            cost_cache: 0.0,
            owner: 0,
            clearance: 0,
        }
    }
}

pub struct DenseGrid {
    width: u32,
    height: u32,
    layers: u8,
    nodes: Vec<GridNode>,
    obstacles: Vec<bool>,
    /// Pad footprints and their clearance margins. Set once at session
    /// setup and never touched by `remove_wire`, unlike routed-wire cells.
    anchors: Vec<bool>,
    current_penalty: f64,
    capacity: u32,
}

impl DenseGrid {
    pub fn new(width: u32, height: u32, layers: u8, capacity: u32) -> Self {
        let size = (width as usize) * (height as usize) * (layers as usize);
        if size > 2_000_000_000 {
            log::warn!("Allocating large DenseGrid: {} cells. Ensure sufficient RAM.", size);
        }

        Self {
            width,
            height,
            layers,
            nodes: vec![GridNode::default(); size],
            obstacles: vec![false; size],
            anchors: vec![false; size],
            current_penalty: 1.0,
            capacity: capacity.max(1),
        }
    }

    #[inline(always)]
    fn index(&self, coord: GridCoord) -> usize {
        (coord.z as usize) * (self.width as usize) * (self.height as usize)
            + (coord.y as usize) * (self.width as usize)
            + (coord.x as usize)
    }

    fn coord_at(&self, idx: usize) -> GridCoord {
        let plane = self.width as usize * self.height as usize;
        let z = idx / plane;
        let rem = idx % plane;
        GridCoord::new((rem % self.width as usize) as u32, (rem / self.width as usize) as u32, z as u8)
    }

    #[inline(always)]
    fn update_cache_at(&mut self, idx: usize) {
        let node = &mut self.nodes[idx];
        let history_cost = node.history as f64 * 0.1;
        let occ = node.occupancy as f64;
        let present = self.current_penalty * (1.0 + occ);
        node.cost_cache = (history_cost + present) as f32;
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn layers(&self) -> u8 {
        self.layers
    }

    fn set_obstacle(&mut self, coord: GridCoord) {
        let idx = self.index(coord);
        self.obstacles[idx] = true;
    }

    fn is_obstacle(&self, coord: GridCoord) -> bool {
        if coord.x >= self.width || coord.y >= self.height || coord.z >= self.layers {
            return true;
        }
        self.obstacles[self.index(coord)]
    }

    fn claim_anchor(&mut self, coord: GridCoord, net_id: u32) {
        let idx = self.index(coord);
        self.anchors[idx] = true;
        self.nodes[idx].owner = net_id;
        self.nodes[idx].occupancy = self.nodes[idx].occupancy.max(1);
        self.update_cache_at(idx);
    }

    fn add_wire(&mut self, coord: GridCoord, net_id: u32) {
        let idx = self.index(coord);
        if self.anchors[idx] {
            // Already claimed as a pad/clearance anchor; routing across it
            // does not add a second occupant.
            return;
        }
        self.nodes[idx].occupancy += 1;
        self.nodes[idx].owner = net_id;
        self.update_cache_at(idx);
    }

    fn remove_wire(&mut self, coord: GridCoord) {
        let idx = self.index(coord);
        if self.anchors[idx] {
            return;
        }
        let node = &mut self.nodes[idx];
        if node.occupancy > 0 {
            node.occupancy -= 1;
        }
        if node.occupancy == 0 {
            node.owner = 0;
        }
        self.update_cache_at(idx);
    }

    fn claim_clearance(&mut self, coord: GridCoord, net_id: u32) {
        let idx = self.index(coord);
        let node = &mut self.nodes[idx];
        if node.owner == 0 {
            node.owner = net_id;
        }
        node.clearance = node.clearance.saturating_add(1);
    }

    fn release_clearance(&mut self, coord: GridCoord) {
        let idx = self.index(coord);
        let node = &mut self.nodes[idx];
        if node.clearance > 0 {
            node.clearance -= 1;
        }
        if node.clearance == 0 && node.occupancy == 0 && !self.anchors[idx] {
            node.owner = 0;
        }
    }

    fn owner(&self, coord: GridCoord) -> u32 {
        self.nodes[self.index(coord)].owner
    }

    fn is_blocked_for_net(&self, coord: GridCoord, net_id: u32) -> bool {
        if self.is_obstacle(coord) {
            return true;
        }
        let node = &self.nodes[self.index(coord)];
        node.owner != 0 && node.owner != net_id && (node.occupancy > 0 || node.clearance > 0)
    }

    #[inline(always)]
    fn get_cost(&self, coord: GridCoord) -> f64 {
        self.nodes[self.index(coord)].cost_cache as f64
    }

    fn update_history(&mut self, history_weight: f64) {
        for i in 0..self.nodes.len() {
            let occ = self.nodes[i].occupancy as u32;
            if occ > self.capacity {
                let overflow = (occ - self.capacity) as f64;
                let inc = (overflow * history_weight) as u16;
                self.nodes[i].history = self.nodes[i].history.saturating_add(inc.max(1));
            }
        }
        for i in 0..self.nodes.len() {
            self.update_cache_at(i);
        }
    }

    fn usage_count(&self, coord: GridCoord) -> u32 {
        self.nodes[self.index(coord)].occupancy as u32
    }

    fn is_congested(&self, coord: GridCoord) -> bool {
        self.nodes[self.index(coord)].occupancy as u32 > self.capacity
    }

    fn total_conflicts(&self) -> usize {
        self.nodes.iter().filter(|n| n.occupancy as u32 > self.capacity).count()
    }

    fn congested_cells(&self) -> Vec<GridCoord> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.occupancy as u32 > self.capacity)
            .map(|(i, _)| self.coord_at(i))
            .collect()
    }

    fn set_penalty(&mut self, penalty: f64) {
        self.current_penalty = penalty;
        for i in 0..self.nodes.len() {
            self.update_cache_at(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearance_claim_blocks_foreign_net_but_not_owner() {
        let mut grid = DenseGrid::new(20, 20, 1, 1);
        let c = GridCoord::new(5, 5, 0);
        grid.claim_clearance(c, 1);
        assert!(grid.is_blocked_for_net(c, 2));
        assert!(!grid.is_blocked_for_net(c, 1));
    }

    #[test]
    fn releasing_clearance_unblocks_the_cell() {
        let mut grid = DenseGrid::new(20, 20, 1, 1);
        let c = GridCoord::new(5, 5, 0);
        grid.claim_clearance(c, 1);
        grid.release_clearance(c);
        assert!(!grid.is_blocked_for_net(c, 2));
        assert_eq!(grid.owner(c), 0);
    }

    #[test]
    fn clearance_does_not_count_toward_congestion() {
        let mut grid = DenseGrid::new(20, 20, 1, 1);
        let c = GridCoord::new(5, 5, 0);
        grid.claim_clearance(c, 1);
        grid.claim_clearance(c, 1);
        assert!(!grid.is_congested(c));
        assert_eq!(grid.total_conflicts(), 0);
    }

    #[test]
    fn congested_cells_lists_every_overflowing_cell() {
        let mut grid = DenseGrid::new(20, 20, 1, 1);
        let a = GridCoord::new(2, 2, 0);
        let b = GridCoord::new(3, 3, 0);
        grid.add_wire(a, 1);
        grid.add_wire(a, 2);
        grid.add_wire(b, 3);
        grid.add_wire(b, 4);
        let mut cells = grid.congested_cells();
        cells.sort_by_key(|c| (c.x, c.y));
        assert_eq!(cells, vec![a, b]);
    }
}
