//! Single-net, two-terminal A* over the routing grid (§4.3). Searches are
//! windowed to the bounding box of the start/target sets (plus a margin)
//! so repeated searches on a large board stay cheap; indices inside the
//! window are local, letting the reusable scratch buffers stay small.

use crate::grid::RoutingGrid;
use crate::heuristic::{Heuristic, HeuristicContext};
use pcb_common::error::SearchError;
use pcb_common::geom::coord::GridCoord;
use pcb_common::layers::{LayerStack, ViaRules};
use pcb_common::rules::EffectiveRules;
use pcb_common::util::CancellationToken;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f_score: i64,
    via_count: u16,
    turn_count: u16,
    index: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.via_count.cmp(&self.via_count))
            .then_with(|| other.turn_count.cmp(&self.turn_count))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy)]
struct Window {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    width: u32,
    height: u32,
    layers: u8,
}

impl Window {
    fn new(points: &[GridCoord], margin: u32, grid_w: u32, grid_h: u32, layers: u8) -> Self {
        let mut min_x = points[0].x;
        let mut max_x = points[0].x;
        let mut min_y = points[0].y;
        let mut max_y = points[0].y;
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.saturating_sub(margin);
        let max_x = (max_x + margin).min(grid_w.saturating_sub(1));
        let min_y = min_y.saturating_sub(margin);
        let max_y = (max_y + margin).min(grid_h.saturating_sub(1));
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
            layers,
        }
    }

    #[inline(always)]
    fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    #[inline(always)]
    fn local_index(&self, c: GridCoord) -> usize {
        let lx = c.x - self.min_x;
        let ly = c.y - self.min_y;
        (c.z as u32 * self.width * self.height + ly * self.width + lx) as usize
    }

    #[inline(always)]
    fn coord(&self, idx: u32) -> GridCoord {
        let plane = self.width * self.height;
        let z = (idx / plane) as u8;
        let rem = idx % plane;
        GridCoord::new(rem % self.width + self.min_x, rem / self.width + self.min_y, z)
    }
}

/// Reusable scratch buffers across searches, so repeated A* calls inside
/// one congestion-driver iteration don't reallocate.
pub struct AStar {
    parent: Vec<u32>,
    g_score: Vec<i64>,
    dir: Vec<(i8, i8)>,
    via_count: Vec<u16>,
    turn_count: Vec<u16>,
    visited_tag: Vec<u32>,
    current_tag: u32,
    capacity: usize,
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

const SCALE: f64 = 1000.0;

impl AStar {
    pub fn new() -> Self {
        let cap = 4096;
        Self {
            parent: vec![u32::MAX; cap],
            g_score: vec![i64::MAX; cap],
            dir: vec![(0, 0); cap],
            via_count: vec![0; cap],
            turn_count: vec![0; cap],
            visited_tag: vec![0; cap],
            current_tag: 1,
            capacity: cap,
        }
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size > self.capacity {
            self.capacity = size.max(self.capacity * 2);
            self.parent.resize(self.capacity, u32::MAX);
            self.g_score.resize(self.capacity, i64::MAX);
            self.dir.resize(self.capacity, (0, 0));
            self.via_count.resize(self.capacity, 0);
            self.turn_count.resize(self.capacity, 0);
            self.visited_tag.resize(self.capacity, 0);
        }
    }

    fn reset(&mut self) {
        self.current_tag += 1;
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.current_tag = 1;
        }
    }

    /// Searches from any cell in `starts` to the nearest cell in `targets`.
    /// Returns the path (inclusive of both endpoints) on success.
    #[allow(clippy::too_many_arguments)]
    pub fn find_path(
        &mut self,
        grid: &dyn RoutingGrid,
        via_rules: &ViaRules,
        layer_stack: &LayerStack,
        rules: &EffectiveRules,
        starts: &[GridCoord],
        targets: &[GridCoord],
        net_id: u32,
        heuristic: Heuristic,
        allowed_pins: &[GridCoord],
        max_expansions: u32,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<GridCoord>, SearchError> {
        if starts.is_empty() || targets.is_empty() {
            return Err(SearchError::Unreachable);
        }

        let target_set: HashSet<GridCoord> = targets.iter().copied().collect();
        let mut all_points: Vec<GridCoord> = starts.to_vec();
        all_points.extend_from_slice(targets);
        let margin = 8u32;
        let window = Window::new(&all_points, margin, grid.width(), grid.height(), grid.layers());
        self.ensure_capacity((window.width * window.height * window.layers as u32) as usize);
        self.reset();

        let ctx_multiplier = rules.cost_multiplier;
        let mut heap = BinaryHeap::new();

        for &start in starts {
            if !window.contains(start) {
                continue;
            }
            let local = window.local_index(start);
            self.g_score[local] = 0;
            self.visited_tag[local] = self.current_tag;
            self.parent[local] = u32::MAX;
            self.dir[local] = (0, 0);
            self.via_count[local] = 0;
            self.turn_count[local] = 0;
            let h = self.estimate(start, &target_set, heuristic, grid, rules, None);
            heap.push(State { f_score: (h * SCALE) as i64, via_count: 0, turn_count: 0, index: local as u32 });
        }

        let mut expansions = 0u32;
        let mut since_poll = 0u32;

        while let Some(State { index, .. }) = heap.pop() {
            let curr_local = index as usize;
            let position = window.coord(index);

            if target_set.contains(&position) {
                return Ok(self.reconstruct(position, &window));
            }

            expansions += 1;
            if expansions > max_expansions {
                return Err(SearchError::ExceededNodeBudget);
            }

            since_poll += 1;
            if since_poll >= 10_000 {
                since_poll = 0;
                if let Some(token) = cancel {
                    if token.is_cancelled() {
                        return Err(SearchError::ExceededNodeBudget);
                    }
                }
            }

            let current_g = self.g_score[curr_local];
            let current_dir = self.dir[curr_local];
            let current_via = self.via_count[curr_local];
            let current_turn = self.turn_count[curr_local];

            for (neighbor, is_via) in self.neighbors(position, &window, grid, via_rules, layer_stack, net_id) {
                if !window.contains(neighbor) {
                    continue;
                }
                let is_target = target_set.contains(&neighbor);
                if !is_target && grid.is_blocked_for_net(neighbor, net_id) {
                    let allowed = allowed_pins.iter().any(|&p| p == neighbor);
                    if !allowed {
                        continue;
                    }
                }

                let turned = !is_via && current_dir != (0, 0) && {
                    let dx = (neighbor.x as i32 - position.x as i32).signum();
                    let dy = (neighbor.y as i32 - position.y as i32).signum();
                    (dx, dy) != current_dir
                };

                let base_step_cost = if is_via {
                    rules.cost_via
                } else if (neighbor.x as i32 - position.x as i32).abs() + (neighbor.y as i32 - position.y as i32).abs() == 2 {
                    rules.cost_diagonal
                } else {
                    rules.cost_straight
                };
                let turn_penalty = if turned { rules.cost_turn } else { 0.0 };
                let congestion_cost = if is_target { 0.0 } else { grid.get_cost(neighbor) };
                let step_cost = (base_step_cost + turn_penalty + congestion_cost) * ctx_multiplier;

                let tentative_g = current_g + (step_cost * SCALE) as i64;
                let neighbor_local = window.local_index(neighbor);
                let better = self.visited_tag[neighbor_local] != self.current_tag || tentative_g < self.g_score[neighbor_local];
                if better {
                    self.parent[neighbor_local] = curr_local as u32;
                    self.g_score[neighbor_local] = tentative_g;
                    self.visited_tag[neighbor_local] = self.current_tag;
                    self.dir[neighbor_local] = if is_via { current_dir } else { (
                        (neighbor.x as i32 - position.x as i32).signum(),
                        (neighbor.y as i32 - position.y as i32).signum(),
                    ) };
                    self.via_count[neighbor_local] = current_via + if is_via { 1 } else { 0 };
                    self.turn_count[neighbor_local] = current_turn + if turned { 1 } else { 0 };

                    let h = self.estimate(neighbor, &target_set, heuristic, grid, rules, Some(self.dir[neighbor_local]));
                    heap.push(State {
                        f_score: tentative_g + (h * SCALE) as i64,
                        via_count: self.via_count[neighbor_local],
                        turn_count: self.turn_count[neighbor_local],
                        index: neighbor_local as u32,
                    });
                }
            }
        }

        Err(SearchError::Unreachable)
    }

    #[allow(clippy::too_many_arguments)]
    fn estimate(
        &self,
        from: GridCoord,
        targets: &HashSet<GridCoord>,
        heuristic: Heuristic,
        grid: &dyn RoutingGrid,
        rules: &EffectiveRules,
        predecessor_dir: Option<(i8, i8)>,
    ) -> f64 {
        let ctx = HeuristicContext {
            grid,
            cost_straight: rules.cost_straight,
            net_multiplier: rules.cost_multiplier,
            predecessor_dir: predecessor_dir.map(|(x, y)| (x as i32, y as i32)),
        };
        targets
            .iter()
            .map(|&t| heuristic.estimate(from, t, &ctx))
            .fold(f64::INFINITY, f64::min)
    }

    #[allow(clippy::too_many_arguments)]
    fn neighbors(
        &self,
        position: GridCoord,
        window: &Window,
        grid: &dyn RoutingGrid,
        via_rules: &ViaRules,
        layer_stack: &LayerStack,
        net_id: u32,
    ) -> Vec<(GridCoord, bool)> {
        let mut out = Vec::with_capacity(10);
        const STEPS: [(i32, i32); 8] =
            [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (-1, 1), (1, -1), (1, 1)];
        for (dx, dy) in STEPS {
            let nx = position.x as i32 + dx;
            let ny = position.y as i32 + dy;
            if nx < 0 || ny < 0 {
                continue;
            }
            let neighbor = GridCoord::new(nx as u32, ny as u32, position.z);
            if window.contains(neighbor) && !grid.is_obstacle(neighbor) {
                out.push((neighbor, false));
            }
        }

        for k in layer_stack.routable_indices() {
            if k == position.z {
                continue;
            }
            if let Some(via) = via_rules.best_via(position.z, k) {
                // §4.2: a via may only pass through an intermediate layer's
                // cell if it is empty, owned by this net, or a pad of this
                // net — never a foreign net's committed trace.
                let blocked_intermediate = (via.start_layer.min(via.end_layer)..=via.start_layer.max(via.end_layer))
                    .filter(|&l| via.blocks(l))
                    .any(|l| {
                        let cell = GridCoord::new(position.x, position.y, l);
                        window.contains(cell) && (grid.is_obstacle(cell) || grid.is_blocked_for_net(cell, net_id))
                    });
                if blocked_intermediate {
                    continue;
                }
                let target = GridCoord::new(position.x, position.y, k);
                if window.contains(target) {
                    out.push((target, true));
                }
            }
        }
        out
    }

    fn reconstruct(&self, end: GridCoord, window: &Window) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut curr = window.local_index(end);
        loop {
            path.push(window.coord(curr as u32));
            let parent = self.parent[curr];
            if parent == u32::MAX {
                break;
            }
            curr = parent as usize;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DenseGrid;
    use pcb_common::layers::LayerStack;

    #[test]
    fn via_neighbor_rejects_a_foreign_nets_trace_on_an_intermediate_layer() {
        let mut grid = DenseGrid::new(10, 10, 4, 1);
        let stack = LayerStack::preset_4layer();
        let vias = ViaRules::standard(4);
        let pos = GridCoord::new(3, 3, 3);
        let far_target = GridCoord::new(3, 3, 0);
        grid.add_wire(GridCoord::new(3, 3, 1), 99);

        let window = Window::new(&[pos, far_target], 2, 10, 10, 4);
        let astar = AStar::new();
        let options = astar.neighbors(pos, &window, &grid, &vias, &stack, 1);
        assert!(!options.iter().any(|&(c, is_via)| is_via && c.z == 0));
    }

    #[test]
    fn via_neighbor_allows_passing_over_the_owning_nets_own_trace() {
        let mut grid = DenseGrid::new(10, 10, 4, 1);
        let stack = LayerStack::preset_4layer();
        let vias = ViaRules::standard(4);
        let pos = GridCoord::new(3, 3, 3);
        let far_target = GridCoord::new(3, 3, 0);
        grid.add_wire(GridCoord::new(3, 3, 1), 1);

        let window = Window::new(&[pos, far_target], 2, 10, 10, 4);
        let astar = AStar::new();
        let options = astar.neighbors(pos, &window, &grid, &vias, &stack, 1);
        assert!(options.iter().any(|&(c, is_via)| is_via && c.z == 0));
    }
}
