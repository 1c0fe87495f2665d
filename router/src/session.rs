//! Negotiated-congestion driver (§4.4): orders nets, assembles each net's
//! multi-pin solution with repeated two-terminal A* searches (§4.3), rips
//! up nets that land on a shared cell, and escalates penalty pressure
//! across iterations until the board is clean or the iteration cap hits.
//!
//! Grounded in the teacher's `detailed_router::run` outer loop (order nets,
//! batch-route, detect conflicts, update history, rip up, escalate
//! penalty, stagnation detection), generalized to the net-ownership grid
//! and the spec's exact net-ordering and ripup rules.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use pcb_common::board::{BoardModel, Net, Pad};
use pcb_common::error::{NetError, NetErrorKind, SearchError};
use pcb_common::geom::coord::GridCoord;
use pcb_common::geom::{Point, Rect};
use pcb_common::route::{Route, RouteStatus, RouterResult, Segment, Violation};
use pcb_common::rules::effective_rules;
use pcb_common::util::{CancellationToken, RouterConfig};

use crate::astar::AStar;
use crate::grid::{DenseGrid, GridConverter, RoutingGrid};
use crate::heuristic::Heuristic;
use crate::optimize;
use crate::strategy::{self, StrategyContext, StrategyKind};
use crate::subgrid::SubGridRouter;
use crate::topology::path_to_fragments;

fn map_search_err(e: SearchError) -> NetErrorKind {
    match e {
        SearchError::Unreachable | SearchError::BlockedByForeignNet => NetErrorKind::NetBlocked,
        SearchError::ExceededNodeBudget => NetErrorKind::NodeBudgetExceeded,
    }
}

fn heuristic_for(kind: StrategyKind) -> Heuristic {
    match kind {
        StrategyKind::HierarchicalDiffPair => Heuristic::DirectionBias,
        StrategyKind::SubgridAdaptive => Heuristic::Greedy,
        StrategyKind::ViaConflictResolution => Heuristic::WeightedCongestion,
        StrategyKind::EscapeThenGlobal => Heuristic::Greedy,
        StrategyKind::GlobalWithRepair => Heuristic::Congestion,
    }
}

struct CommittedNet {
    route: Route,
    cells: HashSet<GridCoord>,
    halo_cells: HashSet<GridCoord>,
}

pub struct RoutingSession<'a> {
    board: &'a BoardModel,
    config: &'a RouterConfig,
    converter: GridConverter,
    grid: DenseGrid,
    astar: AStar,
    current_penalty: f64,
}

impl<'a> RoutingSession<'a> {
    pub fn new(board: &'a BoardModel, config: &'a RouterConfig) -> Self {
        let resolution = board.rules.grid_resolution;
        let bounds = board.bounds();
        let width = ((bounds.width() / resolution).ceil() as u32 + 4).max(4);
        let height = ((bounds.height() / resolution).ceil() as u32 + 4).max(4);
        let layers = board.layer_stack.len().max(1) as u8;
        let converter = GridConverter::new(resolution, width, height);
        let grid = DenseGrid::new(width, height, layers, 1);
        Self {
            board,
            config,
            converter,
            grid,
            astar: AStar::new(),
            current_penalty: config.initial_penalty,
        }
    }

    /// Rasterizes a world-space rect into the grid cells it overlaps on
    /// one layer, by scanning its (clamped) bounding box.
    fn rasterize(&self, rect: &Rect, layer: u8) -> Vec<GridCoord> {
        let min = self.converter.to_grid(rect.min, layer);
        let max = self.converter.to_grid(rect.max, layer);
        let mut cells = Vec::with_capacity(((max.x - min.x + 1) * (max.y - min.y + 1)) as usize);
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                cells.push(GridCoord::new(x, y, layer));
            }
        }
        cells
    }

    fn net_clearance(&self, net: &Net) -> f64 {
        let class = self.board.net_classes.classify(net.class.as_deref());
        effective_rules(&self.board.rules, class).clearance
    }

    /// §4.2: every foreign pad's body, not just its center cell, is a
    /// permanent obstruction inflated by `clearance + trace_width / 2`.
    fn stamp_anchors(&mut self) {
        for pad in self.board.all_pads() {
            let net = self.board.nets.iter().find(|n| n.net_id == pad.net_id);
            let class = self.board.net_classes.classify(net.and_then(|n| n.class.as_deref()));
            let eff = effective_rules(&self.board.rules, class);
            let margin = eff.clearance + eff.trace_width / 2.0;
            let rect = pad.footprint().inflate(margin);
            for &layer in &pad.layers {
                for coord in self.rasterize(&rect, layer) {
                    self.grid.claim_anchor(coord, pad.net_id);
                }
            }
        }
    }

    /// §4.2: the swept region of one committed segment, inflated by half
    /// its own width plus the net's clearance — the halo a foreign net
    /// may never route or via through.
    fn segment_halo_cells(&self, seg: &Segment, clearance: f64) -> Vec<GridCoord> {
        let min = Point::new(seg.x1.min(seg.x2), seg.y1.min(seg.y2));
        let max = Point::new(seg.x1.max(seg.x2), seg.y1.max(seg.y2));
        let rect = Rect::new(min, max).inflate(seg.width / 2.0 + clearance);
        self.rasterize(&rect, seg.layer)
    }

    fn pin_coords(&self, pad: &Pad, overrides: &HashMap<(String, String), GridCoord>) -> Vec<GridCoord> {
        let key = (pad.component_ref.clone(), pad.pin.clone());
        if let Some(&coord) = overrides.get(&key) {
            return vec![coord];
        }
        pad.layers.iter().map(|&l| self.converter.to_grid(pad.position(), l)).collect()
    }

    fn net_bbox(&self, net: &Net) -> Rect {
        let pads = self.board.pads_for_net(net.net_id);
        if pads.is_empty() {
            return Rect::default();
        }
        let mut min = pads[0].position();
        let mut max = pads[0].position();
        for pad in &pads {
            let p = pad.position();
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::new(min, max)
    }

    /// §4.4.1 ordering: class priority ascending, pad count descending,
    /// bbox area descending, net-id tie-break.
    fn ordered_nets(&self) -> Vec<&'a Net> {
        let mut nets: Vec<&Net> = self.board.routable_nets().collect();
        nets.sort_by(|a, b| {
            let pa = self.board.net_classes.classify(a.class.as_deref()).priority;
            let pb = self.board.net_classes.classify(b.class.as_deref()).priority;
            let ca = self.board.pads_for_net(a.net_id).len();
            let cb = self.board.pads_for_net(b.net_id).len();
            let aa = self.net_bbox(a).area();
            let ab = self.net_bbox(b).area();
            pa.cmp(&pb)
                .then_with(|| cb.cmp(&ca))
                .then_with(|| ab.partial_cmp(&aa).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.net_id.cmp(&b.net_id))
        });
        nets
    }

    /// §4.5: runs ahead of the main pass, escaping pads whose centers
    /// don't land on the coarse grid so the main A* pass can reach them.
    fn run_subgrid_escape(&mut self, result: &mut RouterResult) -> (HashMap<(String, String), GridCoord>, HashMap<u32, Vec<Segment>>) {
        let resolution = self.board.rules.grid_resolution;
        let router = SubGridRouter::new(resolution, self.board.rules.min_trace_width, self.board.rules.neck_down_threshold);
        let all_pads: Vec<&Pad> = self.board.all_pads().collect();
        let analysis = router.analyze_pads(&all_pads);
        if !analysis.has_off_grid_pads() {
            return (HashMap::new(), HashMap::new());
        }
        log::info!("{}", analysis.format_summary());

        let escape_result = router.generate_escape_segments(&analysis, &mut self.grid);
        let mut overrides = HashMap::new();
        let mut fragments: HashMap<u32, Vec<Segment>> = HashMap::new();
        for escape in &escape_result.escapes {
            let key = (escape.component_ref.clone(), escape.pin.clone());
            let coord = self.converter.to_grid(escape.landing_cell, escape.segment.layer);
            overrides.insert(key, coord);
            fragments.entry(escape.net_id).or_default().push(escape.segment);
        }
        for (component_ref, pin) in &escape_result.failures {
            let net_id = self.board.pad_lookup(component_ref, pin).map(|p| p.net_id).unwrap_or(0);
            result.errors.push(NetError {
                net_id,
                net_name: format!("{component_ref}:{pin}"),
                kind: NetErrorKind::PadInescapable,
            });
        }
        (overrides, fragments)
    }

    fn strategy_context(&self, net: &Net, any_pad_off_grid: bool) -> StrategyContext {
        StrategyContext {
            any_pad_off_grid,
            via_conflict_count: self.grid.total_conflicts() as u32,
            via_conflict_threshold: 8,
            starts_in_dense_courtyard: self.board.pads_for_net(net.net_id).len() > 6,
        }
    }

    /// §4.3: assembles one net's multi-pin solution as a chain of
    /// two-terminal A* searches, growing a virtual source set.
    fn route_net(
        &mut self,
        net: &Net,
        overrides: &HashMap<(String, String), GridCoord>,
        off_grid: bool,
        cancel: &CancellationToken,
    ) -> Result<(Route, HashSet<GridCoord>), NetErrorKind> {
        let pads = self.board.pads_for_net(net.net_id);
        if pads.len() < 2 {
            return Ok((Route::empty(net.net_id, net.name.clone(), RouteStatus::Routed), HashSet::new()));
        }

        let class = self.board.net_classes.classify(net.class.as_deref());
        let mut eff = effective_rules(&self.board.rules, class);
        let ctx = self.strategy_context(net, off_grid);
        let kind = self
            .config
            .strategy_overrides
            .get(&net.name)
            .and_then(|name| StrategyKind::from_name(name))
            .unwrap_or_else(|| strategy::select(self.board, net, &ctx));
        if matches!(kind, StrategyKind::ViaConflictResolution) {
            eff.cost_via *= 2.0;
        }
        let heuristic = heuristic_for(kind);

        let mut best = (0usize, 1usize, f64::MIN);
        for i in 0..pads.len() {
            for j in (i + 1)..pads.len() {
                let d = pads[i].position().manhattan(&pads[j].position());
                if d > best.2 {
                    best = (i, j, d);
                }
            }
        }
        let (ia, ib, _) = best;

        let mut segments = Vec::new();
        let mut vias = Vec::new();
        let mut all_cells: Vec<GridCoord> = Vec::new();

        let starts = self.pin_coords(pads[ia], overrides);
        let targets = self.pin_coords(pads[ib], overrides);
        let path = self
            .astar
            .find_path(&self.grid, &self.board.via_rules, &self.board.layer_stack, &eff, &starts, &targets, net.net_id, heuristic, &[], self.config.node_budget, Some(cancel))
            .map_err(map_search_err)?;
        let (segs, vs) = path_to_fragments(&path, &self.converter, &self.board.via_rules, net.net_id, eff.trace_width);
        segments.extend(segs);
        vias.extend(vs);
        all_cells.extend(path);

        for (k, &pad) in pads.iter().enumerate() {
            if k == ia || k == ib {
                continue;
            }
            if cancel.is_cancelled() {
                return Err(NetErrorKind::NodeBudgetExceeded);
            }
            let starts = self.pin_coords(pad, overrides);
            let targets: Vec<GridCoord> = all_cells.iter().copied().collect::<HashSet<_>>().into_iter().collect();
            let path = self
                .astar
                .find_path(&self.grid, &self.board.via_rules, &self.board.layer_stack, &eff, &starts, &targets, net.net_id, heuristic, &[], self.config.node_budget, Some(cancel))
                .map_err(map_search_err)?;
            let (segs, vs) = path_to_fragments(&path, &self.converter, &self.board.via_rules, net.net_id, eff.trace_width);
            segments.extend(segs);
            vias.extend(vs);
            all_cells.extend(path);
        }

        let mut route = Route::empty(net.net_id, net.name.clone(), RouteStatus::Routed);
        route.segments = segments;
        route.vias = vias;
        let cells: HashSet<GridCoord> = all_cells.into_iter().collect();
        Ok((route, cells))
    }

    fn commit(&mut self, net_id: u32, cells: &HashSet<GridCoord>, halo_cells: &HashSet<GridCoord>) {
        for &c in cells {
            self.grid.add_wire(c, net_id);
        }
        for &c in halo_cells {
            if !cells.contains(&c) {
                self.grid.claim_clearance(c, net_id);
            }
        }
    }

    fn uncommit(&mut self, cells: &HashSet<GridCoord>, halo_cells: &HashSet<GridCoord>) {
        for &c in cells {
            self.grid.remove_wire(c);
        }
        for &c in halo_cells {
            if !cells.contains(&c) {
                self.grid.release_clearance(c);
            }
        }
    }

    pub fn run(mut self, cancel: CancellationToken) -> RouterResult {
        let start_time = Instant::now();
        let mut result = RouterResult::default();
        self.stamp_anchors();

        let (overrides, escape_fragments) = self.run_subgrid_escape(&mut result);
        let off_grid = !overrides.is_empty();

        let ordered = self.ordered_nets();
        let mut committed: HashMap<u32, CommittedNet> = HashMap::new();
        let mut permanently_failed: HashSet<u32> = HashSet::new();
        let mut iterations_run = 0usize;

        'outer: for iteration in 1..=self.config.max_iterations {
            iterations_run = iteration;
            for &net in &ordered {
                if cancel.is_cancelled() {
                    break 'outer;
                }
                if committed.contains_key(&net.net_id) || permanently_failed.contains(&net.net_id) {
                    continue;
                }
                match self.route_net(net, &overrides, off_grid, &cancel) {
                    Ok((route, cells)) => {
                        let clearance = self.net_clearance(net);
                        let halo_cells: HashSet<GridCoord> =
                            route.segments.iter().flat_map(|seg| self.segment_halo_cells(seg, clearance)).collect();
                        self.commit(net.net_id, &cells, &halo_cells);
                        committed.insert(net.net_id, CommittedNet { route, cells, halo_cells });
                    }
                    Err(kind) => {
                        if !kind.is_retryable() {
                            permanently_failed.insert(net.net_id);
                        }
                        result.errors.push(NetError { net_id: net.net_id, net_name: net.name.clone(), kind });
                    }
                }
            }

            if cancel.is_cancelled() {
                break;
            }

            let violations = self.grid.total_conflicts();
            log::info!("iteration {iteration}: {violations} violated cells, {} nets committed", committed.len());
            if violations == 0 {
                break;
            }

            self.grid.update_history(self.board.rules.history_weight);

            let violators: Vec<u32> = committed
                .iter()
                .filter(|(_, c)| c.cells.iter().any(|&cell| self.grid.is_congested(cell)))
                .map(|(&id, _)| id)
                .collect();
            for net_id in violators {
                if let Some(c) = committed.remove(&net_id) {
                    self.uncommit(&c.cells, &c.halo_cells);
                }
            }

            self.current_penalty *= self.config.penalty_multiplier;
            self.grid.set_penalty(self.current_penalty);
        }

        // report every still-congested cell and the nets contending for it,
        // computed while `committed` still holds every net's cells.
        for coord in self.grid.congested_cells() {
            let net_ids: Vec<u32> = committed.iter().filter(|(_, c)| c.cells.contains(&coord)).map(|(&id, _)| id).collect();
            result.violations.push(Violation { grid_x: coord.x, grid_y: coord.y, layer: coord.z, net_ids });
        }

        for net in &ordered {
            if !committed.contains_key(&net.net_id) && !permanently_failed.contains(&net.net_id) {
                permanently_failed.insert(net.net_id);
            }
        }

        for net in self.board.nets.iter() {
            let pad_count = self.board.pads_for_net(net.net_id).len();
            if pad_count < 2 {
                result.routes.push(Route::empty(net.net_id, net.name.clone(), RouteStatus::Routed));
                continue;
            }
            match committed.remove(&net.net_id) {
                Some(mut c) => {
                    if let Some(extra) = escape_fragments.get(&net.net_id) {
                        c.route.segments.splice(0..0, extra.iter().copied());
                    }
                    optimize::optimize_route(&mut c.route, &self.grid, net.net_id, self.board.rules.grid_resolution, &self.config.optimizer);
                    result.routes.push(c.route);
                }
                None => {
                    result.routes.push(Route::empty(net.net_id, net.name.clone(), RouteStatus::Unrouted));
                }
            }
        }

        result.recompute_stats(iterations_run, start_time.elapsed().as_millis());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::board::{Component, NetConnection};
    use pcb_common::geom::Point;
    use pcb_common::layers::{LayerStack, ViaRules};
    use pcb_common::rules::{DesignRules, NetClassMap};

    fn pad(x: f64, y: f64, component_ref: &str, pin: &str, net_id: u32, net_name: &str) -> Pad {
        Pad {
            x,
            y,
            width: 0.3,
            height: 0.3,
            layers: vec![0],
            net_id,
            net_name: net_name.to_string(),
            component_ref: component_ref.to_string(),
            pin: pin.to_string(),
            through_hole: false,
            drill: 0.0,
        }
    }

    fn two_pin_board() -> BoardModel {
        let pad_a = pad(1.0, 1.0, "R1", "1", 1, "NET1");
        let pad_b = pad(3.0, 1.0, "R1", "2", 1, "NET1");
        BoardModel {
            outline: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            components: vec![Component { reference: "R1".into(), rotation: 0.0, layer: 0, pads: vec![pad_a, pad_b] }],
            nets: vec![Net {
                net_id: 1,
                name: "NET1".into(),
                class: None,
                connections: vec![
                    NetConnection { component_ref: "R1".into(), pad_pin: "1".into() },
                    NetConnection { component_ref: "R1".into(), pad_pin: "2".into() },
                ],
            }],
            rules: DesignRules::default(),
            layer_stack: LayerStack::preset_2layer(),
            via_rules: ViaRules::standard(2),
            net_classes: NetClassMap::default(),
        }
    }

    #[test]
    fn simple_two_pin_net_routes_successfully() {
        let board = two_pin_board();
        let config = RouterConfig::default();
        let session = RoutingSession::new(&board, &config);
        let result = session.run(CancellationToken::new());
        assert!(result.is_fully_routed());
        assert_eq!(result.routes.len(), 1);
        assert!(!result.routes[0].segments.is_empty());
    }

    #[test]
    fn net_ordering_prefers_higher_priority_class_first() {
        let mut board = two_pin_board();
        board.nets.push(Net {
            net_id: 2,
            name: "NET2".into(),
            class: Some("Power".into()),
            connections: vec![],
        });
        board.components.push(Component {
            reference: "R2".into(),
            rotation: 0.0,
            layer: 0,
            pads: vec![pad(5.0, 5.0, "R2", "1", 2, "NET2"), pad(7.0, 5.0, "R2", "2", 2, "NET2")],
        });
        let config = RouterConfig::default();
        let session = RoutingSession::new(&board, &config);
        let ordered = session.ordered_nets();
        assert_eq!(ordered[0].net_id, 2);
    }

    #[test]
    fn strategy_override_still_routes_the_net() {
        let board = two_pin_board();
        let mut config = RouterConfig::default();
        config.strategy_overrides.insert("NET1".to_string(), "via_conflict".to_string());
        let session = RoutingSession::new(&board, &config);
        let result = session.run(CancellationToken::new());
        assert!(result.is_fully_routed());
    }

    #[test]
    fn stamp_anchors_blocks_the_full_clearance_halo_not_just_the_pad_center() {
        let board = two_pin_board();
        let config = RouterConfig::default();
        let mut session = RoutingSession::new(&board, &config);
        session.stamp_anchors();
        let coord = session.converter.to_grid(Point::new(0.6, 1.0), 0);
        assert!(session.grid.is_blocked_for_net(coord, 99));
        assert!(!session.grid.is_blocked_for_net(coord, 1));
    }

    #[test]
    fn commit_blocks_the_route_halo_for_foreign_nets_but_not_the_owner() {
        let board = two_pin_board();
        let config = RouterConfig::default();
        let mut session = RoutingSession::new(&board, &config);
        let seg = Segment::new(1.0, 1.0, 2.0, 1.0, 0.25, 0, 1);
        let halo: HashSet<GridCoord> = session.segment_halo_cells(&seg, 0.2).into_iter().collect();
        session.commit(1, &HashSet::new(), &halo);
        let adjacent = session.converter.to_grid(Point::new(1.5, 1.15), 0);
        assert!(session.grid.is_blocked_for_net(adjacent, 2));
        assert!(!session.grid.is_blocked_for_net(adjacent, 1));
    }

    #[test]
    fn uncommit_releases_the_halo_so_foreign_nets_can_use_it_again() {
        let board = two_pin_board();
        let config = RouterConfig::default();
        let mut session = RoutingSession::new(&board, &config);
        let seg = Segment::new(1.0, 1.0, 2.0, 1.0, 0.25, 0, 1);
        let halo: HashSet<GridCoord> = session.segment_halo_cells(&seg, 0.2).into_iter().collect();
        session.commit(1, &HashSet::new(), &halo);
        session.uncommit(&HashSet::new(), &halo);
        let adjacent = session.converter.to_grid(Point::new(1.5, 1.15), 0);
        assert!(!session.grid.is_blocked_for_net(adjacent, 2));
    }
}
