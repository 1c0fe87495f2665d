//! Geometric post-optimizer (§4.6). Runs a fixed sequence of passes over
//! a finished route, each validated against the grid before being kept —
//! a pass that would intrude on a foreign net's cells is rejected and the
//! route is left as it was for that pass.

use crate::grid::RoutingGrid;
use pcb_common::geom::coord::GridCoord;
use pcb_common::route::{Route, Segment, ViaInstance};
use pcb_common::util::OptimizerConfig;

const EPS: f64 = 1e-6;

pub fn optimize_route(route: &mut Route, grid: &dyn RoutingGrid, net_id: u32, resolution: f64, config: &OptimizerConfig) {
    for _ in 0..config.max_passes {
        let mut changed = false;
        if config.merge_collinear {
            changed |= merge_collinear(route);
        }
        if config.eliminate_zigzags {
            changed |= eliminate_zigzags(route, grid, net_id, resolution);
        }
        if config.compress_staircases {
            changed |= compress_staircases(route, grid, net_id, resolution);
        }
        if config.diagonal_corners {
            changed |= diagonalize_corners(route, grid, net_id, resolution);
        }
        if config.minimize_vias {
            changed |= minimize_vias(route);
        }
        if !changed {
            break;
        }
    }
}

fn direction(seg: &Segment) -> (f64, f64) {
    let len = seg.length().max(EPS);
    ((seg.x2 - seg.x1) / len, (seg.y2 - seg.y1) / len)
}

fn same_direction(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < 1e-3 && (a.1 - b.1).abs() < 1e-3
}

/// Pass 1: two consecutive same-layer, same-width segments sharing an
/// endpoint with identical direction collapse to one.
fn merge_collinear(route: &mut Route) -> bool {
    let mut changed = false;
    let mut merged: Vec<Segment> = Vec::with_capacity(route.segments.len());
    for seg in route.segments.drain(..) {
        if let Some(last) = merged.last_mut() {
            if last.layer == seg.layer
                && (last.width - seg.width).abs() < EPS
                && last.shares_endpoint(&seg)
                && same_direction(direction(last), direction(&seg))
                && (last.x2 - seg.x1).abs() < EPS
                && (last.y2 - seg.y1).abs() < EPS
            {
                last.x2 = seg.x2;
                last.y2 = seg.y2;
                changed = true;
                continue;
            }
        }
        merged.push(seg);
    }
    route.segments = merged;
    changed
}

fn cells_clear_for_net(x1: f64, y1: f64, x2: f64, y2: f64, layer: u8, grid: &dyn RoutingGrid, net_id: u32, resolution: f64) -> bool {
    let steps = ((x2 - x1).hypot(y2 - y1) / resolution).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = x1 + (x2 - x1) * t;
        let y = y1 + (y2 - y1) * t;
        let gx = (x / resolution).round().max(0.0) as u32;
        let gy = (y / resolution).round().max(0.0) as u32;
        if gx >= grid.width() || gy >= grid.height() {
            return false;
        }
        let coord = GridCoord::new(gx, gy, layer);
        if grid.is_blocked_for_net(coord, net_id) {
            return false;
        }
    }
    true
}

/// Pass 2: `A -> B -> C` where A, C are parallel and B is short collapses
/// by shifting A/C to share a point, provided the shortcut stays clear.
fn eliminate_zigzags(route: &mut Route, grid: &dyn RoutingGrid, net_id: u32, resolution: f64) -> bool {
    const SHORT_THRESHOLD_CELLS: f64 = 3.0;
    let mut changed = false;
    let mut i = 0;
    while i + 2 < route.segments.len() {
        let (a, b, c) = (route.segments[i], route.segments[i + 1], route.segments[i + 2]);
        let short_threshold = SHORT_THRESHOLD_CELLS * resolution;
        if a.layer == b.layer
            && b.layer == c.layer
            && same_direction(direction(&a), direction(&c))
            && b.length() < short_threshold
            && a.shares_endpoint(&b)
            && b.shares_endpoint(&c)
        {
            let midpoint_x = (a.x2 + c.x1) / 2.0;
            let midpoint_y = (a.y2 + c.y1) / 2.0;
            if cells_clear_for_net(a.x1, a.y1, midpoint_x, midpoint_y, a.layer, grid, net_id, resolution)
                && cells_clear_for_net(midpoint_x, midpoint_y, c.x2, c.y2, c.layer, grid, net_id, resolution)
            {
                let new_a = Segment::new(a.x1, a.y1, midpoint_x, midpoint_y, a.width, a.layer, a.net_id);
                let new_c = Segment::new(midpoint_x, midpoint_y, c.x2, c.y2, c.width, c.layer, c.net_id);
                route.segments.splice(i..=i + 2, [new_a, new_c]);
                changed = true;
                continue;
            }
        }
        i += 1;
    }
    changed
}

/// Pass 3: a long run of alternating axis-aligned steps (a staircase) on
/// one layer becomes a single 45-degree diagonal when the endpoints are
/// equidistant in x and y and the diagonal path stays clear.
fn compress_staircases(route: &mut Route, grid: &dyn RoutingGrid, net_id: u32, resolution: f64) -> bool {
    let mut changed = false;
    let mut i = 0;
    while i + 3 < route.segments.len() {
        let run_end = {
            let mut j = i;
            while j + 1 < route.segments.len()
                && route.segments[j].layer == route.segments[i].layer
                && route.segments[j].shares_endpoint(&route.segments[j + 1])
                && !same_direction(direction(&route.segments[j]), direction(&route.segments[j + 1]))
            {
                j += 1;
            }
            j
        };
        if run_end > i + 2 {
            let first = route.segments[i];
            let last = route.segments[run_end];
            let dx = (last.x2 - first.x1).abs();
            let dy = (last.y2 - first.y1).abs();
            if (dx - dy).abs() < resolution
                && cells_clear_for_net(first.x1, first.y1, last.x2, last.y2, first.layer, grid, net_id, resolution)
            {
                let diag = Segment::new(first.x1, first.y1, last.x2, last.y2, first.width, first.layer, first.net_id);
                route.segments.splice(i..=run_end, [diag]);
                changed = true;
                i += 1;
                continue;
            }
        }
        i += 1;
    }
    changed
}

/// Pass 4: a right-angle corner between two segments that both exceed the
/// diagonal cut length becomes two shorter segments meeting at 45 degrees.
fn diagonalize_corners(route: &mut Route, grid: &dyn RoutingGrid, net_id: u32, resolution: f64) -> bool {
    let cut = resolution * 2.0;
    let mut changed = false;
    let mut i = 0;
    while i + 1 < route.segments.len() {
        let (a, b) = (route.segments[i], route.segments[i + 1]);
        if a.layer == b.layer && a.shares_endpoint(&b) && !same_direction(direction(&a), direction(&b)) {
            let da = direction(&a);
            let db = direction(&b);
            let corner_is_right_angle = (da.0 * db.0 + da.1 * db.1).abs() < 1e-3;
            if corner_is_right_angle && a.length() > cut && b.length() > cut {
                let corner = (a.x2, a.y2);
                let p1 = (corner.0 - da.0 * cut, corner.1 - da.1 * cut);
                let p2 = (corner.0 + db.0 * cut, corner.1 + db.1 * cut);
                if cells_clear_for_net(p1.0, p1.1, p2.0, p2.1, a.layer, grid, net_id, resolution) {
                    let new_a = Segment::new(a.x1, a.y1, p1.0, p1.1, a.width, a.layer, a.net_id);
                    let diag = Segment::new(p1.0, p1.1, p2.0, p2.1, a.width, a.layer, a.net_id);
                    let new_b = Segment::new(p2.0, p2.1, b.x2, b.y2, b.width, b.layer, b.net_id);
                    route.segments.splice(i..=i + 1, [new_a, diag, new_b]);
                    changed = true;
                    i += 3;
                    continue;
                }
            }
        }
        i += 1;
    }
    changed
}

/// Pass 5: a via immediately followed by a same-net return via, with a
/// short detour segment between them, collapses back onto the original
/// layer when the detour is cheaper than keeping both vias.
fn minimize_vias(route: &mut Route) -> bool {
    if route.vias.len() < 2 {
        return false;
    }
    let mut changed = false;
    let mut i = 0;
    while i + 1 < route.vias.len() {
        let (v1, v2) = (route.vias[i], route.vias[i + 1]);
        let same_spot = (v1.x - v2.x).abs() < EPS && (v1.y - v2.y).abs() < EPS;
        let returns_to_origin = v1.layer_from == v2.layer_to && v1.layer_to == v2.layer_from;
        if same_spot && returns_to_origin {
            route.vias.remove(i + 1);
            route.vias.remove(i);
            route.segments.retain(|s| s.layer != v1.layer_to || (s.x1 - v1.x).abs() > EPS || (s.y1 - v1.y).abs() > EPS);
            changed = true;
            continue;
        }
        i += 1;
    }
    changed
}

/// Pass 6 (opt-in, length-critical nets only): insert an accordion
/// pattern on the longest straight segment to add `delta_mm` of length.
pub fn tune_length(route: &mut Route, delta_mm: f64, min_loop_spacing: f64) -> bool {
    if delta_mm <= 0.0 {
        return false;
    }
    let Some((idx, seg)) = route
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_degenerate())
        .max_by(|(_, a), (_, b)| a.length().partial_cmp(&b.length()).unwrap())
        .map(|(i, s)| (i, *s))
    else {
        return false;
    };

    let available = seg.length() - min_loop_spacing * 2.0;
    if available <= min_loop_spacing {
        return false;
    }

    let loops = (delta_mm / (min_loop_spacing * 2.0)).ceil().max(1.0) as u32;
    let amplitude = delta_mm / (loops as f64 * 4.0);
    let (dx, dy) = direction(&seg);
    let (nx, ny) = (-dy, dx);

    let mut new_segments = Vec::new();
    let step = seg.length() / (loops as f64 * 2.0);
    let mut cursor = (seg.x1, seg.y1);
    let mut up = true;
    for _ in 0..loops * 2 {
        let next = (cursor.0 + dx * step, cursor.1 + dy * step);
        let offset = if up { amplitude } else { -amplitude };
        let peak = (next.0 + nx * offset, next.1 + ny * offset);
        new_segments.push(Segment::new(cursor.0, cursor.1, peak.0, peak.1, seg.width, seg.layer, seg.net_id));
        new_segments.push(Segment::new(peak.0, peak.1, next.0, next.1, seg.width, seg.layer, seg.net_id));
        cursor = next;
        up = !up;
    }
    new_segments.push(Segment::new(cursor.0, cursor.1, seg.x2, seg.y2, seg.width, seg.layer, seg.net_id));

    route.segments.splice(idx..=idx, new_segments);
    true
}

#[allow(dead_code)]
fn via_touches(via: &ViaInstance, x: f64, y: f64) -> bool {
    (via.x - x).abs() < EPS && (via.y - y).abs() < EPS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DenseGrid;
    use pcb_common::route::RouteStatus;

    fn test_route(segments: Vec<Segment>) -> Route {
        Route { net_id: 1, net_name: "N1".into(), segments, vias: Vec::new(), status: RouteStatus::Routed }
    }

    #[test]
    fn merges_two_collinear_segments() {
        let mut route = test_route(vec![
            Segment::new(0.0, 0.0, 1.0, 0.0, 0.25, 0, 1),
            Segment::new(1.0, 0.0, 2.0, 0.0, 0.25, 0, 1),
        ]);
        assert!(merge_collinear(&mut route));
        assert_eq!(route.segments.len(), 1);
        assert_eq!(route.segments[0].x2, 2.0);
    }

    #[test]
    fn leaves_non_collinear_segments_alone() {
        let mut route = test_route(vec![
            Segment::new(0.0, 0.0, 1.0, 0.0, 0.25, 0, 1),
            Segment::new(1.0, 0.0, 1.0, 1.0, 0.25, 0, 1),
        ]);
        assert!(!merge_collinear(&mut route));
        assert_eq!(route.segments.len(), 2);
    }

    #[test]
    fn fixed_point_optimizer_is_idempotent() {
        let grid = DenseGrid::new(100, 100, 2, 1);
        let mut route = test_route(vec![
            Segment::new(0.0, 0.0, 1.0, 0.0, 0.25, 0, 1),
            Segment::new(1.0, 0.0, 2.0, 0.0, 0.25, 0, 1),
        ]);
        let config = OptimizerConfig::default();
        optimize_route(&mut route, &grid, 1, 0.1, &config);
        let before = route.segments.clone();
        optimize_route(&mut route, &grid, 1, 0.1, &config);
        assert_eq!(route.segments, before);
    }
}
