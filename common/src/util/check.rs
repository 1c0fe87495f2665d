//! Independent post-hoc verification of a finished route set — the
//! testable-properties checks from spec §8, kept separate from the
//! router so a caller can audit a `RouterResult` without trusting the
//! router's own bookkeeping.

use crate::board::BoardModel;
use crate::route::{Route, RouteStatus, RouterResult};
use std::collections::{HashMap, HashSet};

const TOLERANCE: f64 = 0.005;

/// §8 invariant 4: every route marked `Routed` must be a single connected
/// graph covering every pad of its net.
pub fn check_connectivity(board: &BoardModel, result: &RouterResult) -> Result<(), String> {
    let mut errors = Vec::new();

    for route in &result.routes {
        if route.status != RouteStatus::Routed {
            continue;
        }
        let pads = board.pads_for_net(route.net_id);
        if pads.len() <= 1 {
            continue;
        }
        if !is_connected(route, pads.len()) {
            errors.push(format!(
                "net '{}' is marked routed but its segment/via graph is not connected",
                route.net_name
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn is_connected(route: &Route, pad_count: usize) -> bool {
    // Union-find over quantized endpoints (segments + vias) to check the
    // whole route forms one component touching at least `pad_count`
    // distinct anchor points worth of structure.
    let mut parent: HashMap<(i64, i64, u8), (i64, i64, u8)> = HashMap::new();
    let key = |x: f64, y: f64, layer: u8| {
        (
            (x * 10_000.0).round() as i64,
            (y * 10_000.0).round() as i64,
            layer,
        )
    };

    fn find(parent: &mut HashMap<(i64, i64, u8), (i64, i64, u8)>, k: (i64, i64, u8)) -> (i64, i64, u8) {
        let p = *parent.entry(k).or_insert(k);
        if p == k {
            k
        } else {
            let root = find(parent, p);
            parent.insert(k, root);
            root
        }
    }

    fn union(parent: &mut HashMap<(i64, i64, u8), (i64, i64, u8)>, a: (i64, i64, u8), b: (i64, i64, u8)) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent.insert(ra, rb);
        }
    }

    if route.segments.is_empty() && route.vias.is_empty() {
        return pad_count == 0;
    }

    for seg in &route.segments {
        let a = key(seg.x1, seg.y1, seg.layer);
        let b = key(seg.x2, seg.y2, seg.layer);
        union(&mut parent, a, b);
    }
    for via in &route.vias {
        let a = key(via.x, via.y, via.layer_from);
        let b = key(via.x, via.y, via.layer_to);
        union(&mut parent, a, b);
    }

    let roots: HashSet<_> = parent.keys().map(|k| find(&mut parent.clone(), *k)).collect();
    roots.len() == 1
}

/// §8 invariant 5: no two routes may share a cell unless both are
/// `Partial`. Approximated geometrically here via segment bounding-box
/// overlap on the same layer within clearance tolerance.
pub fn check_no_illegal_overlap(result: &RouterResult) -> Result<(), String> {
    let mut by_layer: HashMap<u8, Vec<(&Route, usize)>> = HashMap::new();
    for route in &result.routes {
        for (i, seg) in route.segments.iter().enumerate() {
            by_layer.entry(seg.layer).or_default().push((route, i));
        }
    }

    let mut errors = Vec::new();
    for (_, segs) in by_layer {
        for i in 0..segs.len() {
            for j in (i + 1)..segs.len() {
                let (ra, ia) = segs[i];
                let (rb, ib) = segs[j];
                if ra.net_id == rb.net_id {
                    continue;
                }
                if ra.status == RouteStatus::Partial && rb.status == RouteStatus::Partial {
                    continue;
                }
                let a = ra.segments[ia];
                let b = rb.segments[ib];
                let min_ax = a.x1.min(a.x2) - TOLERANCE;
                let max_ax = a.x1.max(a.x2) + TOLERANCE;
                let min_ay = a.y1.min(a.y2) - TOLERANCE;
                let max_ay = a.y1.max(a.y2) + TOLERANCE;
                let min_bx = b.x1.min(b.x2);
                let max_bx = b.x1.max(b.x2);
                let min_by = b.y1.min(b.y2);
                let max_by = b.y1.max(b.y2);
                if min_ax <= max_bx && max_ax >= min_bx && min_ay <= max_by && max_ay >= min_by {
                    errors.push(format!(
                        "nets '{}' and '{}' have overlapping fully-routed segments on layer {}",
                        ra.net_name, rb.net_name, a.layer
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

pub fn run(board: &BoardModel, result: &RouterResult) -> Result<(), String> {
    log::info!("Starting route verification (connectivity + overlap)");
    let connectivity = check_connectivity(board, result);
    let overlap = check_no_illegal_overlap(result);

    match (&connectivity, &overlap) {
        (Ok(_), Ok(_)) => {
            log::info!("PASS: all routed nets connected, no illegal overlaps.");
            Ok(())
        }
        _ => {
            let mut msgs = Vec::new();
            if let Err(e) = connectivity {
                log::error!("FAIL: connectivity check: {e}");
                msgs.push(e);
            }
            if let Err(e) = overlap {
                log::error!("FAIL: overlap check: {e}");
                msgs.push(e);
            }
            Err(msgs.join("; "))
        }
    }
}
