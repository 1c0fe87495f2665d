//! Converts an A*-returned grid path into the `Route` output representation
//! (§4.3 "post-process per search"): back-walk is already done by the
//! search itself, so this only coalesces collinear runs into `Segment`s and
//! drops a `ViaInstance` at each layer change.
//!
//! Each two-terminal search in the multi-pin assembly produces its own path
//! that only touches the growing solution at one cell, so unlike the
//! teacher's `generate_segments_from_topology` (which merges many stubs
//! into one adjacency graph to find branch points), collinear-run detection
//! here only has to walk a single path.

use pcb_common::geom::coord::GridCoord;
use pcb_common::layers::ViaRules;
use pcb_common::route::{Segment, ViaInstance};

use crate::grid::GridConverter;

fn step_dir(a: GridCoord, b: GridCoord) -> (i32, i32) {
    ((b.x as i32 - a.x as i32).signum(), (b.y as i32 - a.y as i32).signum())
}

fn flush_run(
    segments: &mut Vec<Segment>,
    path: &[GridCoord],
    start: usize,
    end: usize,
    converter: &GridConverter,
    layer: u8,
    width: f64,
    net_id: u32,
) {
    if end <= start {
        return;
    }
    let p1 = converter.to_world(path[start]);
    let p2 = converter.to_world(path[end]);
    segments.push(Segment::new(p1.x, p1.y, p2.x, p2.y, width, layer, net_id));
}

/// Coalesces one A* path into segments plus layer-change vias.
pub fn path_to_fragments(
    path: &[GridCoord],
    converter: &GridConverter,
    via_rules: &ViaRules,
    net_id: u32,
    trace_width: f64,
) -> (Vec<Segment>, Vec<ViaInstance>) {
    let mut segments = Vec::new();
    let mut vias = Vec::new();
    if path.len() < 2 {
        return (segments, vias);
    }

    let mut run_start = 0usize;
    let mut run_dir = step_dir(path[0], path[1]);

    for i in 1..path.len() {
        let prev = path[i - 1];
        let curr = path[i];

        if curr.z != prev.z {
            flush_run(&mut segments, path, run_start, i - 1, converter, prev.z, trace_width, net_id);
            let world = converter.to_world(prev);
            let via_def = via_rules.best_via(prev.z, curr.z);
            let (drill, diameter) = via_def.map(|v| (v.drill, v.diameter())).unwrap_or((0.3, 0.6));
            vias.push(ViaInstance::new(world.x, world.y, drill, diameter, prev.z, curr.z, net_id));
            run_start = i;
            if i + 1 < path.len() {
                run_dir = step_dir(path[i], path[i + 1]);
            }
            continue;
        }

        let d = step_dir(prev, curr);
        if d != run_dir {
            flush_run(&mut segments, path, run_start, i - 1, converter, prev.z, trace_width, net_id);
            run_start = i - 1;
            run_dir = d;
        }
    }
    flush_run(&mut segments, path, run_start, path.len() - 1, converter, path.last().unwrap().z, trace_width, net_id);

    (segments, vias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::layers::ViaRules;

    #[test]
    fn straight_run_collapses_to_one_segment() {
        let converter = GridConverter::new(0.1, 100, 100);
        let path = vec![
            GridCoord::new(0, 0, 0),
            GridCoord::new(1, 0, 0),
            GridCoord::new(2, 0, 0),
            GridCoord::new(3, 0, 0),
        ];
        let via_rules = ViaRules::standard(2);
        let (segments, vias) = path_to_fragments(&path, &converter, &via_rules, 1, 0.25);
        assert_eq!(segments.len(), 1);
        assert!(vias.is_empty());
        assert_eq!(segments[0].x2, 0.3);
    }

    #[test]
    fn corner_splits_into_two_segments() {
        let converter = GridConverter::new(0.1, 100, 100);
        let path = vec![
            GridCoord::new(0, 0, 0),
            GridCoord::new(1, 0, 0),
            GridCoord::new(1, 1, 0),
            GridCoord::new(1, 2, 0),
        ];
        let via_rules = ViaRules::standard(2);
        let (segments, _) = path_to_fragments(&path, &converter, &via_rules, 1, 0.25);
        assert_eq!(segments.len(), 2);
    }

    #[test]
    fn layer_change_emits_via() {
        let converter = GridConverter::new(0.1, 100, 100);
        let path = vec![GridCoord::new(2, 2, 0), GridCoord::new(2, 2, 1), GridCoord::new(3, 2, 1)];
        let via_rules = ViaRules::standard(2);
        let (segments, vias) = path_to_fragments(&path, &converter, &via_rules, 1, 0.25);
        assert_eq!(vias.len(), 1);
        assert_eq!(segments.len(), 1);
        assert_eq!(vias[0].layer_from, 0);
        assert_eq!(vias[0].layer_to, 1);
    }
}
