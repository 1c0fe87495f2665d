//! Sub-grid pad escape router (§4.5). Runs ahead of the main A* pass for
//! components whose pad centers don't fall on the coarse grid — typical
//! of fine-pitch ICs at 0.5 mm/0.65 mm pitch routed on a 0.1 mm grid.

use crate::grid::{GridConverter, RoutingGrid};
use pcb_common::board::Pad;
use pcb_common::geom::Point;
use pcb_common::route::Segment;
use std::collections::HashMap;

const DEFAULT_GRID_TOLERANCE: f64 = 0.025;

pub struct SubGridPad<'a> {
    pub pad: &'a Pad,
    pub offset: (f64, f64),
    pub escape_direction: (f64, f64),
}

pub struct SubGridAnalysis<'a> {
    pub total_pads: usize,
    pub off_grid_pads: Vec<SubGridPad<'a>>,
    pub on_grid_pads: Vec<&'a Pad>,
    pub component_centers: HashMap<String, (f64, f64)>,
}

impl<'a> SubGridAnalysis<'a> {
    pub fn has_off_grid_pads(&self) -> bool {
        !self.off_grid_pads.is_empty()
    }

    pub fn off_grid_count(&self) -> usize {
        self.off_grid_pads.len()
    }

    pub fn off_grid_percentage(&self) -> f64 {
        if self.total_pads == 0 {
            0.0
        } else {
            self.off_grid_pads.len() as f64 / self.total_pads as f64 * 100.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "{}/{} pads off-grid ({:.1}%) across {} components",
            self.off_grid_count(),
            self.total_pads,
            self.off_grid_percentage(),
            self.component_centers.len(),
        )
    }
}

pub struct SubGridEscape {
    pub component_ref: String,
    pub pin: String,
    pub net_id: u32,
    pub segment: Segment,
    pub landing_cell: Point<f64>,
}

#[derive(Default)]
pub struct SubGridResult {
    pub escapes: Vec<SubGridEscape>,
    pub failures: Vec<(String, String)>,
}

impl SubGridResult {
    pub fn success_count(&self) -> usize {
        self.escapes.len()
    }
}

pub struct SubGridRouter {
    resolution: f64,
    grid_tolerance: f64,
    neck_down_width: f64,
    neck_down_threshold: f64,
}

impl SubGridRouter {
    pub fn new(resolution: f64, neck_down_width: f64, neck_down_threshold: f64) -> Self {
        Self { resolution, grid_tolerance: DEFAULT_GRID_TOLERANCE, neck_down_width, neck_down_threshold }
    }

    pub fn with_tolerance(mut self, grid_tolerance: f64) -> Self {
        self.grid_tolerance = grid_tolerance;
        self
    }

    /// §4.5 detection: a pad is off-grid when its offset from the nearest
    /// grid-aligned point on either axis exceeds `grid_tolerance`.
    pub fn analyze_pads<'a>(&self, pads: &[&'a Pad]) -> SubGridAnalysis<'a> {
        let mut component_sums: HashMap<String, (f64, f64, usize)> = HashMap::new();
        for pad in pads {
            let entry = component_sums.entry(pad.component_ref.clone()).or_insert((0.0, 0.0, 0));
            entry.0 += pad.x;
            entry.1 += pad.y;
            entry.2 += 1;
        }
        let component_centers: HashMap<String, (f64, f64)> = component_sums
            .into_iter()
            .map(|(k, (sx, sy, n))| (k, (sx / n as f64, sy / n as f64)))
            .collect();

        let mut off_grid_pads = Vec::new();
        let mut on_grid_pads = Vec::new();
        for &pad in pads {
            let snapped_x = (pad.x / self.resolution).round() * self.resolution;
            let snapped_y = (pad.y / self.resolution).round() * self.resolution;
            let offset = ((pad.x - snapped_x).abs(), (pad.y - snapped_y).abs());
            if offset.0.max(offset.1) > self.grid_tolerance {
                let center = component_centers.get(&pad.component_ref).copied().unwrap_or((pad.x, pad.y));
                let dx = pad.x - center.0;
                let dy = pad.y - center.1;
                let mag = dx.hypot(dy).max(1e-9);
                off_grid_pads.push(SubGridPad { pad, offset, escape_direction: (dx / mag, dy / mag) });
            } else {
                on_grid_pads.push(pad);
            }
        }

        SubGridAnalysis { total_pads: pads.len(), off_grid_pads, on_grid_pads, component_centers }
    }

    /// §4.5 escape generation: for every off-grid pad, emit a short
    /// segment to the nearest grid-aligned cell in the outward direction
    /// and unblock the landing cell so the main pass can reach it.
    pub fn generate_escape_segments(&self, analysis: &SubGridAnalysis, grid: &mut dyn RoutingGrid) -> SubGridResult {
        let converter = GridConverter::new(self.resolution, grid.width(), grid.height());
        let mut result = SubGridResult::default();

        for sgp in &analysis.off_grid_pads {
            let pad = sgp.pad;
            let (dx, dy) = sgp.escape_direction;
            let target_x = pad.x + dx.signum() * self.resolution;
            let target_y = pad.y + dy.signum() * self.resolution;
            let landing = Point::new(
                (target_x / self.resolution).round() * self.resolution,
                (target_y / self.resolution).round() * self.resolution,
            );
            let landing_cell = converter.to_grid(landing, pad.layers.first().copied().unwrap_or(0));

            if grid.is_obstacle(landing_cell) {
                result.failures.push((pad.component_ref.clone(), pad.pin.clone()));
                continue;
            }

            let width = if pad.pitch_hint() < self.neck_down_threshold { self.neck_down_width } else { 0.25 };
            let segment = Segment::new(
                pad.x,
                pad.y,
                landing.x,
                landing.y,
                width,
                pad.layers.first().copied().unwrap_or(0),
                pad.net_id,
            );

            grid.claim_anchor(landing_cell, pad.net_id);
            result.escapes.push(SubGridEscape {
                component_ref: pad.component_ref.clone(),
                pin: pad.pin.clone(),
                net_id: pad.net_id,
                segment,
                landing_cell: landing,
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DenseGrid;

    fn pad(x: f64, y: f64, component_ref: &str, pin: &str, net_id: u32) -> Pad {
        Pad {
            x,
            y,
            width: 0.3,
            height: 0.3,
            layers: vec![0],
            net_id,
            net_name: format!("N{net_id}"),
            component_ref: component_ref.to_string(),
            pin: pin.to_string(),
            through_hole: false,
            drill: 0.0,
        }
    }

    #[test]
    fn on_grid_pads_are_not_flagged() {
        let router = SubGridRouter::new(0.1, 0.15, 0.5);
        let p1 = pad(1.0, 1.0, "U1", "1", 1);
        let p2 = pad(1.1, 1.0, "U1", "2", 2);
        let analysis = router.analyze_pads(&[&p1, &p2]);
        assert!(!analysis.has_off_grid_pads());
    }

    #[test]
    fn fine_pitch_pads_are_flagged_off_grid() {
        let router = SubGridRouter::new(0.1, 0.15, 0.5);
        let p1 = pad(1.0, 1.0, "U1", "1", 1);
        let p2 = pad(1.65, 1.0, "U1", "2", 2);
        let analysis = router.analyze_pads(&[&p1, &p2]);
        assert_eq!(analysis.off_grid_count(), 1);
    }

    #[test]
    fn escape_segments_land_on_unblocked_cells() {
        let router = SubGridRouter::new(0.1, 0.15, 0.5);
        let p1 = pad(1.0, 1.0, "U1", "1", 1);
        let p2 = pad(1.65, 1.0, "U1", "2", 2);
        let analysis = router.analyze_pads(&[&p1, &p2]);
        let mut grid = DenseGrid::new(400, 400, 2, 1);
        let result = router.generate_escape_segments(&analysis, &mut grid);
        assert_eq!(result.success_count(), 1);
    }
}
