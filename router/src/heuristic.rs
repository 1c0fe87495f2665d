//! Pluggable A* heuristics (§4.3). Each variant is a pure function of
//! `(current, predecessor direction, context)` — no dynamic dispatch, just
//! a small tagged enum, since the set of strategies is closed.

use crate::grid::RoutingGrid;
use pcb_common::geom::coord::GridCoord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Heuristic {
    /// Pure Manhattan distance, no congestion awareness. Admissible.
    Manhattan,
    /// Manhattan plus sampled congestion along the straight-line shortcut.
    /// This is the default: congestion-aware but still admissible, since
    /// the sampled term is scaled down and congestion is bounded below by
    /// zero.
    Congestion,
    /// Manhattan with an extra term that rewards continuing in the
    /// predecessor's direction, biasing the search toward straight runs.
    DirectionBias,
    /// Manhattan scaled up by a constant factor. Inadmissible but fast;
    /// used where solution quality matters less than search speed (escape
    /// fingers, diff-pair pre-routes).
    Greedy,
    /// Like `Congestion` but the sampled term is not scaled down, so
    /// congested regions are avoided aggressively at the cost of
    /// admissibility.
    WeightedCongestion,
}

pub struct HeuristicContext<'a> {
    pub grid: &'a dyn RoutingGrid,
    pub cost_straight: f64,
    pub net_multiplier: f64,
    pub predecessor_dir: Option<(i32, i32)>,
}

const CONGESTION_SAMPLES: u32 = 6;
const ADMISSIBLE_SCALE: f64 = 0.1;

impl Heuristic {
    pub fn estimate(&self, current: GridCoord, target: GridCoord, ctx: &HeuristicContext) -> f64 {
        let manhattan = (current.x as i64 - target.x as i64).unsigned_abs() as f64
            + (current.y as i64 - target.y as i64).unsigned_abs() as f64
            + (current.z as i64 - target.z as i64).unsigned_abs() as f64 * 5.0;
        let base = manhattan * ctx.cost_straight * ctx.net_multiplier;

        match self {
            Heuristic::Manhattan => base,
            Heuristic::Greedy => base * 2.0,
            Heuristic::Congestion => base + sample_congestion(current, target, ctx) * ADMISSIBLE_SCALE,
            Heuristic::WeightedCongestion => base + sample_congestion(current, target, ctx),
            Heuristic::DirectionBias => {
                let bias = direction_bias_penalty(current, target, ctx.predecessor_dir);
                base + bias
            }
        }
    }
}

fn sample_congestion(current: GridCoord, target: GridCoord, ctx: &HeuristicContext) -> f64 {
    if current.x == target.x && current.y == target.y {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..=CONGESTION_SAMPLES {
        let t = i as f64 / CONGESTION_SAMPLES as f64;
        let x = (current.x as f64 + (target.x as f64 - current.x as f64) * t).round() as u32;
        let y = (current.y as f64 + (target.y as f64 - current.y as f64) * t).round() as u32;
        let sample = GridCoord::new(x.min(ctx.grid.width() - 1), y.min(ctx.grid.height() - 1), current.z);
        total += ctx.grid.get_cost(sample);
    }
    total / (CONGESTION_SAMPLES + 1) as f64
}

fn direction_bias_penalty(current: GridCoord, target: GridCoord, predecessor_dir: Option<(i32, i32)>) -> f64 {
    let Some((pdx, pdy)) = predecessor_dir else {
        return 0.0;
    };
    let dx = (target.x as i32 - current.x as i32).signum();
    let dy = (target.y as i32 - current.y as i32).signum();
    if (pdx, pdy) == (dx, dy) || (pdx == 0 && pdy == 0) {
        0.0
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DenseGrid;

    #[test]
    fn manhattan_ignores_congestion() {
        let grid = DenseGrid::new(10, 10, 1, 1);
        let ctx = HeuristicContext { grid: &grid, cost_straight: 1.0, net_multiplier: 1.0, predecessor_dir: None };
        let a = GridCoord::new(0, 0, 0);
        let b = GridCoord::new(3, 4, 0);
        assert_eq!(Heuristic::Manhattan.estimate(a, b, &ctx), 7.0);
    }

    #[test]
    fn greedy_is_scaled_up_manhattan() {
        let grid = DenseGrid::new(10, 10, 1, 1);
        let ctx = HeuristicContext { grid: &grid, cost_straight: 1.0, net_multiplier: 1.0, predecessor_dir: None };
        let a = GridCoord::new(0, 0, 0);
        let b = GridCoord::new(3, 4, 0);
        assert_eq!(Heuristic::Greedy.estimate(a, b, &ctx), 14.0);
    }
}
