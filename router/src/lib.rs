pub mod astar;
pub mod grid;
pub mod heuristic;
pub mod optimize;
pub mod session;
pub mod strategy;
pub mod subgrid;
pub mod topology;

use pcb_common::board::BoardModel;
use pcb_common::route::RouterResult;
use pcb_common::util::{CancellationToken, RouterConfig};

use session::RoutingSession;

/// Routes every multi-pin net on `board` under `config`, returning as soon
/// as the session converges, hits the iteration cap, or `cancel` fires.
pub fn route(board: &BoardModel, config: &RouterConfig, cancel: CancellationToken) -> RouterResult {
    log::info!(
        "Starting route: {} nets, {} components, grid resolution {} mm",
        board.nets.len(),
        board.components.len(),
        board.rules.grid_resolution,
    );
    let session = RoutingSession::new(board, config);
    let result = session.run(cancel);
    log::info!(
        "Finished route: {}/{} nets routed, {} violations, {} errors",
        result.stats.nets_routed,
        result.routes.len(),
        result.violations.len(),
        result.errors.len(),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::board::{Component, Net, NetConnection, Pad};
    use pcb_common::geom::Point;
    use pcb_common::layers::{LayerStack, ViaRules};
    use pcb_common::rules::{DesignRules, NetClassMap};

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
    fn routes_a_two_pad_board_end_to_end() {
        let board = BoardModel {
            outline: vec![Point::new(0.0, 0.0), Point::new(20.0, 20.0)],
            components: vec![Component {
                reference: "D1".into(),
                rotation: 0.0,
                layer: 0,
                pads: vec![pad(2.0, 2.0, "D1", "A", 1), pad(2.0, 2.0, "D1", "K", 1)],
            }],
            nets: vec![Net {
                net_id: 1,
                name: "LED".into(),
                class: None,
                connections: vec![
                    NetConnection { component_ref: "D1".into(), pad_pin: "A".into() },
                    NetConnection { component_ref: "D1".into(), pad_pin: "K".into() },
                ],
            }],
            rules: DesignRules::default(),
            layer_stack: LayerStack::preset_2layer(),
            via_rules: ViaRules::standard(2),
            net_classes: NetClassMap::default(),
        };
        let config = RouterConfig::default();
        let result = route(&board, &config, CancellationToken::new());
        assert_eq!(result.stats.nets_routed, 1);
    }

    #[test]
    fn cancellation_returns_partial_result_instead_of_panicking() {
        let board = BoardModel {
            outline: vec![Point::new(0.0, 0.0), Point::new(20.0, 20.0)],
            components: vec![Component {
                reference: "D1".into(),
                rotation: 0.0,
                layer: 0,
                pads: vec![pad(2.0, 2.0, "D1", "A", 1), pad(18.0, 18.0, "D1", "K", 1)],
            }],
            nets: vec![Net {
                net_id: 1,
                name: "LED".into(),
                class: None,
                connections: vec![],
            }],
            rules: DesignRules::default(),
            layer_stack: LayerStack::preset_2layer(),
            via_rules: ViaRules::standard(2),
            net_classes: NetClassMap::default(),
        };
        let config = RouterConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = route(&board, &config, cancel);
        assert_eq!(result.stats.nets_routed, 0);
    }
}
