//! Synthetic benchmark board generator, used by the CLI's `generate`
//! command and by router stress tests (spec §8 scenario 4: a dense bus
//! across a narrow corridor).

use crate::board::{BoardModel, Component, Net, Pad};
use crate::geom::Point;
use crate::layers::{LayerStack, ViaRules};
use crate::rules::{DesignRules, NetClassMap};
use rand::Rng;

pub fn generate_random_board(
    width_mm: f64,
    height_mm: f64,
    num_components: usize,
    pins_per_component: usize,
    target_utilization: f64,
) -> BoardModel {
    let util = target_utilization.clamp(0.05, 0.95);
    log::info!(
        "Generating synthetic board: {}x{}mm, {} components, util target {:.0}%",
        width_mm,
        height_mm,
        num_components,
        util * 100.0
    );

    let mut rng = rand::thread_rng();
    let pad_pitch = 0.5;
    let footprint_side = (pins_per_component as f64).sqrt().ceil() * pad_pitch + pad_pitch;

    let mut components = Vec::with_capacity(num_components);
    let mut nets: Vec<Net> = Vec::new();
    let mut next_net_id = 1u32;

    for c in 0..num_components {
        let reference = format!("U{}", c + 1);
        let cx = rng.gen_range(footprint_side..(width_mm - footprint_side).max(footprint_side + 1.0));
        let cy = rng.gen_range(footprint_side..(height_mm - footprint_side).max(footprint_side + 1.0));

        let mut pads = Vec::with_capacity(pins_per_component);
        for p in 0..pins_per_component {
            let net_id = next_net_id;
            next_net_id += 1;
            let name = format!("NET_{}_{}", reference, p);
            nets.push(Net {
                net_id,
                name: name.clone(),
                class: None,
                connections: Vec::new(),
            });

            let offset_x = (p as f64 % 4.0) * pad_pitch - 1.5 * pad_pitch;
            let offset_y = (p as f64 / 4.0).floor() * pad_pitch;

            pads.push(Pad {
                x: cx + offset_x,
                y: cy + offset_y,
                width: 0.3,
                height: 0.3,
                layers: vec![0],
                net_id,
                net_name: name,
                component_ref: reference.clone(),
                pin: p.to_string(),
                through_hole: false,
                drill: 0.0,
            });
        }

        components.push(Component {
            reference,
            rotation: 0.0,
            layer: 0,
            pads,
        });
    }

    // Chain every component's pin 0 into one shared bus net, giving the
    // benchmark a handful of genuinely multi-pin nets instead of only
    // two-pin point-to-points.
    if components.len() >= 2 {
        let bus_net_id = next_net_id;
        next_net_id += 1;
        let mut bus_net = Net {
            net_id: bus_net_id,
            name: "BUS".to_string(),
            class: None,
            connections: Vec::new(),
        };
        for comp in &mut components {
            if let Some(pad) = comp.pads.first_mut() {
                pad.net_id = bus_net_id;
                pad.net_name = "BUS".to_string();
                bus_net.connections.push(crate::board::NetConnection {
                    component_ref: comp.reference.clone(),
                    pad_pin: pad.pin.clone(),
                });
            }
        }
        nets.retain(|n| !components.iter().any(|c| c.pads.first().map(|p| p.net_id) == Some(n.net_id) && n.net_id != bus_net_id));
        nets.push(bus_net);
    }

    let _ = next_net_id;

    BoardModel {
        outline: vec![
            Point::new(0.0, 0.0),
            Point::new(width_mm, 0.0),
            Point::new(width_mm, height_mm),
            Point::new(0.0, height_mm),
        ],
        components,
        nets,
        rules: DesignRules::default(),
        layer_stack: LayerStack::preset_2layer(),
        via_rules: ViaRules::standard(2),
        net_classes: NetClassMap::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_board_has_pads_inside_outline() {
        let board = generate_random_board(50.0, 40.0, 6, 4, 0.4);
        let bounds = board.bounds();
        for pad in board.all_pads() {
            assert!(pad.x >= -1.0 && pad.x <= bounds.width() + 1.0);
            assert!(pad.y >= -1.0 && pad.y <= bounds.height() + 1.0);
        }
    }

    #[test]
    fn bus_net_links_every_component() {
        let board = generate_random_board(60.0, 60.0, 5, 2, 0.3);
        let bus = board.net_by_name("BUS").expect("bus net present");
        assert_eq!(board.pads_for_net(bus.net_id).len(), 5);
    }
}
