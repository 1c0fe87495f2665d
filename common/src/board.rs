//! The board model consumed by the router: outline, components with
//! pads, net-to-pad mapping, and the rule bundles from `rules`/`layers`.

use crate::geom::{Point, Rect};
use crate::layers::LayerStack;
use crate::rules::{DesignRules, NetClassMap};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct Pad {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Layers this pad is present on (multiple for a through-hole pad).
    pub layers: Vec<u8>,
    pub net_id: u32,
    pub net_name: String,
    pub component_ref: String,
    pub pin: String,
    pub through_hole: bool,
    pub drill: f64,
}

impl Pad {
    pub fn position(&self) -> Point<f64> {
        Point::new(self.x, self.y)
    }

    pub fn footprint(&self) -> Rect {
        Rect::new(
            Point::new(self.x - self.width / 2.0, self.y - self.height / 2.0),
            Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0),
        )
    }

    pub fn pitch_hint(&self) -> f64 {
        self.width.min(self.height)
    }
}

#[derive(Clone, Debug)]
pub struct Component {
    pub reference: String,
    pub rotation: f64,
    pub layer: u8,
    pub pads: Vec<Pad>,
}

#[derive(Clone, Debug)]
pub struct NetConnection {
    pub component_ref: String,
    pub pad_pin: String,
}

#[derive(Clone, Debug)]
pub struct Net {
    pub net_id: u32,
    pub name: String,
    /// Net class name, looked up through `NetClassMap::classify`.
    pub class: Option<String>,
    pub connections: Vec<NetConnection>,
}

pub struct BoardModel {
    pub outline: Vec<Point<f64>>,
    pub components: Vec<Component>,
    pub nets: Vec<Net>,
    pub rules: DesignRules,
    pub layer_stack: LayerStack,
    pub via_rules: crate::layers::ViaRules,
    pub net_classes: NetClassMap,
}

impl BoardModel {
    pub fn bounds(&self) -> Rect {
        if self.outline.is_empty() {
            return Rect::default();
        }
        let mut min = self.outline[0];
        let mut max = self.outline[0];
        for p in &self.outline {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::new(min, max)
    }

    pub fn all_pads(&self) -> impl Iterator<Item = &Pad> {
        self.components.iter().flat_map(|c| c.pads.iter())
    }

    pub fn pads_for_net(&self, net_id: u32) -> Vec<&Pad> {
        self.all_pads().filter(|p| p.net_id == net_id).collect()
    }

    pub fn pad_lookup(&self, component_ref: &str, pin: &str) -> Option<&Pad> {
        self.components
            .iter()
            .find(|c| c.reference == component_ref)
            .and_then(|c| c.pads.iter().find(|p| p.pin == pin))
    }

    pub fn net_by_name(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|n| n.name == name)
    }

    /// All multi-pin nets, the only ones the router actually searches a
    /// path for (single-pad nets are trivially "routed" with zero
    /// segments per §8 boundary behavior).
    pub fn routable_nets(&self) -> impl Iterator<Item = &Net> {
        self.nets.iter().filter(|n| self.pads_for_net(n.net_id).len() >= 2)
    }

    pub fn net_name_to_id(&self) -> HashMap<String, u32> {
        self.nets.iter().map(|n| (n.name.clone(), n.net_id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerStack, ViaRules};

    fn two_pin_board() -> BoardModel {
        let pad_a = Pad {
            x: 1.0,
            y: 1.0,
            width: 0.3,
            height: 0.3,
            layers: vec![0],
            net_id: 1,
            net_name: "NET1".into(),
            component_ref: "R1".into(),
            pin: "1".into(),
            through_hole: false,
            drill: 0.0,
        };
        let mut pad_b = pad_a.clone();
        pad_b.x = 5.0;
        pad_b.pin = "2".into();

        BoardModel {
            outline: vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            components: vec![Component {
                reference: "R1".into(),
                rotation: 0.0,
                layer: 0,
                pads: vec![pad_a, pad_b],
            }],
            nets: vec![Net {
                net_id: 1,
                name: "NET1".into(),
                class: None,
                connections: vec![],
            }],
            rules: DesignRules::default(),
            layer_stack: LayerStack::preset_2layer(),
            via_rules: ViaRules::standard(2),
            net_classes: Default::default(),
        }
    }

    #[test]
    fn pads_for_net_finds_both_pins() {
        let board = two_pin_board();
        assert_eq!(board.pads_for_net(1).len(), 2);
    }

    #[test]
    fn bounds_spans_outline() {
        let board = two_pin_board();
        let b = board.bounds();
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 10.0);
    }
}
