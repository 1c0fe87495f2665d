//! Layer stack and via catalog — an immutable value bundle built once per
//! board and shared by reference through the rest of the router.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerType {
    Signal,
    Plane,
    Mixed,
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub name: String,
    pub index: u8,
    pub layer_type: LayerType,
    pub is_outer: bool,
}

impl Layer {
    pub fn signal(index: u8, name: impl Into<String>, is_outer: bool) -> Self {
        Self {
            name: name.into(),
            index,
            layer_type: LayerType::Signal,
            is_outer,
        }
    }

    pub fn plane(index: u8, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index,
            layer_type: LayerType::Plane,
            is_outer: false,
        }
    }

    pub fn is_routable(&self) -> bool {
        !matches!(self.layer_type, LayerType::Plane)
    }
}

#[derive(Clone, Debug)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// Builds a stack from an already-ordered, gap-free layer list.
    pub fn new(layers: Vec<Layer>) -> Result<Self, String> {
        for (i, layer) in layers.iter().enumerate() {
            if layer.index as usize != i {
                return Err(format!(
                    "layer stack has a gap or reorder at index {i} (layer reports index {})",
                    layer.index
                ));
            }
        }
        Ok(Self { layers })
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: u8) -> Option<&Layer> {
        self.layers.get(index as usize)
    }

    pub fn routable_indices(&self) -> Vec<u8> {
        self.layers
            .iter()
            .filter(|l| l.is_routable())
            .map(|l| l.index)
            .collect()
    }

    pub fn is_plane(&self, k: u8) -> bool {
        self.layer(k)
            .map(|l| l.layer_type == LayerType::Plane)
            .unwrap_or(true)
    }

    /// `F.Cu` / `B.Cu` / `InN.Cu` naming convention, per the external
    /// interface contract.
    pub fn kicad_name(&self, k: u8) -> String {
        let n = self.layers.len();
        if n == 0 {
            return format!("In{k}.Cu");
        }
        if k == 0 {
            "F.Cu".to_string()
        } else if k as usize == n - 1 {
            "B.Cu".to_string()
        } else {
            format!("In{}.Cu", k)
        }
    }

    pub fn preset_2layer() -> Self {
        Self::new(vec![
            Layer::signal(0, "F.Cu", true),
            Layer::signal(1, "B.Cu", true),
        ])
        .expect("built-in preset is always contiguous")
    }

    pub fn preset_4layer() -> Self {
        Self::new(vec![
            Layer::signal(0, "F.Cu", true),
            Layer::plane(1, "In1.Cu"),
            Layer::plane(2, "In2.Cu"),
            Layer::signal(3, "B.Cu", true),
        ])
        .expect("built-in preset is always contiguous")
    }

    pub fn preset_6layer() -> Self {
        Self::new(vec![
            Layer::signal(0, "F.Cu", true),
            Layer::plane(1, "In1.Cu"),
            Layer::signal(2, "In2.Cu", false),
            Layer::signal(3, "In3.Cu", false),
            Layer::plane(4, "In4.Cu"),
            Layer::signal(5, "B.Cu", true),
        ])
        .expect("built-in preset is always contiguous")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViaType {
    Through,
    BlindTop,
    BlindBottom,
    Buried,
    Micro,
}

#[derive(Clone, Debug)]
pub struct ViaDef {
    pub via_type: ViaType,
    pub drill: f64,
    pub annular_ring: f64,
    pub start_layer: u8,
    pub end_layer: u8,
    pub cost: f64,
}

impl ViaDef {
    fn lo(&self) -> u8 {
        self.start_layer.min(self.end_layer)
    }
    fn hi(&self) -> u8 {
        self.start_layer.max(self.end_layer)
    }

    /// True if this via's span covers both requested endpoints.
    pub fn spans(&self, a: u8, b: u8) -> bool {
        let (lo, hi) = (a.min(b), a.max(b));
        self.lo() <= lo && hi <= self.hi()
    }

    /// True if `layer` falls strictly inside the via's span (i.e. the via
    /// physically occupies that layer without making electrical contact
    /// there).
    pub fn blocks(&self, layer: u8) -> bool {
        layer > self.lo() && layer < self.hi()
    }

    pub fn diameter(&self) -> f64 {
        self.drill + 2.0 * self.annular_ring
    }
}

#[derive(Clone, Debug)]
pub struct ViaRules {
    pub vias: Vec<ViaDef>,
    pub allow_blind: bool,
    pub allow_buried: bool,
    pub allow_micro: bool,
}

impl ViaRules {
    pub fn standard(layer_count: u8) -> Self {
        let last = layer_count.saturating_sub(1);
        let mut vias = vec![ViaDef {
            via_type: ViaType::Through,
            drill: 0.3,
            annular_ring: 0.15,
            start_layer: 0,
            end_layer: last,
            cost: 1.0,
        }];

        if layer_count >= 4 {
            vias.push(ViaDef {
                via_type: ViaType::BlindTop,
                drill: 0.2,
                annular_ring: 0.1,
                start_layer: 0,
                end_layer: 1,
                cost: 1.6,
            });
            vias.push(ViaDef {
                via_type: ViaType::BlindBottom,
                drill: 0.2,
                annular_ring: 0.1,
                start_layer: last - 1,
                end_layer: last,
                cost: 1.6,
            });
        }
        if layer_count >= 6 {
            vias.push(ViaDef {
                via_type: ViaType::Buried,
                drill: 0.15,
                annular_ring: 0.08,
                start_layer: 1,
                end_layer: last - 1,
                cost: 2.0,
            });
        }
        vias.push(ViaDef {
            via_type: ViaType::Micro,
            drill: 0.1,
            annular_ring: 0.05,
            start_layer: 0,
            end_layer: 1.min(last),
            cost: 0.8,
        });

        Self {
            vias,
            allow_blind: true,
            allow_buried: true,
            allow_micro: true,
        }
    }

    fn allowed(&self, via: &ViaDef) -> bool {
        match via.via_type {
            ViaType::Through => true,
            ViaType::BlindTop | ViaType::BlindBottom => self.allow_blind,
            ViaType::Buried => self.allow_buried,
            ViaType::Micro => self.allow_micro,
        }
    }

    /// Returns the cheapest via whose span covers the requested layer
    /// transition under the current allow-flags, or `None` if infeasible.
    pub fn best_via(&self, k_from: u8, k_to: u8) -> Option<ViaDef> {
        self.vias
            .iter()
            .filter(|v| self.allowed(v) && v.spans(k_from, k_to))
            .min_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_4layer_has_two_planes() {
        let stack = LayerStack::preset_4layer();
        assert_eq!(stack.routable_indices(), vec![0, 3]);
        assert!(stack.is_plane(1));
        assert!(stack.is_plane(2));
    }

    #[test]
    fn via_spans_and_blocks() {
        let via = ViaDef {
            via_type: ViaType::Through,
            drill: 0.3,
            annular_ring: 0.15,
            start_layer: 0,
            end_layer: 3,
            cost: 1.0,
        };
        assert!(via.spans(0, 3));
        assert!(via.blocks(1));
        assert!(via.blocks(2));
        assert!(!via.blocks(0));
        assert!(!via.blocks(3));
    }

    #[test]
    fn best_via_picks_cheapest_covering_transition() {
        let rules = ViaRules::standard(4);
        let via = rules.best_via(0, 1).expect("blind via should exist");
        assert!(via.spans(0, 1));
        assert!(via.cost < rules.best_via(0, 3).unwrap().cost);
    }

    #[test]
    fn best_via_none_when_disallowed() {
        let mut rules = ViaRules::standard(4);
        rules.allow_blind = false;
        let via = rules.best_via(0, 1).expect("through via still spans 0..1");
        assert_eq!(via.via_type, ViaType::Through);
    }
}
