//! Design rules and net-class overrides — immutable value types merged
//! once per net into an `EffectiveRules` cache reused across an entire
//! A* pass.

use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct DesignRules {
    pub trace_width: f64,
    pub trace_clearance: f64,
    pub via_drill: f64,
    pub via_diameter: f64,
    pub grid_resolution: f64,
    pub min_trace_width: f64,
    pub neck_down_threshold: f64,
    pub cost_straight: f64,
    pub cost_diagonal: f64,
    pub cost_turn: f64,
    pub cost_via: f64,
    pub history_weight: f64,
    pub present_congestion_weight: f64,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            trace_width: 0.25,
            trace_clearance: 0.2,
            via_drill: 0.3,
            via_diameter: 0.6,
            grid_resolution: 0.1,
            min_trace_width: 0.15,
            neck_down_threshold: 0.5,
            cost_straight: 1.0,
            cost_diagonal: std::f64::consts::SQRT_2,
            cost_turn: 0.5,
            cost_via: 15.0,
            history_weight: 5.0,
            present_congestion_weight: 2.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetClass {
    pub name: String,
    pub priority: u32,
    pub trace_width: Option<f64>,
    pub clearance: Option<f64>,
    pub cost_multiplier: f64,
    pub length_critical: bool,
}

#[derive(Clone, Copy, Debug)]
pub enum NetClassPreset {
    Power,
    Clock,
    Default,
}

impl NetClassPreset {
    pub fn build(self) -> NetClass {
        match self {
            NetClassPreset::Power => NetClass {
                name: "Power".to_string(),
                priority: 1,
                trace_width: Some(0.5),
                clearance: None,
                cost_multiplier: 0.5,
                length_critical: false,
            },
            NetClassPreset::Clock => NetClass {
                name: "Clock".to_string(),
                priority: 2,
                trace_width: None,
                clearance: None,
                cost_multiplier: 0.8,
                length_critical: true,
            },
            NetClassPreset::Default => NetClass {
                name: "Default".to_string(),
                priority: 5,
                trace_width: None,
                clearance: None,
                cost_multiplier: 1.0,
                length_critical: false,
            },
        }
    }
}

/// Named net classes, keyed by class name. Always contains a `Default`
/// entry so `classify` never needs to return an `Option`.
#[derive(Clone, Debug)]
pub struct NetClassMap {
    classes: HashMap<String, NetClass>,
}

impl Default for NetClassMap {
    fn default() -> Self {
        let mut classes = HashMap::new();
        classes.insert("Default".to_string(), NetClassPreset::Default.build());
        classes.insert("Power".to_string(), NetClassPreset::Power.build());
        classes.insert("Clock".to_string(), NetClassPreset::Clock.build());
        Self { classes }
    }
}

impl NetClassMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: NetClass) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn classify(&self, class_name: Option<&str>) -> &NetClass {
        class_name
            .and_then(|n| self.classes.get(n))
            .unwrap_or_else(|| self.classes.get("Default").expect("Default always present"))
    }
}

/// Rules merged for one net for the duration of one routing pass: global
/// rules folded with the net's class overrides.
#[derive(Clone, Debug)]
pub struct EffectiveRules {
    pub trace_width: f64,
    pub clearance: f64,
    pub cost_straight: f64,
    pub cost_diagonal: f64,
    pub cost_turn: f64,
    pub cost_via: f64,
    pub cost_multiplier: f64,
    pub length_critical: bool,
    pub grid_resolution: f64,
    pub min_trace_width: f64,
    pub neck_down_threshold: f64,
    pub history_weight: f64,
    pub present_congestion_weight: f64,
}

pub fn effective_rules(global: &DesignRules, class: &NetClass) -> EffectiveRules {
    EffectiveRules {
        trace_width: class.trace_width.unwrap_or(global.trace_width),
        clearance: class.clearance.unwrap_or(global.trace_clearance),
        cost_straight: global.cost_straight,
        cost_diagonal: global.cost_diagonal,
        cost_turn: global.cost_turn,
        cost_via: global.cost_via,
        cost_multiplier: class.cost_multiplier,
        length_critical: class.length_critical,
        grid_resolution: global.grid_resolution,
        min_trace_width: global.min_trace_width,
        neck_down_threshold: global.neck_down_threshold,
        history_weight: global.history_weight,
        present_congestion_weight: global.present_congestion_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_class_overrides_width_and_lowers_priority_cost() {
        let rules = DesignRules::default();
        let map = NetClassMap::default();
        let power = map.classify(Some("Power"));
        let eff = effective_rules(&rules, power);
        assert_eq!(eff.trace_width, 0.5);
        assert!(eff.cost_multiplier < 1.0);
    }

    #[test]
    fn unknown_class_falls_back_to_default() {
        let map = NetClassMap::default();
        let c = map.classify(Some("DoesNotExist"));
        assert_eq!(c.name, "Default");
    }
}
