//! Per-net strategy orchestrator (§4.7). Selection is a pure function of
//! net metadata and grid inspection — it only chooses input parameters
//! and pre-processing steps, never a different search algorithm.
//!
//! Table order is precedence order, top-to-bottom first match wins. The
//! source left this unspecified (§9 open question); diff-pair detection
//! goes first since it constrains both members of a pair together and
//! every other condition is genuinely per-net.

use pcb_common::board::{BoardModel, Net};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    HierarchicalDiffPair,
    SubgridAdaptive,
    ViaConflictResolution,
    EscapeThenGlobal,
    GlobalWithRepair,
}

pub struct StrategyContext {
    pub any_pad_off_grid: bool,
    pub via_conflict_count: u32,
    pub via_conflict_threshold: u32,
    pub starts_in_dense_courtyard: bool,
}

pub fn diff_pair_partner(net_name: &str) -> Option<String> {
    if let Some(stem) = net_name.strip_suffix('+') {
        return Some(format!("{stem}-"));
    }
    if let Some(stem) = net_name.strip_suffix('-') {
        return Some(format!("{stem}+"));
    }
    if let Some(stem) = net_name.strip_suffix("_P") {
        return Some(format!("{stem}_N"));
    }
    if let Some(stem) = net_name.strip_suffix("_N") {
        return Some(format!("{stem}_P"));
    }
    None
}

pub fn is_diff_pair(board: &BoardModel, net: &Net) -> bool {
    diff_pair_partner(&net.name).is_some_and(|partner| board.net_by_name(&partner).is_some())
}

impl StrategyKind {
    /// Parses a config-file strategy override name (case-insensitive).
    /// Unrecognized names fall back to `None` so the caller can still run
    /// `select()` rather than silently misrouting a typo'd override.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hierarchicaldiffpair" | "diff_pair" => Some(StrategyKind::HierarchicalDiffPair),
            "subgridadaptive" | "subgrid" => Some(StrategyKind::SubgridAdaptive),
            "viaconflictresolution" | "via_conflict" => Some(StrategyKind::ViaConflictResolution),
            "escapethenglobal" | "escape" => Some(StrategyKind::EscapeThenGlobal),
            "globalwithrepair" | "default" => Some(StrategyKind::GlobalWithRepair),
            _ => None,
        }
    }
}

pub fn select(board: &BoardModel, net: &Net, ctx: &StrategyContext) -> StrategyKind {
    if is_diff_pair(board, net) {
        return StrategyKind::HierarchicalDiffPair;
    }
    if ctx.any_pad_off_grid {
        return StrategyKind::SubgridAdaptive;
    }
    if ctx.via_conflict_count > ctx.via_conflict_threshold {
        return StrategyKind::ViaConflictResolution;
    }
    if ctx.starts_in_dense_courtyard {
        return StrategyKind::EscapeThenGlobal;
    }
    StrategyKind::GlobalWithRepair
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_pair_suffix_variants_match() {
        assert_eq!(diff_pair_partner("USB_DP+"), Some("USB_DP-".to_string()));
        assert_eq!(diff_pair_partner("CLK_P"), Some("CLK_N".to_string()));
        assert_eq!(diff_pair_partner("GND"), None);
    }

    #[test]
    fn diff_pair_precedes_all_other_conditions() {
        let board = BoardModel {
            outline: vec![],
            components: vec![],
            nets: vec![
                Net { net_id: 1, name: "D+".into(), class: None, connections: vec![] },
                Net { net_id: 2, name: "D-".into(), class: None, connections: vec![] },
            ],
            rules: Default::default(),
            layer_stack: pcb_common::layers::LayerStack::preset_2layer(),
            via_rules: pcb_common::layers::ViaRules::standard(2),
            net_classes: Default::default(),
        };
        let ctx = StrategyContext {
            any_pad_off_grid: true,
            via_conflict_count: 100,
            via_conflict_threshold: 1,
            starts_in_dense_courtyard: true,
        };
        let kind = select(&board, &board.nets[0], &ctx);
        assert_eq!(kind, StrategyKind::HierarchicalDiffPair);
    }

    #[test]
    fn from_name_recognizes_aliases_and_rejects_typos() {
        assert_eq!(StrategyKind::from_name("via_conflict"), Some(StrategyKind::ViaConflictResolution));
        assert_eq!(StrategyKind::from_name("ViaConflictResolution"), Some(StrategyKind::ViaConflictResolution));
        assert_eq!(StrategyKind::from_name("nonsense"), None);
    }

    #[test]
    fn default_strategy_when_nothing_else_matches() {
        let board = BoardModel {
            outline: vec![],
            components: vec![],
            nets: vec![Net { net_id: 1, name: "GND".into(), class: None, connections: vec![] }],
            rules: Default::default(),
            layer_stack: pcb_common::layers::LayerStack::preset_2layer(),
            via_rules: pcb_common::layers::ViaRules::standard(2),
            net_classes: Default::default(),
        };
        let ctx = StrategyContext {
            any_pad_off_grid: false,
            via_conflict_count: 0,
            via_conflict_threshold: 4,
            starts_in_dense_courtyard: false,
        };
        assert_eq!(select(&board, &board.nets[0], &ctx), StrategyKind::GlobalWithRepair);
    }
}
