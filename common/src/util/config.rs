use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_node_budget")]
    pub node_budget: u32,
    #[serde(default = "default_initial_penalty")]
    pub initial_penalty: f64,
    #[serde(default = "default_penalty_multiplier")]
    pub penalty_multiplier: f64,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Net name -> forced strategy name, overriding §4.7 selection.
    #[serde(default)]
    pub strategy_overrides: HashMap<String, String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            node_budget: default_node_budget(),
            initial_penalty: default_initial_penalty(),
            penalty_multiplier: default_penalty_multiplier(),
            optimizer: OptimizerConfig::default(),
            seed: default_seed(),
            strategy_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub merge_collinear: bool,
    #[serde(default = "default_true")]
    pub eliminate_zigzags: bool,
    #[serde(default = "default_true")]
    pub compress_staircases: bool,
    #[serde(default = "default_true")]
    pub diagonal_corners: bool,
    #[serde(default = "default_true")]
    pub minimize_vias: bool,
    #[serde(default = "default_false")]
    pub serpentine_tuning: bool,
    #[serde(default = "default_max_passes")]
    pub max_passes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            merge_collinear: true,
            eliminate_zigzags: true,
            compress_staircases: true,
            diagonal_corners: true,
            minimize_vias: true,
            serpentine_tuning: false,
            max_passes: default_max_passes(),
        }
    }
}

fn default_max_iterations() -> usize {
    20
}
fn default_node_budget() -> u32 {
    200_000
}
fn default_initial_penalty() -> f64 {
    1.0
}
fn default_penalty_multiplier() -> f64 {
    1.5
}
fn default_seed() -> u64 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_max_passes() -> usize {
    6
}
