//! Crate `config` provides the engine's tunable parameters.
//!
//! CLI argument parsing is out of scope (a front-end composing this crate
//! decides how to source these values); `EngineConfig` is built
//! programmatically, in the style of the teacher's struct-of-knobs `Config`
//! but without a `structopt`-derived CLI surface.
use crate::types::{ProofFormat, VarId};

/// tbuddy-core's version number.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine-wide configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Initial capacity of the node store.
    pub initial_nodes: usize,
    /// Growth factor applied to the node store on resize.
    pub growth_factor: f64,
    /// Hard ceiling on the number of interior nodes.
    pub max_nodes: usize,
    /// Requested size of the operation cache; rounded up to the smallest
    /// prime greater than or equal to this value.
    pub cache_size: usize,
    /// Fraction of dead (refcount-zero, unreachable) nodes that triggers a
    /// garbage collection pass.
    pub gc_dead_fraction: f64,
    /// Fixed variable order: `var_order[i]` is the level assigned to
    /// variable `i+1`. Empty means "identity order".
    pub var_order: Vec<VarId>,
    /// Whether to emit a proof at all.
    pub generate_proof: bool,
    /// Which proof format to emit, when `generate_proof` is set.
    pub proof_format: ProofFormat,
    /// Emit the binary encoding of the chosen format instead of text.
    pub binary: bool,
    /// Seed for the Lehmer LCG that breaks ties in `xor_set::sum`'s
    /// cost-minimizing graph-contraction heuristic.
    pub xor_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            initial_nodes: 1 << 16,
            growth_factor: 2.0,
            max_nodes: 1 << 24,
            cache_size: 1 << 16,
            gc_dead_fraction: 0.25,
            var_order: Vec::new(),
            generate_proof: true,
            proof_format: ProofFormat::Lrat,
            binary: false,
            xor_seed: 0x2545_F491_4F6C_DD1D,
        }
    }
}

impl EngineConfig {
    pub fn new() -> EngineConfig {
        EngineConfig::default()
    }

    pub fn with_proof_format(mut self, format: ProofFormat) -> EngineConfig {
        self.proof_format = format;
        self
    }

    pub fn with_binary(mut self, binary: bool) -> EngineConfig {
        self.binary = binary;
        self
    }

    pub fn without_proof(mut self) -> EngineConfig {
        self.generate_proof = false;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> EngineConfig {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_xor_seed(mut self, seed: u64) -> EngineConfig {
        self.xor_seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_lrat_text() {
        let c = EngineConfig::default();
        assert_eq!(c.proof_format, ProofFormat::Lrat);
        assert!(!c.binary);
        assert!(c.generate_proof);
    }

    #[test]
    fn builder_chains() {
        let c = EngineConfig::new()
            .with_proof_format(ProofFormat::Frat)
            .with_binary(true)
            .with_max_nodes(1024);
        assert_eq!(c.proof_format, ProofFormat::Frat);
        assert!(c.binary);
        assert_eq!(c.max_nodes, 1024);
    }
}
