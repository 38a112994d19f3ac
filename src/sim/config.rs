use rustc_hash::FxHashMap;

use crate::atn::{Alt, AtnStateId, CtxRef, PredRef};

/// One way the automaton could currently be positioned: an ATN state,
/// the simulated call stack that led there, the alternative being
/// predicted, and the semantic guard collected on the way (or
/// `PredRef::NONE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtnConfig {
    pub state: AtnStateId,
    pub alt: Alt,
    pub ctx: CtxRef,
    pub pred: PredRef,
}

/// A set of [`AtnConfig`]s in canonical (sorted, deduplicated) form.
///
/// Canonicalization happens at construction, so the derived `Eq` and
/// `Hash` are order-independent: two sets built from the same configs
/// in any discovery order compare equal.  This is the contract the
/// DFA cache keys on; see `sim::dfa`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ConfigSet {
    configs: Vec<AtnConfig>,
}

impl ConfigSet {
    pub fn new(mut configs: Vec<AtnConfig>) -> Self {
        configs.sort_unstable();
        configs.dedup();
        ConfigSet { configs }
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AtnConfig> {
        self.configs.iter()
    }

    /// Distinct predicted alternatives, ascending.
    pub fn alts(&self) -> Vec<Alt> {
        let mut alts: Vec<Alt> = self.configs.iter().map(|c| c.alt).collect();
        alts.sort_unstable();
        alts.dedup();
        alts
    }

    /// Alternatives that genuinely conflict: two configurations on the
    /// same (state, context) pair predicting different alternatives
    /// mean further input cannot tell them apart.  Returns the sorted
    /// union of conflicting alternatives, or `None` when every
    /// (state, context) pair predicts a single alternative.
    pub fn conflicting_alts(&self) -> Option<Vec<Alt>> {
        let mut by_pos: FxHashMap<(AtnStateId, CtxRef), Vec<Alt>> = FxHashMap::default();
        for c in &self.configs {
            let alts = by_pos.entry((c.state, c.ctx)).or_default();
            if !alts.contains(&c.alt) {
                alts.push(c.alt);
            }
        }
        let mut conflicting: Vec<Alt> = Vec::new();
        for alts in by_pos.values() {
            if alts.len() > 1 {
                for a in alts {
                    if !conflicting.contains(a) {
                        conflicting.push(*a);
                    }
                }
            }
        }
        if conflicting.is_empty() {
            None
        } else {
            conflicting.sort_unstable();
            Some(conflicting)
        }
    }
}

impl FromIterator<AtnConfig> for ConfigSet {
    fn from_iter<T: IntoIterator<Item = AtnConfig>>(iter: T) -> Self {
        ConfigSet::new(iter.into_iter().collect())
    }
}
