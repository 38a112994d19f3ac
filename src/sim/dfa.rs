use rustc_hash::FxHashMap;

use crate::atn::{Alt, AtnStateId, DecisionIdx, PredRef, Symbol};

use super::config::ConfigSet;

/// Index of a DFA state within its owning [`Dfa`] arena.  Ids are
/// assigned sequentially on insertion and are diagnostic only; state
/// identity is the configuration set.  `DfaStateId::ERROR` is the
/// explicit reject state: an edge routed to it means "computed, and
/// known dead", which is distinct from a missing edge ("not yet
/// computed").
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct DfaStateId(u32);

impl DfaStateId {
    pub const ERROR: DfaStateId = DfaStateId(u32::MAX);

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub fn is_error(&self) -> bool {
        *self == DfaStateId::ERROR
    }
}

/// Simulation context mode; indexes the per-DFA start-state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxMode {
    /// Approximate prediction with an empty simulated stack.
    Sll = 0,
    /// Exact prediction using the caller's real rule-invocation stack.
    Full = 1,
}

#[derive(Debug, Clone)]
pub struct DfaState {
    pub id: DfaStateId,
    pub configs: ConfigSet,
    /// Transition table; absence means "not yet computed".
    pub edges: FxHashMap<Symbol, DfaStateId>,
    pub is_accept: bool,
    /// Predicted alternative when accepting without predicates.
    pub prediction: Option<Alt>,
    /// Conflict found under approximate prediction; resolution must
    /// escalate to full-context mode.
    pub requires_full_context: bool,
    /// (predicate, alternative) pairs evaluated in order at
    /// acceptance when several guarded alternatives stay viable.
    pub predicates: Vec<(PredRef, Alt)>,
}

impl DfaState {
    fn from_configs(id: DfaStateId, configs: ConfigSet, is_accept: &dyn Fn(AtnStateId) -> bool) -> Self {
        let accepting: Vec<_> = configs.iter().filter(|c| is_accept(c.state)).collect();
        let is_accept_state = !accepting.is_empty();
        let prediction = accepting.iter().map(|c| c.alt).min();
        let mut predicates: Vec<(PredRef, Alt)> = accepting
            .iter()
            .filter(|c| !c.pred.is_none())
            .map(|c| (c.pred, c.alt))
            .collect();
        predicates.sort_unstable_by_key(|(_, alt)| *alt);
        predicates.dedup();
        DfaState {
            id,
            configs,
            edges: FxHashMap::default(),
            is_accept: is_accept_state,
            prediction,
            requires_full_context: false,
            predicates,
        }
    }
}

/// The lazily-built DFA cache for one decision point.
///
/// States live in an arena and reference each other by index, so the
/// structure has no ownership cycles and serializes trivially.
/// `intern_state` is the memoization boundary: no two states with
/// equal configuration sets ever coexist here.
#[derive(Debug, Clone)]
pub struct Dfa {
    decision: DecisionIdx,
    states: Vec<DfaState>,
    intern: FxHashMap<ConfigSet, DfaStateId>,
    start: [Option<DfaStateId>; 2],
}

impl Dfa {
    pub fn new(decision: DecisionIdx) -> Self {
        Dfa {
            decision,
            states: Vec::new(),
            intern: FxHashMap::default(),
            start: [None, None],
        }
    }

    pub fn decision(&self) -> DecisionIdx {
        self.decision
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: DfaStateId) -> &DfaState {
        assert!(!id.is_error(), "error state has no representation");
        &self.states[id.as_usize()]
    }

    pub fn state_mut(&mut self, id: DfaStateId) -> &mut DfaState {
        assert!(!id.is_error(), "error state has no representation");
        &mut self.states[id.as_usize()]
    }

    /// Return the existing state equal (by configuration set) to
    /// `configs`, or insert a new one under the next sequential id.
    /// The boolean is true when a new state was created.
    pub fn intern_state(
        &mut self,
        configs: ConfigSet,
        is_accept: &dyn Fn(AtnStateId) -> bool,
    ) -> (DfaStateId, bool) {
        if let Some(&id) = self.intern.get(&configs) {
            return (id, false);
        }
        let id = DfaStateId(self.states.len() as u32);
        assert!(id.0 != u32::MAX, "DFA arena overflow");
        let state = DfaState::from_configs(id, configs.clone(), is_accept);
        self.states.push(state);
        self.intern.insert(configs, id);
        (id, true)
    }

    /// Install a transition.  Installing the same (from, symbol,
    /// target) twice is a no-op; under a correct configuration-set
    /// equality two sessions can only ever compute the same target.
    pub fn set_edge(&mut self, from: DfaStateId, symbol: Symbol, to: DfaStateId) {
        let state = self.state_mut(from);
        let prev = state.edges.insert(symbol, to);
        if let Some(prev) = prev {
            assert!(
                prev == to,
                "edge {:?} --{:?}--> recomputed with a different target",
                from,
                symbol
            );
        }
    }

    /// `None` means the edge has not been computed yet; the engine
    /// falls back to closure computation.
    pub fn edge(&self, from: DfaStateId, symbol: Symbol) -> Option<DfaStateId> {
        self.state(from).edges.get(&symbol).copied()
    }

    pub fn start(&self, mode: CtxMode) -> Option<DfaStateId> {
        self.start[mode as usize]
    }

    pub fn set_start(&mut self, mode: CtxMode, id: DfaStateId) {
        self.start[mode as usize] = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::CtxRef;
    use crate::sim::config::AtnConfig;

    fn cfg(state: usize, alt: usize) -> AtnConfig {
        AtnConfig {
            state: AtnStateId::new(state),
            alt: Alt::new(alt),
            ctx: CtxRef(0),
            pred: PredRef::NONE,
        }
    }

    fn no_accept(_: AtnStateId) -> bool {
        false
    }

    #[test]
    fn intern_dedups_by_set_equality() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, created_a) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1), cfg(2, 2)]), &no_accept);
        let (b, created_b) = dfa.intern_state(ConfigSet::new(vec![cfg(2, 2), cfg(1, 1)]), &no_accept);
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a, b);
        assert_eq!(dfa.num_states(), 1);
    }

    #[test]
    fn ids_are_sequential() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, _) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1)]), &no_accept);
        let (b, _) = dfa.intern_state(ConfigSet::new(vec![cfg(2, 1)]), &no_accept);
        assert_eq!(a.as_usize(), 0);
        assert_eq!(b.as_usize(), 1);
    }

    #[test]
    fn edge_install_is_idempotent() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, _) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1)]), &no_accept);
        let (b, _) = dfa.intern_state(ConfigSet::new(vec![cfg(2, 1)]), &no_accept);
        assert_eq!(dfa.edge(a, Symbol(5)), None);
        dfa.set_edge(a, Symbol(5), b);
        dfa.set_edge(a, Symbol(5), b);
        assert_eq!(dfa.edge(a, Symbol(5)), Some(b));
    }

    #[test]
    #[should_panic(expected = "different target")]
    fn edge_retarget_is_a_defect() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, _) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1)]), &no_accept);
        let (b, _) = dfa.intern_state(ConfigSet::new(vec![cfg(2, 1)]), &no_accept);
        dfa.set_edge(a, Symbol(5), b);
        dfa.set_edge(a, Symbol(5), DfaStateId::ERROR);
    }

    #[test]
    fn error_edges_are_explicit() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, _) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1)]), &no_accept);
        dfa.set_edge(a, Symbol(9), DfaStateId::ERROR);
        // present, and distinct from "not yet computed"
        assert_eq!(dfa.edge(a, Symbol(9)), Some(DfaStateId::ERROR));
        assert_eq!(dfa.edge(a, Symbol(10)), None);
    }

    #[test]
    fn accept_metadata_from_configs() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let stop = AtnStateId::new(99);
        let set = ConfigSet::new(vec![
            AtnConfig {
                state: stop,
                alt: Alt::new(2),
                ctx: CtxRef(0),
                pred: PredRef::NONE,
            },
            cfg(1, 1),
        ]);
        let (id, _) = dfa.intern_state(set, &|s| s == stop);
        let st = dfa.state(id);
        assert!(st.is_accept);
        assert_eq!(st.prediction, Some(Alt::new(2)));
        assert!(st.predicates.is_empty());
    }

    #[test]
    fn start_table_per_mode() {
        let mut dfa = Dfa::new(DecisionIdx::new(0));
        let (a, _) = dfa.intern_state(ConfigSet::new(vec![cfg(1, 1)]), &no_accept);
        assert_eq!(dfa.start(CtxMode::Sll), None);
        dfa.set_start(CtxMode::Sll, a);
        assert_eq!(dfa.start(CtxMode::Sll), Some(a));
        assert_eq!(dfa.start(CtxMode::Full), None);
    }
}
