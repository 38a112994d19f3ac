use std::collections::HashMap;

use atnsim::atn::{
    Alt, AtnStateId, AtnView, ClosureConfig, CtxRef, DecisionIdx, Edge, LexerAction, PredRef,
    Symbol, Transition,
};

pub fn sym(c: char) -> Symbol {
    Symbol(c as i32)
}

/// Hand-built automaton for exercising the prediction core.  Closure
/// defaults to the identity (a state closes to itself, keeping its
/// context and optional guard); tests that need rule-invocation
/// effects override closure results per state and per context mode.
pub struct ToyAtn {
    edges: Vec<Vec<Edge>>,
    accept: Vec<bool>,
    guards: HashMap<usize, PredRef>,
    pred_values: HashMap<u32, bool>,
    decisions: Vec<(AtnStateId, Vec<AtnStateId>)>,
    mode_decisions: Vec<DecisionIdx>,
    sll_closure: HashMap<usize, Vec<ClosureConfig>>,
    full_closure: HashMap<usize, Vec<ClosureConfig>>,
    actions: HashMap<(usize, usize), LexerAction>,
    token_types: HashMap<(usize, usize), Symbol>,
    num_rules: usize,
}

#[allow(dead_code)]
impl ToyAtn {
    pub fn new(num_rules: usize) -> Self {
        ToyAtn {
            edges: Vec::new(),
            accept: Vec::new(),
            guards: HashMap::new(),
            pred_values: HashMap::new(),
            decisions: Vec::new(),
            mode_decisions: Vec::new(),
            sll_closure: HashMap::new(),
            full_closure: HashMap::new(),
            actions: HashMap::new(),
            token_types: HashMap::new(),
            num_rules,
        }
    }

    pub fn add_state(&mut self) -> AtnStateId {
        let id = AtnStateId::new(self.edges.len());
        self.edges.push(Vec::new());
        self.accept.push(false);
        id
    }

    pub fn add_accept_state(&mut self) -> AtnStateId {
        let id = self.add_state();
        self.accept[id.as_usize()] = true;
        id
    }

    pub fn add_edge(&mut self, from: AtnStateId, label: Transition, target: AtnStateId) {
        self.edges[from.as_usize()].push(Edge { label, target });
    }

    pub fn atom_edge(&mut self, from: AtnStateId, c: char, target: AtnStateId) {
        self.add_edge(from, Transition::Atom(sym(c)), target);
    }

    /// Register a decision: its ATN state plus one entry state per
    /// alternative (element `i` is alternative `i + 1`).
    pub fn add_decision(&mut self, state: AtnStateId, alts: Vec<AtnStateId>) -> DecisionIdx {
        let idx = DecisionIdx::new(self.decisions.len());
        self.decisions.push((state, alts));
        idx
    }

    pub fn add_mode(&mut self, decision: DecisionIdx) -> usize {
        self.mode_decisions.push(decision);
        self.mode_decisions.len() - 1
    }

    /// Attach a predicate guard collected whenever closure passes
    /// through `state`.
    pub fn guard(&mut self, state: AtnStateId, pred: PredRef, holds: bool) {
        self.guards.insert(state.as_usize(), pred);
        self.pred_values.insert(pred.0, holds);
    }

    pub fn set_closure_sll(&mut self, state: AtnStateId, configs: Vec<ClosureConfig>) {
        self.sll_closure.insert(state.as_usize(), configs);
    }

    pub fn set_closure_full(&mut self, state: AtnStateId, configs: Vec<ClosureConfig>) {
        self.full_closure.insert(state.as_usize(), configs);
    }

    pub fn set_action(&mut self, decision: DecisionIdx, alt: usize, action: LexerAction) {
        self.actions.insert((decision.as_usize(), alt), action);
    }

    pub fn set_token_type(&mut self, decision: DecisionIdx, alt: usize, ttype: Symbol) {
        self.token_types.insert((decision.as_usize(), alt), ttype);
    }

    fn identity_closure(&self, state: AtnStateId, ctx: CtxRef) -> Vec<ClosureConfig> {
        let pred = self
            .guards
            .get(&state.as_usize())
            .copied()
            .unwrap_or(PredRef::NONE);
        vec![ClosureConfig { state, ctx, pred }]
    }
}

impl AtnView for ToyAtn {
    fn closure(&self, state: AtnStateId, ctx: CtxRef, full_ctx: bool) -> Vec<ClosureConfig> {
        let table = if full_ctx {
            &self.full_closure
        } else {
            &self.sll_closure
        };
        match table.get(&state.as_usize()) {
            Some(configs) => configs.clone(),
            None => self.identity_closure(state, ctx),
        }
    }

    fn edges_from(&self, state: AtnStateId) -> &[Edge] {
        &self.edges[state.as_usize()]
    }

    fn rule_count(&self) -> usize {
        self.num_rules
    }

    fn decision_count(&self) -> usize {
        self.decisions.len()
    }

    fn mode_count(&self) -> usize {
        self.mode_decisions.len()
    }

    fn decision_state(&self, decision: DecisionIdx) -> AtnStateId {
        self.decisions[decision.as_usize()].0
    }

    fn decision_alts(&self, decision: DecisionIdx) -> Vec<AtnStateId> {
        self.decisions[decision.as_usize()].1.clone()
    }

    fn is_accept_state(&self, state: AtnStateId) -> bool {
        self.accept[state.as_usize()]
    }

    fn eval_predicate(&self, pred: PredRef, _ctx: CtxRef) -> bool {
        *self.pred_values.get(&pred.0).unwrap_or(&false)
    }

    fn empty_context(&self) -> CtxRef {
        CtxRef(0)
    }

    fn mode_decision(&self, mode: usize) -> DecisionIdx {
        self.mode_decisions[mode]
    }

    fn token_type(&self, decision: DecisionIdx, alt: Alt) -> Symbol {
        self.token_types
            .get(&(decision.as_usize(), alt.as_usize()))
            .copied()
            .unwrap_or(Symbol(alt.as_usize() as i32))
    }

    fn lexer_action(&self, decision: DecisionIdx, alt: Alt) -> Option<LexerAction> {
        self.actions
            .get(&(decision.as_usize(), alt.as_usize()))
            .copied()
    }
}

/// Decision D1 from the concrete test scenarios: two alternatives,
/// alt 1 matches `a`, alt 2 matches `b`.
#[allow(dead_code)]
pub fn d1_atn() -> (ToyAtn, DecisionIdx) {
    let mut atn = ToyAtn::new(2);
    let d = atn.add_state();
    let e1 = atn.add_state();
    let e2 = atn.add_state();
    let f1 = atn.add_accept_state();
    let f2 = atn.add_accept_state();
    atn.atom_edge(e1, 'a', f1);
    atn.atom_edge(e2, 'b', f2);
    let decision = atn.add_decision(d, vec![e1, e2]);
    (atn, decision)
}
