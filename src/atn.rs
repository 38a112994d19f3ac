use std::fmt::Debug;

/// AtnStateId identifies a state in the augmented transition network.
/// The network itself is external to this crate; we only ever hold ids
/// handed to us by an [`AtnView`].
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct AtnStateId(u32);

impl AtnStateId {
    pub fn new(id: usize) -> Self {
        AtnStateId(id.try_into().expect("ATN state id too large"))
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Index of a decision point in the grammar.  Every decision owns one
/// lazily-populated DFA; see `sim::dfa`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct DecisionIdx(usize);

impl DecisionIdx {
    pub fn new(idx: usize) -> Self {
        DecisionIdx(idx)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// A predicted alternative.  Alternatives are numbered from 1, in
/// declaration order, so "lowest alternative wins" matches
/// first-declared-wins grammar semantics.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Alt(u32);

impl Alt {
    pub fn new(n: usize) -> Self {
        assert!(n >= 1, "alternatives are numbered from 1");
        Alt(n as u32)
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// An input symbol: a character for lexing, a token type for parsing.
/// `Symbol::EOF` is the end-of-stream sentinel; it sits outside the
/// valid symbol range and never collides with a real symbol.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Symbol(pub i32);

impl Symbol {
    pub const EOF: Symbol = Symbol(-1);

    pub fn is_eof(&self) -> bool {
        *self == Symbol::EOF
    }
}

/// Opaque handle to a prediction context (a structurally-shared,
/// simulated rule-invocation stack).  Produced and interpreted only by
/// the [`AtnView`]; this crate relies solely on its equality/hash.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CtxRef(pub u32);

/// Handle to a semantic predicate stored in the automaton.
/// `PredRef::NONE` marks an unguarded configuration.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PredRef(pub u32);

impl PredRef {
    pub const NONE: PredRef = PredRef(u32::MAX);

    pub fn is_none(&self) -> bool {
        *self == PredRef::NONE
    }
}

/// A terminal transition out of an ATN state.  Epsilon and
/// predicate-guarded edges never show up here; they are folded into
/// the view's closure operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Atom(Symbol),
    Range(Symbol, Symbol),
}

/// A labeled edge: terminal transition plus its target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub label: Transition,
    pub target: AtnStateId,
}

impl Edge {
    pub fn matches(&self, sym: Symbol) -> bool {
        if sym.is_eof() {
            return false;
        }
        match self.label {
            Transition::Atom(s) => s == sym,
            Transition::Range(lo, hi) => lo <= sym && sym <= hi,
        }
    }
}

/// One (state, stack, guard) element of a closure result.  The
/// predicted alternative is attached by the engine, which knows which
/// alternative it was closing.
#[derive(Debug, Clone, Copy)]
pub struct ClosureConfig {
    pub state: AtnStateId,
    pub ctx: CtxRef,
    pub pred: PredRef,
}

/// Action attached to a lexer alternative, applied after a token is
/// accepted and before the next one is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerAction {
    Skip,
    Channel(u32),
    Mode(usize),
    PushMode(usize),
    PopMode,
}

/// Read-only view of the augmented transition network.
///
/// The crate consumes the grammar automaton through this trait and
/// never constructs or mutates it.  `closure` is the transition
/// oracle: it expands epsilon edges and simulated rule invocations
/// from one (state, stack) pair.  When `full_ctx` is false the view
/// is expected to approximate the stack (SLL mode); when true it must
/// follow `ctx` exactly.
pub trait AtnView: Send + Sync {
    fn closure(&self, state: AtnStateId, ctx: CtxRef, full_ctx: bool) -> Vec<ClosureConfig>;

    /// Terminal edges leaving `state`.
    fn edges_from(&self, state: AtnStateId) -> &[Edge];

    fn rule_count(&self) -> usize;
    fn decision_count(&self) -> usize;
    fn mode_count(&self) -> usize;

    /// The ATN state a decision starts from.
    fn decision_state(&self, decision: DecisionIdx) -> AtnStateId;

    /// Entry state per alternative of a decision; element `i`
    /// corresponds to alternative `i + 1`.
    fn decision_alts(&self, decision: DecisionIdx) -> Vec<AtnStateId>;

    /// True for rule-stop states: a configuration sitting here has
    /// matched a complete alternative.
    fn is_accept_state(&self, state: AtnStateId) -> bool;

    /// Evaluate a semantic predicate against a context snapshot.
    fn eval_predicate(&self, pred: PredRef, ctx: CtxRef) -> bool;

    /// The empty simulation stack used for approximate prediction.
    fn empty_context(&self) -> CtxRef;

    /// Root decision driving tokenization in the given lexical mode.
    fn mode_decision(&self, mode: usize) -> DecisionIdx;

    /// Token type emitted when `decision` resolves to `alt`.
    /// Defaults to the alternative number itself.
    fn token_type(&self, _decision: DecisionIdx, alt: Alt) -> Symbol {
        Symbol(alt.as_usize() as i32)
    }

    /// Lexer action attached to `alt` of `decision`, if any.
    fn lexer_action(&self, _decision: DecisionIdx, _alt: Alt) -> Option<LexerAction> {
        None
    }
}
