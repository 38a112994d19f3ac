use instant::Instant;

use crate::api::{CancelToken, RuntimeLimits, SimStats};
use crate::atn::{Alt, AtnStateId, AtnView, CtxRef, PredRef, Symbol};
use crate::error::{FailureContext, FailureKind, RecognitionError, SymbolAt};
use crate::streams::SymbolStream;

use super::config::{AtnConfig, ConfigSet};
use super::dfa::{CtxMode, Dfa, DfaState, DfaStateId};

const TRACE: bool = false;

macro_rules! trace {
    ($($arg:tt)*) => {
        if cfg!(feature = "logging") && TRACE {
            eprintln!($($arg)*);
        }
    }
}

/// How a resolution finalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Stop as soon as every surviving configuration predicts the
    /// same alternative.  Used for parser decisions, where the engine
    /// only has to pick an alternative.
    FirstUniqueAlt,
    /// Keep extending while edges survive and fall back to the last
    /// accepting state when stuck.  Used for lexing, where the match
    /// length determines the token text.
    LongestMatch,
}

/// A resolved decision: the chosen alternative and the number of
/// input symbols that back it (the matched length for a lexer
/// decision).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub alt: Alt,
    pub lookahead: usize,
}

enum Outcome {
    Done(Prediction),
    /// SLL prediction hit a genuine conflict; retry in full-context
    /// mode.
    Escalate,
}

/// Drives one decision through its DFA cache, falling back to ATN
/// closure for missing edges and installing what it discovers.
///
/// The engine holds no mutable state of its own: every side effect
/// lands in the `Dfa` passed to [`PredictionEngine::resolve`], so
/// cancellation needs no undo and partially-installed entries stay
/// valid for the next session.
pub struct PredictionEngine<'a> {
    view: &'a dyn AtnView,
    recognizer: String,
    limits: RuntimeLimits,
    cancel: Option<CancelToken>,
}

impl<'a> PredictionEngine<'a> {
    pub fn new(view: &'a dyn AtnView, recognizer: impl Into<String>, limits: RuntimeLimits) -> Self {
        PredictionEngine {
            view,
            recognizer: recognizer.into(),
            limits,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Resolve the decision owned by `dfa` against the stream's
    /// current position.  Lookahead never consumes; the caller
    /// decides what to do with `Prediction::lookahead`.
    pub fn resolve(
        &self,
        dfa: &mut Dfa,
        policy: Policy,
        outer_ctx: CtxRef,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<Prediction, RecognitionError> {
        let t0 = Instant::now();
        stats.predict_calls += 1;
        let mark = stream.mark();
        let res = self.resolve_with_escalation(dfa, policy, outer_ctx, stream, stats);
        stream
            .release(mark)
            .expect("lookahead mark released exactly once");
        stats.compute_time_us += t0.elapsed().as_micros() as u64;
        res
    }

    fn resolve_with_escalation(
        &self,
        dfa: &mut Dfa,
        policy: Policy,
        outer_ctx: CtxRef,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<Prediction, RecognitionError> {
        match self.resolve_inner(dfa, CtxMode::Sll, policy, outer_ctx, stream, stats)? {
            Outcome::Done(p) => Ok(p),
            Outcome::Escalate => {
                stats.full_ctx_retries += 1;
                trace!("decision {:?}: escalating to full-context", dfa.decision());
                match self.resolve_inner(dfa, CtxMode::Full, policy, outer_ctx, stream, stats)? {
                    Outcome::Done(p) => Ok(p),
                    // full-context is the terminal fallback
                    Outcome::Escalate => unreachable!("full-context prediction escalated"),
                }
            }
        }
    }

    fn resolve_inner(
        &self,
        dfa: &mut Dfa,
        mode: CtxMode,
        policy: Policy,
        outer_ctx: CtxRef,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<Outcome, RecognitionError> {
        let full_ctx = mode == CtxMode::Full;
        let sim_ctx = if full_ctx {
            outer_ctx
        } else {
            self.view.empty_context()
        };
        let closures0 = stats.closures;
        let decision_state = self.view.decision_state(dfa.decision());

        let mut cur = self.start_state(dfa, mode, sim_ctx, stream, stats)?;
        let mut deepest = decision_state;

        // last accepting state seen and the depth it was seen at
        let mut last_accept: Option<(DfaStateId, usize)> = None;
        if dfa.state(cur).is_accept {
            last_accept = Some((cur, 0));
        }

        let mut depth = 0usize;
        loop {
            self.check_budget(dfa, stream, stats.closures - closures0, depth)?;

            let st = dfa.state(cur);
            if !full_ctx && st.requires_full_context {
                // conflict already diagnosed on an earlier pass
                return Ok(Outcome::Escalate);
            }
            if let Some(alts) = st.configs.conflicting_alts() {
                if st.predicates.is_empty() && !self.has_guards(st) {
                    if full_ctx {
                        // terminal fallback: lowest conflicting
                        // alternative wins
                        return Ok(Outcome::Done(Prediction {
                            alt: alts[0],
                            lookahead: depth,
                        }));
                    }
                    dfa.state_mut(cur).requires_full_context = true;
                    return Ok(Outcome::Escalate);
                }
                // guarded conflict: predicates disambiguate at
                // acceptance, no escalation needed
                let p = self.finish_state(dfa.state(cur), depth, outer_ctx, stream)?;
                return Ok(Outcome::Done(p));
            }

            if policy == Policy::FirstUniqueAlt {
                let alts = st.configs.alts();
                if alts.len() == 1 {
                    let p = self.finish_state(st, depth, outer_ctx, stream)?;
                    return Ok(Outcome::Done(p));
                }
            }

            let sym = stream.la(depth + 1);
            let next = match dfa.edge(cur, sym) {
                Some(id) => id,
                None => self.compute_edge(dfa, cur, sym, full_ctx, stream, stats)?,
            };

            if next.is_error() {
                return match last_accept {
                    Some((acc, acc_depth)) => {
                        let p = self.finish_state(dfa.state(acc), acc_depth, outer_ctx, stream)?;
                        Ok(Outcome::Done(p))
                    }
                    None => Err(self.no_viable_alt(deepest, sym, depth, outer_ctx, stream)),
                };
            }

            depth += 1;
            cur = next;
            let st = dfa.state(cur);
            if let Some(d) = st.configs.iter().map(|c| c.state).max() {
                deepest = deepest.max(d);
            }
            if st.is_accept {
                last_accept = Some((cur, depth));
            }
        }
    }

    /// Fetch or build the start state for `mode`.  Full-context
    /// resolution with a caller-supplied stack cannot reuse the start
    /// slot (the slot would alias across different stacks), but still
    /// interns into the shared arena.
    fn start_state(
        &self,
        dfa: &mut Dfa,
        mode: CtxMode,
        sim_ctx: CtxRef,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<DfaStateId, RecognitionError> {
        let cacheable = mode == CtxMode::Sll || sim_ctx == self.view.empty_context();
        if cacheable {
            if let Some(id) = dfa.start(mode) {
                return Ok(id);
            }
        }

        let full_ctx = mode == CtxMode::Full;
        let mut configs = Vec::new();
        for (i, entry) in self.view.decision_alts(dfa.decision()).iter().enumerate() {
            let alt = Alt::new(i + 1);
            stats.closures += 1;
            for cc in self.view.closure(*entry, sim_ctx, full_ctx) {
                configs.push(AtnConfig {
                    state: cc.state,
                    alt,
                    ctx: cc.ctx,
                    pred: cc.pred,
                });
            }
        }
        let set = ConfigSet::new(configs);
        if set.is_empty() {
            let deepest = self.view.decision_state(dfa.decision());
            return Err(self.no_viable_alt(deepest, stream.la(1), 0, sim_ctx, stream));
        }
        let id = self.intern(dfa, set, stream, stats)?;
        if cacheable {
            dfa.set_start(mode, id);
        }
        Ok(id)
    }

    /// Move every configuration of `from` on `sym`, close the result,
    /// intern it, and install the edge.  An empty successor installs
    /// an explicit edge to the error state.
    fn compute_edge(
        &self,
        dfa: &mut Dfa,
        from: DfaStateId,
        sym: Symbol,
        full_ctx: bool,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<DfaStateId, RecognitionError> {
        let mut configs = Vec::new();
        let src = dfa.state(from).configs.clone();
        for c in src.iter() {
            for edge in self.view.edges_from(c.state) {
                if !edge.matches(sym) {
                    continue;
                }
                stats.closures += 1;
                for cc in self.view.closure(edge.target, c.ctx, full_ctx) {
                    let pred = if cc.pred.is_none() { c.pred } else { cc.pred };
                    configs.push(AtnConfig {
                        state: cc.state,
                        alt: c.alt,
                        ctx: cc.ctx,
                        pred,
                    });
                }
            }
        }
        let set = ConfigSet::new(configs);
        let target = if set.is_empty() {
            DfaStateId::ERROR
        } else {
            self.intern(dfa, set, stream, stats)?
        };
        dfa.set_edge(from, sym, target);
        stats.transitions += 1;
        trace!("installed edge {:?} --{:?}--> {:?}", from, sym, target);
        Ok(target)
    }

    fn intern(
        &self,
        dfa: &mut Dfa,
        set: ConfigSet,
        stream: &mut dyn SymbolStream,
        stats: &mut SimStats,
    ) -> Result<DfaStateId, RecognitionError> {
        if dfa.num_states() >= self.limits.max_dfa_states {
            return Err(RecognitionError::cancelled(
                format!("DFA state limit reached ({})", self.limits.max_dfa_states),
                FailureContext::new(&self.recognizer, stream.index()),
            ));
        }
        let view = self.view;
        let (id, created) = dfa.intern_state(set, &|s| view.is_accept_state(s));
        if created {
            stats.dfa_states += 1;
        }
        Ok(id)
    }

    /// Pick the winning alternative of a finalized state.  Unguarded
    /// alternatives win by lowest number; guarded ones only when
    /// their predicate holds.  All-guards-false is a failure.
    fn finish_state(
        &self,
        st: &DfaState,
        depth: usize,
        pred_ctx: CtxRef,
        stream: &mut dyn SymbolStream,
    ) -> Result<Prediction, RecognitionError> {
        // fast path: accepting without predicates, the cached
        // prediction is the lowest accepting alternative
        if st.is_accept && st.predicates.is_empty() {
            if let Some(alt) = st.prediction {
                return Ok(Prediction {
                    alt,
                    lookahead: depth,
                });
            }
        }

        // When the state accepts, only configurations sitting on a
        // rule-stop state are candidates; otherwise all survivors are.
        let candidates: Vec<&AtnConfig> = if st.is_accept {
            st.configs
                .iter()
                .filter(|c| self.view.is_accept_state(c.state))
                .collect()
        } else {
            st.configs.iter().collect()
        };

        let mut alts: Vec<Alt> = candidates.iter().map(|c| c.alt).collect();
        alts.sort_unstable();
        alts.dedup();

        let mut evaluated = 0usize;
        let mut last_pred = PredRef::NONE;
        for alt in alts {
            let mut guards: Vec<PredRef> = Vec::new();
            let mut unguarded = false;
            for c in candidates.iter().filter(|c| c.alt == alt) {
                if c.pred.is_none() {
                    unguarded = true;
                    break;
                }
                if !guards.contains(&c.pred) {
                    guards.push(c.pred);
                }
            }
            if unguarded {
                return Ok(Prediction {
                    alt,
                    lookahead: depth,
                });
            }
            for pred in guards {
                evaluated += 1;
                last_pred = pred;
                if self.view.eval_predicate(pred, pred_ctx) {
                    return Ok(Prediction {
                        alt,
                        lookahead: depth,
                    });
                }
            }
        }

        assert!(evaluated > 0, "finalized state with no viable candidate");
        Err(RecognitionError::new(
            FailureKind::FailedPredicate {
                pred: last_pred,
                evaluated,
            },
            FailureContext::new(&self.recognizer, stream.index()).with_rule_ctx(pred_ctx),
        ))
    }

    fn has_guards(&self, st: &DfaState) -> bool {
        st.configs.iter().any(|c| !c.pred.is_none())
    }

    fn no_viable_alt(
        &self,
        deepest: AtnStateId,
        sym: Symbol,
        depth: usize,
        ctx: CtxRef,
        stream: &mut dyn SymbolStream,
    ) -> RecognitionError {
        RecognitionError::new(
            FailureKind::NoViableAlternative {
                deepest_state: deepest,
            },
            FailureContext::new(&self.recognizer, stream.index())
                .with_rule_ctx(ctx)
                .with_offending(SymbolAt {
                    symbol: sym,
                    index: stream.index() + depth,
                })
                .with_offending_state(deepest),
        )
    }

    fn check_budget(
        &self,
        dfa: &Dfa,
        stream: &mut dyn SymbolStream,
        closures_used: usize,
        depth: usize,
    ) -> Result<(), RecognitionError> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(RecognitionError::cancelled(
                    "cancelled by caller",
                    FailureContext::new(&self.recognizer, stream.index()),
                ));
            }
        }
        if depth > self.limits.max_lookahead {
            return Err(RecognitionError::cancelled(
                format!(
                    "lookahead limit reached ({}) for decision {:?}",
                    self.limits.max_lookahead,
                    dfa.decision()
                ),
                FailureContext::new(&self.recognizer, stream.index()),
            ));
        }
        if closures_used as u64 > self.limits.closure_fuel {
            return Err(RecognitionError::cancelled(
                format!("closure fuel exhausted ({})", self.limits.closure_fuel),
                FailureContext::new(&self.recognizer, stream.index()),
            ));
        }
        Ok(())
    }
}
