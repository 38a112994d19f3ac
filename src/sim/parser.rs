use std::sync::{Arc, Mutex};

use anyhow::{ensure, Result};

use crate::api::{CancelToken, RuntimeLimits, SimStats};
use crate::atn::{Alt, AtnView, CtxRef, DecisionIdx, Symbol};
use crate::error::{FailureContext, FailureKind, RecognitionError, SymbolAt};
use crate::logging::Logger;
use crate::streams::{BufferStream, SymbolStream};

use super::dfa::Dfa;
use super::prediction::{Policy, PredictionEngine};

/// Interprets a compiled parser automaton against a token stream.
///
/// Rule-walking itself belongs to the automaton's owner; this shell
/// supplies the two operations a rule body needs — adaptive
/// prediction at decision points and straight-line terminal matching
/// — plus the symbolic metadata diagnostics want.  One DFA per
/// decision, shared across sessions exactly as in the lexer shell.
#[derive(Clone)]
pub struct ParserInterpreter {
    grammar_file_name: String,
    view: Arc<dyn AtnView>,
    token_names: Vec<String>,
    rule_names: Vec<String>,
    dfas: Vec<Arc<Mutex<Dfa>>>,
    stream: BufferStream,
    rule_stack: Vec<usize>,
    limits: RuntimeLimits,
    cancel: Option<CancelToken>,
    stats: SimStats,
    pub logger: Logger,
}

impl ParserInterpreter {
    pub fn new(
        grammar_file_name: impl Into<String>,
        token_names: Vec<String>,
        rule_names: Vec<String>,
        view: Arc<dyn AtnView>,
        input: BufferStream,
        limits: RuntimeLimits,
    ) -> Result<Self> {
        ensure!(
            rule_names.len() == view.rule_count(),
            "rule name table has {} entries, automaton has {} rules",
            rule_names.len(),
            view.rule_count()
        );
        let dfas = (0..view.decision_count())
            .map(|d| Arc::new(Mutex::new(Dfa::new(DecisionIdx::new(d)))))
            .collect();
        Ok(ParserInterpreter {
            grammar_file_name: grammar_file_name.into(),
            view,
            token_names,
            rule_names,
            dfas,
            stream: input,
            rule_stack: Vec::new(),
            limits,
            cancel: None,
            stats: SimStats::default(),
            logger: Logger::default(),
        })
    }

    /// New session over different input, sharing warmed DFA caches.
    pub fn session_with_input(&self, input: BufferStream) -> Self {
        let mut copy = self.clone();
        copy.stream = input;
        copy.rule_stack.clear();
        copy.stats = SimStats::default();
        copy
    }

    /// Detach the DFA caches as well; the copy starts cold.
    pub fn deep_clone(&self) -> Self {
        let mut copy = self.clone();
        copy.dfas = self
            .dfas
            .iter()
            .map(|d| Arc::new(Mutex::new(d.lock().unwrap().clone())))
            .collect();
        copy
    }

    pub fn set_cancel(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Resolve a decision point.  `ctx_snapshot` is the live
    /// simulated call stack at the invocation site; it is only
    /// consulted if approximate prediction reports a genuine conflict
    /// and the engine escalates to full-context mode.
    pub fn predict(
        &mut self,
        decision: DecisionIdx,
        ctx_snapshot: CtxRef,
    ) -> Result<Alt, RecognitionError> {
        assert!(
            decision.as_usize() < self.dfas.len(),
            "decision {:?} out of range ({} decisions)",
            decision,
            self.dfas.len()
        );
        let mut engine =
            PredictionEngine::new(self.view.as_ref(), &self.grammar_file_name, self.limits);
        if let Some(token) = &self.cancel {
            engine = engine.with_cancel(token.clone());
        }
        let retries_before = self.stats.full_ctx_retries;
        let dfa = &self.dfas[decision.as_usize()];
        let mut dfa = dfa.lock().unwrap();
        let prediction = engine.resolve(
            &mut dfa,
            Policy::FirstUniqueAlt,
            ctx_snapshot,
            &mut self.stream,
            &mut self.stats,
        )?;
        drop(dfa);
        if self.stats.full_ctx_retries > retries_before {
            crate::warn!(self, "decision {:?} required full-context resolution", decision);
        }
        Ok(prediction.alt)
    }

    /// Match one terminal outside a decision: consume the expected
    /// symbol or raise `InputMismatch`.
    pub fn match_symbol(&mut self, expected: Symbol) -> Result<Symbol, RecognitionError> {
        let actual = self.stream.la(1);
        if actual != expected {
            return Err(RecognitionError::new(
                FailureKind::InputMismatch { expected },
                FailureContext::new(&self.grammar_file_name, self.stream.index()).with_offending(
                    SymbolAt {
                        symbol: actual,
                        index: self.stream.index(),
                    },
                ),
            ));
        }
        self.stream.consume();
        Ok(actual)
    }

    pub fn enter_rule(&mut self, rule_idx: usize) {
        assert!(rule_idx < self.view.rule_count(), "unknown rule {}", rule_idx);
        self.rule_stack.push(rule_idx);
    }

    /// Return from the current rule.  Underflow means the automaton
    /// or context construction is defective.
    pub fn exit_rule(&mut self) -> Result<usize, RecognitionError> {
        self.rule_stack.pop().ok_or_else(|| {
            RecognitionError::new(
                FailureKind::EmptyStack,
                FailureContext::new(&self.grammar_file_name, self.stream.index()),
            )
        })
    }

    /// The rule-invocation stack, outermost first, rendered with rule
    /// names for diagnostics.
    pub fn rule_stack_names(&self) -> Vec<String> {
        self.rule_stack
            .iter()
            .map(|&idx| {
                self.rule_names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("<rule {}>", idx))
            })
            .collect()
    }

    pub fn rule_stack(&self) -> &[usize] {
        &self.rule_stack
    }

    pub fn grammar_file_name(&self) -> &str {
        &self.grammar_file_name
    }

    pub fn token_names(&self) -> &[String] {
        &self.token_names
    }

    pub fn rule_names(&self) -> &[String] {
        &self.rule_names
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    pub fn stream_index(&self) -> usize {
        self.stream.index()
    }

    /// Per-decision cache sizes, for diagnostics.
    pub fn dfa_sizes(&self) -> Vec<usize> {
        self.dfas
            .iter()
            .map(|d| d.lock().unwrap().num_states())
            .collect()
    }
}
