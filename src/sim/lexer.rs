use std::sync::{Arc, Mutex};

use anyhow::{ensure, Result};

use crate::api::{CancelToken, RuntimeLimits, SimStats};
use crate::atn::{AtnView, DecisionIdx, LexerAction, Symbol};
use crate::error::{FailureContext, FailureKind, RecognitionError};
use crate::logging::Logger;
use crate::streams::{BufferStream, SymbolStream};

use super::dfa::Dfa;
use super::prediction::{Policy, PredictionEngine};

pub const DEFAULT_CHANNEL: u32 = 0;

/// A recognized token: type, channel, the half-open input span it
/// covers, and the lexical mode it was matched in.  Text is recovered
/// through [`LexerInterpreter::token_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub ttype: Symbol,
    pub channel: u32,
    pub start: usize,
    pub stop: usize,
    pub mode: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.ttype.is_eof()
    }

    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }
}

/// Interprets a compiled lexer automaton against a character stream.
///
/// Holds the grammar's symbolic name tables and one lazily-populated
/// DFA per decision.  The DFAs sit behind `Arc<Mutex<_>>` so sessions
/// created by [`LexerInterpreter::session_with_input`] share and warm
/// the same caches; granularity is per decision, so unrelated
/// decisions never contend.
#[derive(Clone)]
pub struct LexerInterpreter {
    grammar_file_name: String,
    view: Arc<dyn AtnView>,
    token_names: Vec<String>,
    rule_names: Vec<String>,
    mode_names: Vec<String>,
    dfas: Vec<Arc<Mutex<Dfa>>>,
    stream: BufferStream,
    mode: usize,
    mode_stack: Vec<usize>,
    limits: RuntimeLimits,
    cancel: Option<CancelToken>,
    stats: SimStats,
    pub logger: Logger,
}

impl LexerInterpreter {
    pub fn new(
        grammar_file_name: impl Into<String>,
        token_names: Vec<String>,
        rule_names: Vec<String>,
        mode_names: Vec<String>,
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
        ensure!(
            mode_names.len() == view.mode_count(),
            "mode name table has {} entries, automaton has {} modes",
            mode_names.len(),
            view.mode_count()
        );
        let dfas = (0..view.decision_count())
            .map(|d| Arc::new(Mutex::new(Dfa::new(DecisionIdx::new(d)))))
            .collect();
        Ok(LexerInterpreter {
            grammar_file_name: grammar_file_name.into(),
            view,
            token_names,
            rule_names,
            mode_names,
            dfas,
            stream: input,
            mode: 0,
            mode_stack: Vec::new(),
            limits,
            cancel: None,
            stats: SimStats::default(),
            logger: Logger::default(),
        })
    }

    /// New session over different input, sharing the warmed DFA
    /// caches with `self`.
    pub fn session_with_input(&self, input: BufferStream) -> Self {
        let mut copy = self.clone();
        copy.stream = input;
        copy.mode = 0;
        copy.mode_stack.clear();
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

    /// Match and return the next token, applying skip/channel/mode
    /// actions attached to the accepted alternative.  At end of input
    /// an EOF token with an empty span is returned.
    pub fn next_token(&mut self) -> Result<Token, RecognitionError> {
        let mut channel = DEFAULT_CHANNEL;
        loop {
            if self.stream.la(1).is_eof() {
                let pos = self.stream.index();
                return Ok(Token {
                    ttype: Symbol::EOF,
                    channel,
                    start: pos,
                    stop: pos,
                    mode: self.mode,
                });
            }

            let decision = self.view.mode_decision(self.mode);
            let prediction = {
                let mut engine = PredictionEngine::new(
                    self.view.as_ref(),
                    &self.grammar_file_name,
                    self.limits,
                );
                if let Some(token) = &self.cancel {
                    engine = engine.with_cancel(token.clone());
                }
                let dfa = &self.dfas[decision.as_usize()];
                let mut dfa = dfa.lock().unwrap();
                engine.resolve(
                    &mut dfa,
                    Policy::LongestMatch,
                    self.view.empty_context(),
                    &mut self.stream,
                    &mut self.stats,
                )?
            };

            if prediction.lookahead == 0 {
                // a zero-width token would never advance the cursor
                return Err(RecognitionError::cancelled(
                    format!(
                        "zero-width match for rule {} in mode {}",
                        self.rule_name(prediction.alt.as_usize() - 1),
                        self.mode_name(self.mode),
                    ),
                    FailureContext::new(&self.grammar_file_name, self.stream.index()),
                ));
            }

            let start = self.stream.index();
            for _ in 0..prediction.lookahead {
                self.stream.consume();
            }
            let stop = self.stream.index();
            let matched_mode = self.mode;

            let mut skip = false;
            match self.view.lexer_action(decision, prediction.alt) {
                None => {}
                Some(LexerAction::Skip) => skip = true,
                Some(LexerAction::Channel(c)) => channel = c,
                Some(LexerAction::Mode(m)) => self.mode = m,
                Some(LexerAction::PushMode(m)) => {
                    self.mode_stack.push(self.mode);
                    self.mode = m;
                }
                Some(LexerAction::PopMode) => match self.mode_stack.pop() {
                    Some(m) => self.mode = m,
                    None => {
                        return Err(RecognitionError::new(
                            FailureKind::EmptyStack,
                            FailureContext::new(&self.grammar_file_name, self.stream.index()),
                        ))
                    }
                },
            }
            if skip {
                continue;
            }

            return Ok(Token {
                ttype: self.view.token_type(decision, prediction.alt),
                channel,
                start,
                stop,
                mode: matched_mode,
            });
        }
    }

    /// Drain the stream; the terminating EOF token is not included.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, RecognitionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            if tok.is_eof() {
                crate::infoln!(
                    self,
                    "tokenized {} tokens, {} new DFA states",
                    tokens.len(),
                    self.stats.dfa_states
                );
                return Ok(tokens);
            }
            tokens.push(tok);
        }
    }

    pub fn token_text(&self, tok: &Token) -> String {
        self.stream.text(tok.start, tok.stop)
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

    pub fn mode_names(&self) -> &[String] {
        &self.mode_names
    }

    pub fn token_name(&self, ttype: Symbol) -> String {
        if ttype.is_eof() {
            return "<EOF>".to_string();
        }
        self.token_names
            .get(ttype.0 as usize)
            .cloned()
            .unwrap_or_else(|| format!("<{}>", ttype.0))
    }

    pub fn rule_name(&self, idx: usize) -> String {
        self.rule_names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("<rule {}>", idx))
    }

    pub fn mode_name(&self, idx: usize) -> String {
        self.mode_names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("<mode {}>", idx))
    }

    pub fn current_mode(&self) -> usize {
        self.mode
    }

    pub fn stats(&self) -> &SimStats {
        &self.stats
    }

    /// Per-decision cache sizes, for diagnostics.
    pub fn dfa_sizes(&self) -> Vec<usize> {
        self.dfas
            .iter()
            .map(|d| d.lock().unwrap().num_states())
            .collect()
    }
}
