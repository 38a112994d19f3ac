use std::fmt;

use crate::atn::{AtnStateId, CtxRef, PredRef, Symbol};

/// A symbol observed at a specific input position; the "offending
/// token" of a failure.  Absent when the failure fired before
/// lookahead materialized a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolAt {
    pub symbol: Symbol,
    pub index: usize,
}

/// Context shared by every recognition failure: which recognizer it
/// came from, where the input cursor was, and snapshots of the rule
/// context and automaton state when known.  Immutable once the
/// failure is built; the `with_*` setters are construction-only.
#[derive(Debug, Clone)]
pub struct FailureContext {
    pub recognizer: String,
    pub input_index: usize,
    pub rule_ctx: Option<CtxRef>,
    pub offending: Option<SymbolAt>,
    pub offending_state: Option<AtnStateId>,
}

impl FailureContext {
    pub fn new(recognizer: impl Into<String>, input_index: usize) -> Self {
        FailureContext {
            recognizer: recognizer.into(),
            input_index,
            rule_ctx: None,
            offending: None,
            offending_state: None,
        }
    }

    pub fn with_rule_ctx(mut self, ctx: CtxRef) -> Self {
        self.rule_ctx = Some(ctx);
        self
    }

    pub fn with_offending(mut self, sym: SymbolAt) -> Self {
        self.offending = Some(sym);
        self
    }

    pub fn with_offending_state(mut self, state: AtnStateId) -> Self {
        self.offending_state = Some(state);
        self
    }
}

/// Why recognition failed.  One flat discriminant; the shared fields
/// live in [`FailureContext`].
#[derive(Debug, Clone)]
pub enum FailureKind {
    /// The closure over all configurations collapsed to empty before
    /// any alternative could be confirmed.  `deepest_state` is the
    /// last automaton state actually reached.
    NoViableAlternative { deepest_state: AtnStateId },

    /// A required terminal did not match the next input symbol during
    /// straight-line parsing outside a decision.
    InputMismatch { expected: Symbol },

    /// Every predicate guarding a viable alternative evaluated false.
    /// `evaluated` is the number of predicates tried.
    FailedPredicate { pred: PredRef, evaluated: usize },

    /// Recognition was deliberately aborted: caller cancellation or a
    /// resource limit.  Wraps the failure that triggered the bail-out
    /// when there was one.
    ParseCancellation {
        reason: String,
        cause: Option<Box<RecognitionError>>,
    },

    /// The simulated rule-invocation stack underflowed.  Always an
    /// automaton or context-construction defect, never a normal parse
    /// outcome.
    EmptyStack,
}

#[derive(Debug, Clone)]
pub struct RecognitionError {
    pub kind: FailureKind,
    pub context: FailureContext,
}

impl RecognitionError {
    pub fn new(kind: FailureKind, context: FailureContext) -> Self {
        RecognitionError { kind, context }
    }

    pub fn cancelled(reason: impl Into<String>, context: FailureContext) -> Self {
        RecognitionError {
            kind: FailureKind::ParseCancellation {
                reason: reason.into(),
                cause: None,
            },
            context,
        }
    }

    /// Wrap an existing failure in a cancellation, keeping the
    /// original as the cause.
    pub fn into_cancellation(self, reason: impl Into<String>) -> Self {
        let context = self.context.clone();
        RecognitionError {
            kind: FailureKind::ParseCancellation {
                reason: reason.into(),
                cause: Some(Box::new(self)),
            },
            context,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, FailureKind::ParseCancellation { .. })
    }

    /// Render with symbolic names.  `token_names[t]` names token type
    /// `t`; out-of-range or EOF symbols fall back to numeric form.
    pub fn render(&self, token_names: &[String]) -> String {
        let sym_name = |s: Symbol| -> String {
            if s.is_eof() {
                "<EOF>".to_string()
            } else {
                token_names
                    .get(s.0 as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("<{}>", s.0))
            }
        };
        let at = match self.context.offending {
            Some(o) => format!(" at {} (input index {})", sym_name(o.symbol), o.index),
            None => format!(" (input index {})", self.context.input_index),
        };
        match &self.kind {
            FailureKind::NoViableAlternative { deepest_state } => format!(
                "{}: no viable alternative{}; deepest state {}",
                self.context.recognizer,
                at,
                deepest_state.as_usize()
            ),
            FailureKind::InputMismatch { expected } => format!(
                "{}: mismatched input{}; expecting {}",
                self.context.recognizer,
                at,
                sym_name(*expected)
            ),
            FailureKind::FailedPredicate { evaluated, .. } => format!(
                "{}: failed predicate{} ({} evaluated)",
                self.context.recognizer, at, evaluated
            ),
            FailureKind::ParseCancellation { reason, .. } => {
                format!("{}: recognition cancelled: {}{}", self.context.recognizer, reason, at)
            }
            FailureKind::EmptyStack => format!(
                "{}: rule-invocation stack underflow{}",
                self.context.recognizer, at
            ),
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&[]))
    }
}

impl std::error::Error for RecognitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            FailureKind::ParseCancellation {
                cause: Some(cause), ..
            } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_wraps_cause() {
        let inner = RecognitionError::new(
            FailureKind::NoViableAlternative {
                deepest_state: AtnStateId::new(7),
            },
            FailureContext::new("lexer", 3),
        );
        let outer = inner.into_cancellation("caller bail-out");
        assert!(outer.is_cancellation());
        let src = std::error::Error::source(&outer).expect("cause kept");
        assert!(src.to_string().contains("no viable alternative"));
    }

    #[test]
    fn render_uses_token_names() {
        let err = RecognitionError::new(
            FailureKind::InputMismatch {
                expected: Symbol(1),
            },
            FailureContext::new("parser", 0).with_offending(SymbolAt {
                symbol: Symbol(2),
                index: 0,
            }),
        );
        let names = vec!["<invalid>".to_string(), "ID".to_string(), "NUM".to_string()];
        let msg = err.render(&names);
        assert!(msg.contains("expecting ID"));
        assert!(msg.contains("at NUM"));
    }

    #[test]
    fn eof_renders_symbolically() {
        let err = RecognitionError::new(
            FailureKind::NoViableAlternative {
                deepest_state: AtnStateId::new(0),
            },
            FailureContext::new("lexer", 5).with_offending(SymbolAt {
                symbol: Symbol::EOF,
                index: 5,
            }),
        );
        assert!(err.render(&[]).contains("<EOF>"));
    }

    #[test]
    fn converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(RecognitionError::new(
                FailureKind::EmptyStack,
                FailureContext::new("lexer", 0),
            ))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("underflow"));
    }
}
