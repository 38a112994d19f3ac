use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

/// Resource bounds for one recognition session.  Hitting a limit
/// surfaces as a `ParseCancellation` failure, never as a panic.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RuntimeLimits {
    /// Cap on DFA states per decision cache.
    pub max_dfa_states: usize,

    /// Cap on lookahead depth for a single decision resolution.
    pub max_lookahead: usize,

    /// Cap on closure computations per decision resolution.
    pub closure_fuel: u64,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        RuntimeLimits {
            max_dfa_states: 10_000,
            max_lookahead: 10_000,
            closure_fuel: 1_000_000,
        }
    }
}

/// Counters accumulated while simulating.  `closures` is the
/// convergence probe: once a decision's DFA is warm, repeated
/// resolution over the same input stops increasing it.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct SimStats {
    pub predict_calls: usize,
    pub closures: usize,
    pub dfa_states: usize,
    pub transitions: usize,
    pub full_ctx_retries: usize,
    pub compute_time_us: u64,
}

impl SimStats {
    pub fn delta(&self, previous: &SimStats) -> SimStats {
        SimStats {
            predict_calls: self.predict_calls - previous.predict_calls,
            closures: self.closures - previous.closures,
            dfa_states: self.dfa_states - previous.dfa_states,
            transitions: self.transitions - previous.transitions,
            full_ctx_retries: self.full_ctx_retries - previous.full_ctx_retries,
            compute_time_us: self.compute_time_us - previous.compute_time_us,
        }
    }

    pub fn max(&self, other: &SimStats) -> SimStats {
        SimStats {
            predict_calls: self.predict_calls.max(other.predict_calls),
            closures: self.closures.max(other.closures),
            dfa_states: self.dfa_states.max(other.dfa_states),
            transitions: self.transitions.max(other.transitions),
            full_ctx_retries: self.full_ctx_retries.max(other.full_ctx_retries),
            compute_time_us: self.compute_time_us.max(other.compute_time_us),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Cooperative cancellation signal.  The engine polls it between
/// lookahead steps; no mid-decision undo is needed because partially
/// installed cache entries remain valid reachability facts.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
