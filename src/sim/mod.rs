mod config;
mod dfa;
mod lexer;
mod parser;
mod prediction;

pub use config::{AtnConfig, ConfigSet};
pub use dfa::{CtxMode, Dfa, DfaState, DfaStateId};
pub use lexer::{LexerInterpreter, Token, DEFAULT_CHANNEL};
pub use parser::ParserInterpreter;
pub use prediction::{Policy, Prediction, PredictionEngine};
