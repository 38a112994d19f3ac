pub mod api;
pub mod atn;
pub mod error;
pub mod sim;
pub mod streams;

mod logging;
pub use logging::Logger;

#[macro_export]
macro_rules! infoln {
    ($s:expr, $($arg:tt)*) => {
        if $s.logger.level_enabled(2) {
            use std::fmt::Write;
            writeln!($s.logger, $($arg)*).unwrap();
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($s:expr, $($arg:tt)*) => {
        if $s.logger.level_enabled(1) {
            use std::fmt::Write;
            write!($s.logger, "Warning: ").unwrap();
            writeln!($s.logger, $($arg)*).unwrap();
        }
    };
}
