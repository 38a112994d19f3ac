use std::fmt::Write;

/// Buffered, leveled logger carried by the interpreter shells.
///
/// Level 0 is silent, 1 warnings, 2 informational.  Messages go to an
/// in-memory buffer (retrievable by the embedding application) and/or
/// to stderr, each with its own threshold.
pub struct Logger {
    effective_level: u32,
    buffer_level: u32,
    stderr_level: u32,
    buffer: String,
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self {
            effective_level: self.effective_level,
            buffer_level: self.buffer_level,
            stderr_level: self.stderr_level,
            // clean logs on clone
            buffer: String::new(),
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(0, 1)
    }
}

impl Logger {
    pub fn new(buffer_level: u32, stderr_level: u32) -> Self {
        Self {
            buffer_level,
            stderr_level,
            effective_level: std::cmp::max(buffer_level, stderr_level),
            buffer: String::new(),
        }
    }

    pub fn warn(&mut self, s: &str) {
        if self.level_enabled(1) {
            self.write_str("Warning: ").unwrap();
            self.write_str(s).unwrap();
            self.write_str("\n").unwrap();
        }
    }

    pub fn info(&mut self, s: &str) {
        if self.level_enabled(2) {
            self.write_str(s).unwrap();
            self.write_str("\n").unwrap();
        }
    }

    #[inline(always)]
    pub fn level_enabled(&self, level: u32) -> bool {
        level <= self.effective_level
    }

    pub fn set_buffer_level(&mut self, buffer_level: u32) {
        self.buffer_level = buffer_level;
        self.effective_level = std::cmp::max(self.effective_level, self.buffer_level);
    }

    pub fn set_stderr_level(&mut self, stderr_level: u32) {
        self.stderr_level = stderr_level;
        self.effective_level = std::cmp::max(self.effective_level, self.stderr_level);
    }

    pub fn get_buffer(&self) -> &str {
        &self.buffer
    }

    pub fn get_and_clear_logs(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl Write for Logger {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        if self.buffer_level > 0 {
            self.buffer.push_str(s);
        }
        if self.stderr_level > 0 {
            eprint!("{}", s);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_collects_at_level() {
        let mut l = Logger::new(2, 0);
        l.info("hello");
        l.warn("careful");
        let logs = l.get_and_clear_logs();
        assert!(logs.contains("hello"));
        assert!(logs.contains("Warning: careful"));
        assert_eq!(l.get_buffer(), "");
    }

    #[test]
    fn silent_below_level() {
        let mut l = Logger::new(0, 0);
        l.info("nothing");
        assert_eq!(l.get_buffer(), "");
    }

    #[test]
    fn clone_drops_buffered_logs() {
        let mut l = Logger::new(2, 0);
        l.info("one");
        let l2 = l.clone();
        assert_eq!(l2.get_buffer(), "");
    }
}
