use anyhow::{bail, Result};

use crate::atn::Symbol;

/// Positionable read cursor over input symbols.
///
/// `la(1)` is the current symbol; lookahead past the end returns
/// `Symbol::EOF`.  `mark`/`release` bracket speculative lookahead so a
/// backing stream knows how far back it must retain symbols.  All the
/// engine's lookahead goes through `la` without consuming; `consume`
/// is only called by the interpreter shells once a decision is final.
pub trait SymbolStream {
    /// 1-based lookahead relative to the cursor.
    fn la(&self, offset: usize) -> Symbol;

    fn consume(&mut self);

    /// Number of symbols consumed so far.
    fn index(&self) -> usize;

    fn mark(&mut self) -> MarkId;
    fn release(&mut self, mark: MarkId) -> Result<()>;

    /// Reposition the cursor.  Seeking before the oldest live mark is
    /// an error.
    fn seek(&mut self, index: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkId(usize);

/// In-memory stream over a fully materialized symbol buffer.
#[derive(Clone)]
pub struct BufferStream {
    symbols: Vec<Symbol>,
    pos: usize,
    // live marks, in acquisition order
    marks: Vec<(MarkId, usize)>,
    next_mark: usize,
}

impl BufferStream {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        BufferStream {
            symbols,
            pos: 0,
            marks: Vec::new(),
            next_mark: 0,
        }
    }

    /// Character-level stream for lexing; each char becomes one symbol
    /// carrying its code point.
    pub fn from_text(text: &str) -> Self {
        Self::new(text.chars().map(|c| Symbol(c as i32)).collect())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in `[start, stop)`, used by the lexer shell to recover
    /// token text.
    pub fn slice(&self, start: usize, stop: usize) -> &[Symbol] {
        &self.symbols[start..stop.min(self.symbols.len())]
    }

    pub fn text(&self, start: usize, stop: usize) -> String {
        self.slice(start, stop)
            .iter()
            .filter_map(|s| char::from_u32(s.0 as u32))
            .collect()
    }

    fn oldest_mark_pos(&self) -> Option<usize> {
        self.marks.iter().map(|(_, pos)| *pos).min()
    }
}

impl SymbolStream for BufferStream {
    fn la(&self, offset: usize) -> Symbol {
        assert!(offset >= 1, "lookahead is 1-based");
        let idx = self.pos + offset - 1;
        if idx >= self.symbols.len() {
            Symbol::EOF
        } else {
            self.symbols[idx]
        }
    }

    fn consume(&mut self) {
        if self.pos < self.symbols.len() {
            self.pos += 1;
        }
    }

    fn index(&self) -> usize {
        self.pos
    }

    fn mark(&mut self) -> MarkId {
        let id = MarkId(self.next_mark);
        self.next_mark += 1;
        self.marks.push((id, self.pos));
        id
    }

    fn release(&mut self, mark: MarkId) -> Result<()> {
        match self.marks.iter().position(|(id, _)| *id == mark) {
            Some(idx) => {
                self.marks.remove(idx);
                Ok(())
            }
            None => bail!("release of unknown mark {:?}", mark),
        }
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        if let Some(oldest) = self.oldest_mark_pos() {
            if index < oldest {
                bail!("seek to {} before oldest mark at {}", index, oldest);
            }
        }
        if index > self.symbols.len() {
            bail!("seek to {} past end of stream ({})", index, self.symbols.len());
        }
        self.pos = index;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookahead_and_eof() {
        let s = BufferStream::from_text("ab");
        assert_eq!(s.la(1), Symbol('a' as i32));
        assert_eq!(s.la(2), Symbol('b' as i32));
        assert_eq!(s.la(3), Symbol::EOF);
        assert_eq!(s.la(100), Symbol::EOF);
    }

    #[test]
    fn consume_moves_cursor() {
        let mut s = BufferStream::from_text("xy");
        s.consume();
        assert_eq!(s.index(), 1);
        assert_eq!(s.la(1), Symbol('y' as i32));
        s.consume();
        s.consume(); // consuming at EOF is a no-op
        assert_eq!(s.index(), 2);
        assert_eq!(s.la(1), Symbol::EOF);
    }

    #[test]
    fn marks_guard_seek() {
        let mut s = BufferStream::from_text("abcd");
        s.consume();
        s.consume();
        let m = s.mark();
        s.consume();
        assert!(s.seek(0).is_err());
        s.release(m).unwrap();
        s.seek(0).unwrap();
        assert_eq!(s.la(1), Symbol('a' as i32));
    }

    #[test]
    fn release_unknown_mark_fails() {
        let mut s = BufferStream::from_text("a");
        let m = s.mark();
        s.release(m).unwrap();
        assert!(s.release(m).is_err());
    }

    #[test]
    fn text_recovers_span() {
        let s = BufferStream::from_text("hello");
        assert_eq!(s.text(1, 4), "ell");
    }
}
