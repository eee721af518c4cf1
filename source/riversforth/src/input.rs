use std::collections::VecDeque;
use std::io::BufRead;

use crate::Error;

/// Where the VM's input comes from.
///
/// A source hands out one chunk of text at a time (usually a line) and
/// blocks until it has one.
pub trait Source {
    /// Replace the contents of `chunk` with the next chunk of input.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn next_chunk(&mut self, chunk: &mut Vec<u8>) -> std::io::Result<bool>;
}

/// Reads one line per chunk from any buffered reader.
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Source for ReaderSource<R> {
    fn next_chunk(&mut self, chunk: &mut Vec<u8>) -> std::io::Result<bool> {
        chunk.clear();
        let read = self.reader.read_until(b'\n', chunk)?;
        Ok(read != 0)
    }
}

/// A fixed queue of in-memory chunks.
#[derive(Default)]
pub struct ChunkSource {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkSource {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
        }
    }

    pub fn push(&mut self, chunk: impl AsRef<[u8]>) {
        self.chunks.push_back(chunk.as_ref().to_vec());
    }
}

impl Source for ChunkSource {
    fn next_chunk(&mut self, chunk: &mut Vec<u8>) -> std::io::Result<bool> {
        match self.chunks.pop_front() {
            Some(next) => {
                *chunk = next;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The input cursor and token buffer.
///
/// Bytes are consumed from the currently loaded chunk; when it runs out
/// the [`Source`] is asked for another one. Tokens are whitespace
/// separated, and a `\` at the start of a token comments out the rest of
/// the line.
pub struct InputCursor {
    chunk: Vec<u8>,
    pos: usize,
    token: Box<[u8]>,
    token_len: usize,
    source: Box<dyn Source>,
}

impl InputCursor {
    pub fn new(token_capacity: usize, source: impl Source + 'static) -> Self {
        Self {
            chunk: Vec::new(),
            pos: 0,
            token: vec![0; token_capacity].into_boxed_slice(),
            token_len: 0,
            source: Box::new(source),
        }
    }

    /// Load `input` as the current chunk, dropping whatever was left of the
    /// previous one.
    pub fn fill(&mut self, input: &[u8]) {
        self.chunk.clear();
        self.chunk.extend_from_slice(input);
        self.pos = 0;
    }

    /// Load the next chunk from the source. Returns `false` at end of input.
    pub fn refill(&mut self) -> Result<bool, Error> {
        self.pos = 0;
        let more = self.source.next_chunk(&mut self.chunk)?;
        if !more {
            self.chunk.clear();
        }
        Ok(more)
    }

    /// Skip whatever is left of the current chunk.
    pub fn discard_chunk(&mut self) {
        self.pos = self.chunk.len();
    }

    /// The next byte of input, or `None` at end of input.
    pub fn next_char(&mut self) -> Result<Option<u8>, Error> {
        while self.pos >= self.chunk.len() {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let ch = self.chunk[self.pos];
        self.pos += 1;
        Ok(Some(ch))
    }

    /// The next byte of the loaded chunk, without refilling.
    fn next_in_chunk(&mut self) -> Option<u8> {
        let ch = *self.chunk.get(self.pos)?;
        self.pos += 1;
        Some(ch)
    }

    /// Consume everything up to and including the next newline, or to the
    /// end of the loaded chunk.
    pub fn skip_comment(&mut self) {
        while let Some(ch) = self.next_in_chunk() {
            if ch == b'\n' {
                break;
            }
        }
    }

    /// Read the next token into the token buffer, returning its length.
    ///
    /// Returns `Ok(None)` when input ends before a token starts. A token
    /// longer than the buffer is consumed entirely and then rejected with
    /// [`Error::TokenTooLong`].
    pub fn next_word(&mut self) -> Result<Option<usize>, Error> {
        self.token_len = 0;

        // Find the start, skipping whitespace and comments
        let mut ch = loop {
            match self.next_char()? {
                None => return Ok(None),
                Some(b'\\') => self.skip_comment(),
                Some(ch) if ch.is_ascii_whitespace() => {}
                Some(ch) => break ch,
            }
        };

        // Accumulate until whitespace or the end of the chunk. A token never
        // spans chunks. The terminating whitespace is consumed.
        let mut overflowed = false;
        loop {
            match self.token.get_mut(self.token_len) {
                Some(dest) if !overflowed => {
                    *dest = ch;
                    self.token_len += 1;
                }
                _ => overflowed = true,
            }
            ch = match self.next_in_chunk() {
                Some(ch) if !ch.is_ascii_whitespace() => ch,
                _ => break,
            };
        }

        if overflowed {
            self.token_len = 0;
            return Err(Error::TokenTooLong);
        }
        Ok(Some(self.token_len))
    }

    /// Is there another token in the currently loaded chunk?
    ///
    /// Never asks the source for more input.
    pub fn has_more_words(&self) -> bool {
        let mut rest = self.chunk.get(self.pos..).unwrap_or_default().iter();
        while let Some(ch) = rest.next() {
            match ch {
                b'\\' => {
                    // The comment runs to the end of the line.
                    rest.by_ref().find(|&&c| c == b'\n');
                }
                ch if ch.is_ascii_whitespace() => {}
                _ => return true,
            }
        }
        false
    }

    /// The token most recently read by [`next_word`](Self::next_word).
    pub fn token(&self) -> &[u8] {
        &self.token[..self.token_len]
    }

    /// The whole token buffer, as addressed by `WORD`'s result.
    pub fn token_buf(&self) -> &[u8] {
        &self.token
    }

    pub fn token_buf_mut(&mut self) -> &mut [u8] {
        &mut self.token
    }

    /// The unconsumed remainder of the current chunk.
    pub fn remaining(&self) -> &[u8] {
        self.chunk.get(self.pos..).unwrap_or_default()
    }
}

#[cfg(test)]
pub mod test {
    use super::{ChunkSource, InputCursor, ReaderSource};
    use crate::Error;

    fn words(cursor: &mut InputCursor) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(_len) = cursor.next_word().unwrap() {
            out.push(String::from_utf8(cursor.token().to_vec()).unwrap());
        }
        out
    }

    #[test]
    fn tokens_and_comments() {
        let mut cursor = InputCursor::new(64, ChunkSource::default());
        cursor.fill(b"  : double\tdup + ; \\ not a token\n21 double\n");
        assert_eq!(words(&mut cursor), [":", "double", "dup", "+", ";", "21", "double"]);
    }

    #[test]
    fn backslash_inside_a_token_is_not_a_comment() {
        let mut cursor = InputCursor::new(64, ChunkSource::default());
        cursor.fill(b"a\\b c");
        assert_eq!(words(&mut cursor), ["a\\b", "c"]);
    }

    #[test]
    fn refills_across_chunks() {
        let source = ChunkSource::new(["dup\n", "", "  \\ comment\n", "swap"]);
        let mut cursor = InputCursor::new(64, source);
        cursor.fill(b": name\n");
        assert!(cursor.has_more_words());
        assert_eq!(words(&mut cursor), [":", "name", "dup", "swap"]);
        assert_eq!(cursor.next_char().unwrap(), None);
    }

    #[test]
    fn has_more_words_never_refills() {
        let source = ChunkSource::new(["more"]);
        let mut cursor = InputCursor::new(64, source);
        cursor.fill(b"  \\ just a comment\n   ");
        assert!(!cursor.has_more_words());
        cursor.fill(b"\\ comment\nword");
        assert!(cursor.has_more_words());
    }

    #[test]
    fn too_long() {
        let mut cursor = InputCursor::new(4, ChunkSource::default());
        cursor.fill(b"abcd abcde next");
        assert_eq!(cursor.next_word().unwrap(), Some(4));
        assert!(matches!(cursor.next_word(), Err(Error::TokenTooLong)));
        assert_eq!(cursor.next_word().unwrap(), Some(4));
        assert_eq!(cursor.token(), b"next");
    }

    #[test]
    fn tokens_end_with_the_chunk() {
        let source = ChunkSource::new(["def\n"]);
        let mut cursor = InputCursor::new(64, source);
        cursor.fill(b"abc");
        assert_eq!(words(&mut cursor), ["abc", "def"]);

        let source = ChunkSource::new(["1\n"]);
        let mut cursor = InputCursor::new(64, source);
        cursor.fill(b"\\ comment without a newline");
        assert_eq!(words(&mut cursor), ["1"]);
    }

    #[test]
    fn reader_source_lines() {
        let reader = std::io::Cursor::new(b"1 2\n3".to_vec());
        let mut cursor = InputCursor::new(8, ReaderSource::new(reader));
        assert!(cursor.refill().unwrap());
        assert_eq!(cursor.remaining(), b"1 2\n");
        assert_eq!(words(&mut cursor), ["1", "2", "3"]);
    }
}
