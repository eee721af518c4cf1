use std::borrow::Cow;

/// The VM's output sink.
///
/// Words write into this buffer; the host drains it (typically once per
/// interpreted line) and forwards the bytes wherever it likes.
pub struct OutputBuf {
    buf: Vec<u8>,
    capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    OutputFull,
    FormattingErr,
}

impl core::fmt::Display for OutputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OutputError::OutputFull => f.write_str("output buffer full"),
            OutputError::FormattingErr => f.write_str("formatting error"),
        }
    }
}

impl OutputBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push_bstr(&mut self, bstr: &[u8]) -> Result<(), OutputError> {
        if self.buf.len() + bstr.len() > self.capacity {
            return Err(OutputError::OutputFull);
        }
        self.buf.extend_from_slice(bstr);
        Ok(())
    }

    pub fn push_str(&mut self, stir: &str) -> Result<(), OutputError> {
        self.push_bstr(stir.as_bytes())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The buffered output as text. `EMIT` can write any byte, so invalid
    /// UTF-8 is replaced rather than trusted.
    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buf)
    }

    /// Takes the buffered bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        core::mem::replace(&mut self.buf, Vec::with_capacity(self.capacity))
    }
}

impl core::fmt::Write for OutputBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.push_str(s).map_err(|_| core::fmt::Error)
    }
}
