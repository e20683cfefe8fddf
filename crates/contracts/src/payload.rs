//! Payload - a flushed batch on its way to the endpoint

use bytes::{BufMut, Bytes, BytesMut};

/// Serialized batch: every line followed by `\n`, in arrival order
///
/// Cheap to clone; ownership moves from the accumulator to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    body: Bytes,
    lines: usize,
}

impl Payload {
    /// Join lines into a newline-terminated body
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut buf = BytesMut::new();
        let mut count = 0;
        for line in lines {
            buf.put_slice(line.as_ref().as_bytes());
            buf.put_u8(b'\n');
            count += 1;
        }
        Self {
            body: buf.freeze(),
            lines: count,
        }
    }

    /// Request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume into the request body
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Number of lines carried
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Body size in bytes
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Iterate the carried lines without their terminators
    pub fn iter_lines(&self) -> impl Iterator<Item = &str> {
        std::str::from_utf8(&self.body)
            .unwrap_or_default()
            .lines()
    }
}
