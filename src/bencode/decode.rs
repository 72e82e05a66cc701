use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one bencoded term from `input`.
///
/// The whole buffer must be consumed; bytes left over after the first term
/// are an error, since a KRPC datagram is a single dictionary.
pub fn decode(input: &[u8]) -> Result<Value, BencodeError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != input.len() {
        return Err(BencodeError::TrailingData);
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::DepthLimit);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.byte_string(),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let raw = self.take_until(b'e')?;

        let text = std::str::from_utf8(raw)
            .map_err(|_| BencodeError::InvalidInteger("not ascii".into()))?;
        if text.is_empty() {
            return Err(BencodeError::InvalidInteger("empty".into()));
        }
        // i-0e and zero-padded forms are not canonical bencode.
        if text == "-0" || (text.len() > 1 && (text.starts_with('0') || text.starts_with("-0"))) {
            return Err(BencodeError::InvalidInteger(text.into()));
        }

        let n: i64 = text
            .parse()
            .map_err(|_| BencodeError::InvalidInteger(text.into()))?;
        Ok(Value::Int(n))
    }

    fn byte_string(&mut self) -> Result<Value, BencodeError> {
        let raw_len = self.take_until(b':')?;
        let len: usize = std::str::from_utf8(raw_len)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidLength)?;

        if self.input.len() - self.pos < len {
            return Err(BencodeError::UnexpectedEof);
        }
        let bytes = Bytes::copy_from_slice(&self.input[self.pos..self.pos + len]);
        self.pos += len;
        Ok(Value::Bytes(bytes))
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = match self.byte_string()? {
                Value::Bytes(b) => b,
                _ => unreachable!(),
            };
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }
        self.pos += 1;
        Ok(Value::Dict(entries))
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof)
    }

    /// Consumes bytes up to and including `stop`, returning the bytes
    /// before it.
    fn take_until(&mut self, stop: u8) -> Result<&[u8], BencodeError> {
        let start = self.pos;
        while self.peek()? != stop {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        self.pos += 1;
        Ok(raw)
    }
}
