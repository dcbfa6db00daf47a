use super::error::BencodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one value; any bytes after it are an error.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.next_value()?;
    if !decoder.is_finished() {
        return Err(BencodeError::TrailingData(decoder.position()));
    }
    Ok(value)
}

/// Decodes one value from the front of `data` and returns it together with
/// the number of bytes it occupied.
///
/// ut_metadata data messages append raw piece bytes after the bencoded
/// header, so the header has to be decoded without rejecting the tail.
pub fn decode_prefix(data: &[u8]) -> Result<(Value, usize), BencodeError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.next_value()?;
    Ok((value, decoder.position()))
}

/// Returns the exact encoded bytes of `key`'s value in a top-level dictionary.
///
/// Used to hash the `info` dictionary as it appeared on the wire rather than
/// a re-encoding of it.
pub fn raw_dict_entry<'a>(data: &'a [u8], key: &[u8]) -> Result<Option<&'a [u8]>, BencodeError> {
    let mut decoder = Decoder::new(data);
    decoder.expect(b'd')?;
    while decoder.peek()? != b'e' {
        let key_at = decoder.position();
        let entry_key = match decoder.value(1)? {
            Value::Bytes(b) => b,
            _ => return Err(BencodeError::NonStringKey(key_at)),
        };
        let start = decoder.position();
        decoder.skip_value(1)?;
        if entry_key.as_ref() == key {
            return Ok(Some(&data[start..decoder.position()]));
        }
    }
    Ok(None)
}

/// A cursor over bencoded input.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn next_value(&mut self) -> Result<Value, BencodeError> {
        self.value(0)
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof(self.pos))
    }

    fn expect(&mut self, byte: u8) -> Result<(), BencodeError> {
        let found = self.peek()?;
        if found != byte {
            return Err(BencodeError::UnexpectedByte {
                byte: found,
                at: self.pos,
            });
        }
        self.pos += 1;
        Ok(())
    }

    /// Scans forward to `terminator` and returns the bytes before it,
    /// leaving the cursor just past the terminator.
    fn take_until(&mut self, terminator: u8) -> Result<&'a [u8], BencodeError> {
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == terminator)
            .ok_or(BencodeError::UnexpectedEof(self.data.len()))?;
        let out = &rest[..len];
        self.pos += len + 1;
        Ok(out)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep(MAX_DEPTH));
        }

        match self.peek()? {
            b'i' => self.integer().map(Value::Integer),
            b'0'..=b'9' => self.byte_string().map(Value::Bytes),
            b'l' => {
                self.pos += 1;
                let mut list = Vec::new();
                while self.peek()? != b'e' {
                    list.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(list))
            }
            b'd' => {
                self.pos += 1;
                let mut dict = BTreeMap::new();
                while self.peek()? != b'e' {
                    let key_at = self.pos;
                    let key = match self.peek()? {
                        b'0'..=b'9' => self.byte_string()?,
                        _ => return Err(BencodeError::NonStringKey(key_at)),
                    };
                    let value = self.value(depth + 1)?;
                    dict.insert(key, value);
                }
                self.pos += 1;
                Ok(Value::Dict(dict))
            }
            byte => Err(BencodeError::UnexpectedByte { byte, at: self.pos }),
        }
    }

    fn skip_value(&mut self, depth: usize) -> Result<(), BencodeError> {
        self.value(depth).map(|_| ())
    }

    fn integer(&mut self) -> Result<i64, BencodeError> {
        let at = self.pos;
        self.pos += 1;
        let digits = self.take_until(b'e')?;
        let invalid = |reason: &str| BencodeError::InvalidInteger {
            at,
            reason: reason.to_string(),
        };

        let text = std::str::from_utf8(digits).map_err(|_| invalid("not ascii"))?;
        let unsigned = text.strip_prefix('-').unwrap_or(text);
        if unsigned.is_empty() {
            return Err(invalid("empty"));
        }
        if !unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("non-digit"));
        }
        if unsigned.starts_with('0') && (unsigned.len() > 1 || text.starts_with('-')) {
            return Err(invalid("leading zero"));
        }
        text.parse().map_err(|_| invalid(text))
    }

    fn byte_string(&mut self) -> Result<Bytes, BencodeError> {
        let at = self.pos;
        let len_digits = self.take_until(b':')?;
        let len: usize = std::str::from_utf8(len_digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::InvalidStringLength(at))?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof(self.data.len()))?;
        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }
}
