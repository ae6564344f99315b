//! Incremental UTF-8 decoding for the chat stream

/// Decodes a byte stream chunk by chunk, holding back a trailing partial
/// multi-byte sequence until the rest of it arrives.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and return the text completed so far. Invalid
    /// sequences become U+FFFD.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // valid prefix is guaranteed UTF-8 by the error
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // incomplete sequence at the end: wait for more
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is still buffered at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.push(b"hello "), "hello ");
        assert_eq!(d.push(b"world"), "world");
        assert!(!d.has_pending());
    }

    #[test]
    fn test_split_multibyte_is_reassembled() {
        let text = "你好, 世界 📷";
        let bytes = text.as_bytes();
        // every split point, including ones inside a character
        for split in 0..=bytes.len() {
            let mut d = Utf8StreamDecoder::new();
            let mut out = d.push(&bytes[..split]);
            out.push_str(&d.push(&bytes[split..]));
            out.push_str(&d.finish());
            assert_eq!(out, text, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let text = "émoji 🎉 ok";
        let mut d = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in text.as_bytes() {
            out.push_str(&d.push(std::slice::from_ref(b)));
        }
        assert_eq!(out, text);
        assert_eq!(d.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut d = Utf8StreamDecoder::new();
        assert_eq!(d.push(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_flushed_lossy() {
        let mut d = Utf8StreamDecoder::new();
        let euro = "€".as_bytes();
        assert_eq!(d.push(&euro[..2]), "");
        assert!(d.has_pending());
        assert_eq!(d.finish(), "\u{FFFD}");
    }
}
