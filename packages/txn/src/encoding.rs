//! Binary encoding used for size estimates, ids and signature hashes.
//!
//! - integers: 8-byte little-endian
//! - booleans: one byte
//! - fixed arrays: raw bytes
//! - byte strings and lists: u64 length prefix, then contents
//! - currency: length-prefixed big-endian magnitude

use renterbind_currency::Currency;

/// Types with a canonical binary encoding.
pub trait SiaEncode {
    fn encode_to(&self, buf: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf);
        buf
    }

    fn encoded_len(&self) -> usize {
        self.encode().len()
    }
}

/// Write `bytes` with a u64 length prefix.
pub fn write_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    (bytes.len() as u64).encode_to(buf);
    buf.extend_from_slice(bytes);
}

impl SiaEncode for u64 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl SiaEncode for bool {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }
}

impl<const N: usize> SiaEncode for [u8; N] {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl SiaEncode for Currency {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        write_prefixed(buf, &self.to_bytes_be());
    }
}

impl<T: SiaEncode> SiaEncode for [T] {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        (self.len() as u64).encode_to(buf);
        for item in self {
            item.encode_to(buf);
        }
    }
}

impl<T: SiaEncode> SiaEncode for Vec<T> {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.as_slice().encode_to(buf);
    }
}
