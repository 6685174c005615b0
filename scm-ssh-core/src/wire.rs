//! SSH wire encoding of RSA and DSA public keys (RFC 4253, section 6.6).

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use num_bigint::BigInt;

use crate::keys::{KeyType, SshPublicKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnsupportedKeyType,
    Base64,
    Underrun,
    LengthOverflow,
    KeyTypeMismatch,
    EmptyInteger,
    TrailingData,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            DecodeError::UnsupportedKeyType => "unsupported key type",
            DecodeError::Base64 => "invalid base64 data",
            DecodeError::Underrun => "unexpected end of data",
            DecodeError::LengthOverflow => "field length out of range",
            DecodeError::KeyTypeMismatch => "key type in blob does not match",
            DecodeError::EmptyInteger => "empty integer field",
            DecodeError::TrailingData => "surplus data at end of key",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DecodeError {}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn read_u32(&mut self) -> Result<usize, DecodeError> {
        if self.remaining() < 4 {
            return Err(DecodeError::Underrun);
        }
        let d = &self.data[self.offset..self.offset + 4];
        let value = u32::from_be_bytes([d[0], d[1], d[2], d[3]]);
        if value > i32::MAX as u32 {
            return Err(DecodeError::LengthOverflow);
        }
        self.offset += 4;
        Ok(value as usize)
    }

    fn read_string(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u32()?;
        if self.remaining() < len {
            return Err(DecodeError::Underrun);
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.data[start..self.offset])
    }

    fn read_mpint(&mut self) -> Result<BigInt, DecodeError> {
        let bytes = self.read_string()?;
        if bytes.is_empty() {
            return Err(DecodeError::EmptyInteger);
        }
        Ok(BigInt::from_signed_bytes_be(bytes))
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.remaining() > 0 {
            return Err(DecodeError::TrailingData);
        }
        Ok(())
    }
}

/// Decode the base64 body of an `authorized_keys` line.
pub fn decode(key_type: &str, base64_body: &str) -> Result<SshPublicKey, DecodeError> {
    let key_type = KeyType::from_name(key_type).ok_or(DecodeError::UnsupportedKeyType)?;
    decode_base64(key_type, base64_body)
}

pub fn decode_base64(key_type: KeyType, base64_body: &str) -> Result<SshPublicKey, DecodeError> {
    let blob = BASE64_STANDARD
        .decode(base64_body)
        .map_err(|_| DecodeError::Base64)?;
    decode_blob(key_type, &blob)
}

/// Decode a raw key blob that is expected to hold a key of `key_type`.
pub fn decode_blob(key_type: KeyType, blob: &[u8]) -> Result<SshPublicKey, DecodeError> {
    let mut reader = Reader::new(blob);

    if reader.read_string()? != key_type.name().as_bytes() {
        return Err(DecodeError::KeyTypeMismatch);
    }

    let key = match key_type {
        KeyType::Rsa => {
            let public_exponent = reader.read_mpint()?;
            let modulus = reader.read_mpint()?;
            SshPublicKey::Rsa {
                modulus,
                public_exponent,
            }
        }
        KeyType::Dsa => {
            let p = reader.read_mpint()?;
            let q = reader.read_mpint()?;
            let g = reader.read_mpint()?;
            let y = reader.read_mpint()?;
            SshPublicKey::Dsa { p, q, g, y }
        }
    };

    reader.finish()?;
    Ok(key)
}

fn put_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

fn put_mpint(out: &mut Vec<u8>, value: &BigInt) {
    put_string(out, &value.to_signed_bytes_be());
}

impl SshPublicKey {
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = vec![];
        put_string(&mut out, self.key_type().name().as_bytes());
        match self {
            SshPublicKey::Rsa {
                modulus,
                public_exponent,
            } => {
                put_mpint(&mut out, public_exponent);
                put_mpint(&mut out, modulus);
            }
            SshPublicKey::Dsa { p, q, g, y } => {
                put_mpint(&mut out, p);
                put_mpint(&mut out, q);
                put_mpint(&mut out, g);
                put_mpint(&mut out, y);
            }
        }
        out
    }

    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.to_wire())
    }

    /// Format the key as one `authorized_keys` line, optionally prefixed by
    /// an already formatted option list.
    pub fn to_authorized_key_line(&self, options: Option<&str>) -> String {
        match options {
            Some(options) if !options.is_empty() => {
                format!("{} {} {}", options, self.key_type(), self.to_base64())
            }
            _ => format!("{} {}", self.key_type(), self.to_base64()),
        }
    }
}
