use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical length of the wire-form identifier: 43 URL-safe base64 chars,
/// decoding to 32 bytes without padding.
pub const IDENTIFIER_LEN: usize = 43;

/// Errors returned when parsing or decoding an [`Identifier`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("identifier must be exactly {IDENTIFIER_LEN} characters, got {0}")]
    WrongLength(usize),
    #[error("identifier contains a character outside [A-Za-z0-9_-]")]
    InvalidCharacter,
    #[error("identifier does not decode to 32 bytes")]
    InvalidEncoding,
}

/// A 43-character URL-safe base64 content identifier, decoded to 32 bytes.
///
/// This is the canonical key used to address content throughout the
/// retrieval pipeline, chunk assembly engine, and admission gate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identifier([u8; 32]);

impl Identifier {
    /// Returns the raw 32-byte decoded form.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Wraps already-decoded bytes without re-validating wire-form length.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Renders the canonical 43-character wire form.
    pub fn to_wire_string(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    fn has_valid_charset(s: &str) -> bool {
        s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_wire_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_wire_string())
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != IDENTIFIER_LEN {
            return Err(IdentifierError::WrongLength(s.len()));
        }
        if !Self::has_valid_charset(s) {
            return Err(IdentifierError::InvalidCharacter);
        }
        let decoded = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| IdentifierError::InvalidEncoding)?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| IdentifierError::InvalidEncoding)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_wire_string())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
