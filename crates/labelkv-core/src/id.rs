//! Entity identifiers and their fixed-width key encoding.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Length in bytes of an encoded [`Id`].
pub const ID_LENGTH: usize = 16;

// ==============================================================================
// Id
// ==============================================================================

/// A 64-bit entity identifier. Zero is reserved as "unset".
///
/// Encodes as 16 lowercase hex characters everywhere it leaves memory:
/// store keys, `Display`, and JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(u64);

impl Id {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Fixed-width key encoding. Fails for the invalid (zero) id.
    pub fn encode(self) -> Result<[u8; ID_LENGTH], CoreError> {
        if !self.is_valid() {
            return Err(CoreError::InvalidId);
        }
        let mut out = [0u8; ID_LENGTH];
        let hex = format!("{:016x}", self.0);
        out.copy_from_slice(hex.as_bytes());
        Ok(out)
    }

    /// Inverse of [`Id::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let text = std::str::from_utf8(bytes).map_err(|_| CoreError::InvalidId)?;
        text.parse()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Id {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != ID_LENGTH {
            return Err(CoreError::InvalidId);
        }
        let raw = u64::from_str_radix(s, 16).map_err(|_| CoreError::InvalidId)?;
        let id = Self(raw);
        if !id.is_valid() {
            return Err(CoreError::InvalidId);
        }
        Ok(id)
    }
}

impl TryFrom<String> for Id {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_string()
    }
}

// ==============================================================================
// Generation
// ==============================================================================

/// Source of fresh identifiers for newly created entities.
pub trait IdGenerator: Send + Sync {
    fn id(&self) -> Id;
}

/// Draws identifiers uniformly from the non-zero `u64` space.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn id(&self) -> Id {
        loop {
            let raw: u64 = rand::thread_rng().r#gen();
            if raw != 0 {
                return Id(raw);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_fixed_width_hex() {
        let id = Id::new(0x2a);
        assert_eq!(&id.encode().unwrap(), b"000000000000002a");
        assert_eq!(id.to_string(), "000000000000002a");
    }

    #[test]
    fn zero_is_rejected_everywhere() {
        assert!(!Id::default().is_valid());
        assert!(matches!(Id::default().encode(), Err(CoreError::InvalidId)));
        assert!(matches!(
            "0000000000000000".parse::<Id>(),
            Err(CoreError::InvalidId)
        ));
    }

    #[test]
    fn parse_rejects_wrong_width_and_non_hex() {
        assert!("2a".parse::<Id>().is_err());
        assert!("zzzzzzzzzzzzzzzz".parse::<Id>().is_err());
        assert_eq!(
            Id::decode(b"00000000000000ff").unwrap(),
            Id::new(255)
        );
    }

    #[test]
    fn serializes_as_json_string() {
        let json = serde_json::to_string(&Id::new(1)).unwrap();
        assert_eq!(json, "\"0000000000000001\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Id::new(1));
    }

    #[test]
    fn random_generator_never_yields_zero() {
        let ids = RandomIdGenerator;
        for _ in 0..64 {
            assert!(ids.id().is_valid());
        }
    }
}
