//! Bus identity of a bridge instance

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a generated identity
pub const GENERATED_LEN: usize = 16;

/// Identity used when no device is attached
pub const OFFLINE_IDENTITY: &str = "Mock Motor";

/// Non-empty label naming one bridge on the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

/// Returned when an identity would be empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("identity must not be empty")]
pub struct EmptyIdentity;

impl Identity {
    /// Create an identity, rejecting empty labels
    pub fn new(name: impl Into<String>) -> Result<Self, EmptyIdentity> {
        let name = name.into();
        if name.is_empty() {
            Err(EmptyIdentity)
        } else {
            Ok(Self(name))
        }
    }

    /// Generate a fresh random alphanumeric identity
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let name: String = (0..GENERATED_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        Self(name)
    }

    /// The fixed offline identity
    pub fn offline() -> Self {
        Self(OFFLINE_IDENTITY.to_string())
    }

    /// Identity as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = EmptyIdentity;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl PartialEq<str> for Identity {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identity {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Identity::new(""), Err(EmptyIdentity));
        assert_eq!(Identity::new("Foo").unwrap().as_str(), "Foo");
    }

    #[test]
    fn test_generate_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let identity = Identity::generate(&mut rng);
        assert_eq!(identity.as_str().len(), GENERATED_LEN);
        assert!(identity.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_deterministic_with_seed() {
        let a = Identity::generate(&mut StdRng::seed_from_u64(42));
        let b = Identity::generate(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_rejects_empty() {
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
        let identity: Identity = serde_json::from_str("\"Pump 3\"").unwrap();
        assert_eq!(identity, "Pump 3");
    }
}
