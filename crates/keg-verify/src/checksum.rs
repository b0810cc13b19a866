use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Hasher, Result, Sha256Hasher, VerificationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha256,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
        }
    }

    pub fn hasher(self) -> Sha256Hasher {
        match self {
            Self::Sha256 => Sha256Hasher::new(),
        }
    }
}

/// An expected digest, written as `sha256:<hex>` or bare hex.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
    algorithm: Algorithm,
    digest: Vec<u8>,
}

impl Checksum {
    pub fn sha256(digest: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: Algorithm::Sha256,
            digest: digest.into(),
        }
    }

    /// Checksum of `data`, mostly useful for tests and local sources.
    pub fn of(data: &[u8]) -> Self {
        Self::sha256(Sha256Hasher::digest(data))
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Compare a finished digest against this checksum.
    pub fn check(&self, actual: &[u8]) -> Result<()> {
        if actual == self.digest.as_slice() {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: self.to_hex(),
                actual: hex::encode(actual),
            })
        }
    }

    pub fn verify(&self, data: &[u8]) -> Result<()> {
        let mut hasher = self.algorithm.hasher();
        hasher.update(data);
        self.check(&hasher.finalize())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.name(), self.to_hex())
    }
}

impl FromStr for Checksum {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex_part) = match s.split_once(':') {
            Some(("sha256", rest)) => (Algorithm::Sha256, rest),
            Some((other, _)) => return Err(VerificationError::UnsupportedAlgorithm(other.into())),
            None => (Algorithm::Sha256, s),
        };
        let digest =
            hex::decode(hex_part.trim()).map_err(|_| VerificationError::InvalidChecksum(s.into()))?;
        if digest.len() != algorithm.digest_len() {
            return Err(VerificationError::InvalidChecksum(s.into()));
        }
        Ok(Self { algorithm, digest })
    }
}

impl TryFrom<String> for Checksum {
    type Error = VerificationError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn parse_prefixed_and_bare() {
        let prefixed: Checksum = format!("sha256:{HELLO}").parse().unwrap();
        let bare: Checksum = HELLO.parse().unwrap();
        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.to_string(), format!("sha256:{HELLO}"));
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            "sha256:abcd".parse::<Checksum>(),
            Err(VerificationError::InvalidChecksum(_))
        ));
        assert!(matches!(
            format!("md5:{HELLO}").parse::<Checksum>(),
            Err(VerificationError::UnsupportedAlgorithm(_))
        ));
        assert!("not hex at all".parse::<Checksum>().is_err());
    }

    #[test]
    fn verify_detects_single_byte_change() {
        let checksum: Checksum = HELLO.parse().unwrap();
        checksum.verify(b"hello world").unwrap();
        let result = checksum.verify(b"hello worle");
        assert!(matches!(result, Err(VerificationError::Mismatch { .. })));
    }

    #[test]
    fn serde_as_string() {
        let checksum = Checksum::of(b"hello world");
        let json = serde_json::to_string(&checksum).unwrap();
        assert_eq!(json, format!("\"sha256:{HELLO}\""));
        let back: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(back, checksum);
    }
}
