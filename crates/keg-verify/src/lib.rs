//! Content verification primitives for downloaded artifacts.
//!
//! Hashes are computed incrementally while bytes stream through, so an
//! artifact is read once for both storage and verification.
//!
//! # Example
//!
//! ```
//! use keg_verify::{Checksum, Sha256Hasher, VerifiedReader};
//! use std::io::Read;
//!
//! let expected = Checksum::of(b"hello world");
//!
//! let mut reader = VerifiedReader::new(&b"hello world"[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! reader.read_to_end(&mut buffer).unwrap();
//!
//! reader.finish(&expected).unwrap();
//! ```

pub use self::checksum::{Algorithm, Checksum};
pub use self::error::{Result, VerificationError};
pub use self::hasher::{Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;

mod checksum;
mod error;
mod hasher;
mod reader;
