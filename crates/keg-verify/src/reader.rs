use std::io::{self, Read};

use crate::{Checksum, Hasher, Result};

/// Streaming reader that hashes data as it passes through.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self { reader, hasher }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    /// Finalize and compare against the expected checksum.
    pub fn finish(self, expected: &Checksum) -> Result<()> {
        expected.check(&self.into_digest())
    }

    /// Digest of everything read so far, for callers that report the
    /// mismatch themselves.
    pub fn into_digest(self) -> Vec<u8> {
        self.hasher.finalize()
    }
}
