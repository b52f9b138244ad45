use crate::screen::ScreenSample;
use sha2::{
    Digest,
    Sha256,
};
use std::fmt;

/// Content digest of one screen sample.
///
/// Two fingerprints are equal iff the underlying pixel bytes (and region
/// dimensions) are bit-identical. A cryptographic digest keeps collision
/// odds negligible so a mid-animation frame never reads as "unchanged".
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(sample: &ScreenSample) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sample.region.width.to_le_bytes());
        hasher.update(sample.region.height.to_le_bytes());
        hasher.update(&sample.pixels);
        Fingerprint(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short prefix keeps trace lines readable
        write!(f, "fp:{}", hex::encode(&self.0[..6]))
    }
}
