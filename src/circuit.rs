//! Per-stream circuit identities.
//!
//! The anonymizing proxy isolates streams by the SOCKS username/password pair
//! they authenticate with. Giving every request stream a pair nobody else has
//! used forces it onto its own circuit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// An opaque token bound to exactly one request stream.
///
/// Identities are not `Clone`: rendering the proxy credentials consumes the
/// token, so the same identity cannot parameterize two requests.
#[derive(PartialEq, Eq, Hash)]
pub struct CircuitIdentity {
    nonce: u32,
    sequence: u64,
}

impl CircuitIdentity {
    /// Position of this identity in its generator's sequence.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Proxy username for this stream.
    pub fn username(&self) -> String {
        format!("harvest-{:08x}-{}", self.nonce, self.sequence)
    }

    /// Proxy password for this stream.
    pub fn password(&self) -> String {
        format!("{:08x}", self.nonce)
    }

    /// Consumes the identity and returns its `(username, password)` pair.
    pub fn into_credentials(self) -> (String, String) {
        (self.username(), self.password())
    }
}

impl fmt::Debug for CircuitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CircuitIdentity(#{})", self.sequence)
    }
}

/// Monotonic source of [`CircuitIdentity`] values.
///
/// The nonce is drawn once per generator so that credentials from a previous
/// run are never replayed against a long-lived proxy.
#[derive(Debug)]
pub struct CircuitIdentityGenerator {
    nonce: u32,
    next: AtomicU64,
}

impl CircuitIdentityGenerator {
    /// Creates a generator with a time-derived nonce.
    pub fn new() -> Self {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u32;
        Self::with_nonce(nonce)
    }

    /// Creates a generator with a fixed nonce.
    pub fn with_nonce(nonce: u32) -> Self {
        Self {
            nonce,
            next: AtomicU64::new(0),
        }
    }

    /// Mints the next identity.
    pub fn mint(&self) -> CircuitIdentity {
        CircuitIdentity {
            nonce: self.nonce,
            sequence: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Number of identities minted so far.
    pub fn minted(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for CircuitIdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}
