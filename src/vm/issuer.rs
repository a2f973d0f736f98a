//! Process-wide identifier issuing for threads and requests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic identifier source.
///
/// Every call to [`IdIssuer::issue`] returns a value strictly greater than
/// any previous one, starting at 1. Thread IDs and request IDs each come
/// from their own instance; the request-ID instance is shared by every
/// execution context so a request ID identifies one request process-wide.
#[derive(Debug, Default)]
pub struct IdIssuer {
    next: AtomicU64,
}

impl IdIssuer {
    /// Create an issuer whose first issued value is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh identifier.
    pub fn issue(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_above_zero() {
        let issuer = IdIssuer::new();
        assert_eq!(issuer.issue(), 1);
    }

    #[test]
    fn strictly_increasing() {
        let issuer = IdIssuer::new();
        let mut last = 0;
        for _ in 0..1_000 {
            let id = issuer.issue();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn instances_are_independent() {
        let a = IdIssuer::new();
        let b = IdIssuer::new();
        a.issue();
        a.issue();
        assert_eq!(b.issue(), 1);
    }
}
