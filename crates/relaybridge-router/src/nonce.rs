//! Single-use tracking for reply nonces.
//!
//! Every [`relaybridge_core::reply::Reply`] carries a fresh nonce so a
//! duplicate delivery of the same channel callback (double-tap, retried
//! webhook) injects at most once.

use std::collections::HashSet;
use std::sync::Mutex;

use relaybridge_core::ids::Nonce;

#[derive(Default)]
pub struct NonceStore {
    seen: Mutex<HashSet<Nonce>>,
}

impl NonceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `nonce` as used, returning `true` the first time it's seen and
    /// `false` on every subsequent attempt to reuse it.
    pub fn claim(&self, nonce: &Nonce) -> bool {
        self.seen.lock().unwrap_or_else(|p| p.into_inner()).insert(nonce.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_claim_succeeds() {
        let store = NonceStore::new();
        assert!(store.claim(&Nonce::new()));
    }

    #[test]
    fn second_claim_of_same_nonce_fails() {
        let store = NonceStore::new();
        let nonce = Nonce::new();
        assert!(store.claim(&nonce));
        assert!(!store.claim(&nonce));
    }

    #[test]
    fn distinct_nonces_are_independent() {
        let store = NonceStore::new();
        assert!(store.claim(&Nonce::new()));
        assert!(store.claim(&Nonce::new()));
    }
}
