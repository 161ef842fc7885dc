// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Challenge checking: an asynchronous, composable predicate over the
//! attestation challenge bytes.  The verifier awaits the returned future at
//! exactly one point; a cancelled future propagates, and the library never
//! imposes its own timeout.

use futures::future::BoxFuture;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Decides whether an attestation challenge is acceptable.
pub trait ChallengeChecker: Send + Sync {
    /// Returns a future resolving to `true` when the challenge passes.
    fn check_challenge<'a>(&'a self, challenge: &'a [u8]) -> BoxFuture<'a, bool>;
}

/// Accepts exactly one expected challenge value, compared in constant
/// time.
pub struct ChallengeMatcher {
    expected: Vec<u8>,
}

impl ChallengeMatcher {
    pub fn new(expected: impl Into<Vec<u8>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ChallengeChecker for ChallengeMatcher {
    fn check_challenge<'a>(&'a self, challenge: &'a [u8]) -> BoxFuture<'a, bool> {
        let ok = self.expected.len() == challenge.len()
            && openssl::memcmp::eq(&self.expected, challenge);
        Box::pin(futures::future::ready(ok))
    }
}

/// Accepts any challenge at most once, remembering the most recently seen
/// ones up to a capacity bound.
///
/// Every check either inserts the challenge and returns `true`, or finds
/// it, refreshes its recency and returns `false`; the least recently seen
/// entry is evicted on overflow.  The cache is the only mutable shared
/// state in this crate and is guarded by a mutex, so a given challenge is
/// accepted at most once across concurrent callers.
pub struct OneTimeChallengeCache {
    seen: Mutex<LruCache<Vec<u8>, ()>>,
}

impl OneTimeChallengeCache {
    /// A cache remembering up to `max_size` challenges (at least one).
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl ChallengeChecker for OneTimeChallengeCache {
    fn check_challenge<'a>(&'a self, challenge: &'a [u8]) -> BoxFuture<'a, bool> {
        let mut seen = self.seen.lock().unwrap();
        let fresh = match seen.get(challenge) {
            Some(()) => false,
            None => {
                seen.put(challenge.to_vec(), ());
                true
            }
        };
        Box::pin(futures::future::ready(fresh))
    }
}

/// Runs checkers in order, awaiting each; the first `false` short-circuits
/// the rest.  An empty chain accepts everything.
#[derive(Default)]
pub struct ChallengeCheckerChain {
    checkers: Vec<Box<dyn ChallengeChecker>>,
}

impl ChallengeCheckerChain {
    pub fn new(checkers: Vec<Box<dyn ChallengeChecker>>) -> Self {
        Self { checkers }
    }
}

impl ChallengeChecker for ChallengeCheckerChain {
    fn check_challenge<'a>(&'a self, challenge: &'a [u8]) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            for checker in &self.checkers {
                if !checker.check_challenge(challenge).await {
                    return false;
                }
            }
            true
        })
    }
}
