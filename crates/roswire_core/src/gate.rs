use std::sync::atomic::{AtomicUsize, Ordering};

/// Peer counter shared between a transport endpoint and its wrappers.
///
/// Intended use:
/// - a publisher calls `attach()` when a subscriber link completes its
///   header exchange and `detach()` when the link goes away
/// - `send` paths check `has_peers()` to skip work when nobody listens
#[derive(Debug)]
pub struct PeerGate {
    peers: AtomicUsize,
}

impl PeerGate {
    pub const fn new() -> Self {
        Self {
            peers: AtomicUsize::new(0),
        }
    }

    pub fn attach(&self) {
        self.peers.fetch_add(1, Ordering::Release);
    }

    /// Saturating: detaching below zero stays at zero.
    pub fn detach(&self) {
        let _ = self
            .peers
            .fetch_update(Ordering::Release, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn has_peers(&self) -> bool {
        self.peer_count() > 0
    }

    pub fn peer_count(&self) -> usize {
        self.peers.load(Ordering::Acquire)
    }
}

impl Default for PeerGate {
    fn default() -> Self {
        Self::new()
    }
}
