// Unreliable point-to-point fan-out between every pair of members:
// a gossip seed list for discovery, a heartbeat for liveness, and
// dead-peer eviction when a heartbeat deadline is missed. EVS sits on
// top and turns what this layer delivers into reliable, ordered
// delivery; this layer just decides who's currently reachable.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use wsrep_base::MemberId;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeerState {
    Discovering,
    Connected,
    Suspect,
}

struct Peer {
    state: PeerState,
    last_seen: Instant,
}

/// Tracks peer liveness from a configurable seed list. Does not own any
/// sockets itself — `wsrep-repl`'s wiring layer owns one `TcpSocket` per
/// peer and calls `on_heartbeat`/`evict_stale` to drive this state.
pub struct GmCast {
    seeds: Vec<String>,
    peers: HashMap<MemberId, Peer>,
    heartbeat_period: Duration,
    suspect_after: Duration,
    evict_after: Duration,
}

impl GmCast {
    pub fn new(seeds: Vec<String>, heartbeat_period: Duration, suspect_after: Duration, evict_after: Duration) -> Self {
        GmCast {
            seeds,
            peers: HashMap::new(),
            heartbeat_period,
            suspect_after,
            evict_after,
        }
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_period
    }

    pub fn note_discovered(&mut self, member: MemberId) {
        self.peers.entry(member).or_insert_with(|| Peer {
            state: PeerState::Discovering,
            last_seen: Instant::now(),
        });
    }

    pub fn on_heartbeat(&mut self, member: MemberId) {
        let peer = self.peers.entry(member).or_insert_with(|| Peer {
            state: PeerState::Discovering,
            last_seen: Instant::now(),
        });
        peer.state = PeerState::Connected;
        peer.last_seen = Instant::now();
    }

    pub fn state_of(&self, member: &MemberId) -> Option<PeerState> {
        self.peers.get(member).map(|p| p.state)
    }

    /// Called periodically (driven by a `wsrep-reactor::TimerQueue`
    /// entry); marks peers past `suspect_after` as `Suspect` and
    /// returns the set that crossed `evict_after` — those are handed
    /// up to EVS as departures, which will trigger a new view.
    pub fn evict_stale(&mut self) -> Vec<MemberId> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.peers.retain(|member, peer| {
            let idle = now.duration_since(peer.last_seen);
            if idle >= self.evict_after {
                evicted.push(*member);
                return false;
            }
            if idle >= self.suspect_after {
                peer.state = PeerState::Suspect;
            }
            true
        });
        evicted
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = &MemberId> {
        self.peers
            .iter()
            .filter(|(_, p)| p.state == PeerState::Connected)
            .map(|(m, _)| m)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn heartbeat_marks_connected() {
        let mut g = GmCast::new(vec![], Duration::from_millis(10), Duration::from_secs(1), Duration::from_secs(2));
        let m = MemberId::new();
        g.note_discovered(m);
        assert_eq!(g.state_of(&m), Some(PeerState::Discovering));
        g.on_heartbeat(m);
        assert_eq!(g.state_of(&m), Some(PeerState::Connected));
    }

    #[test]
    fn eviction_removes_long_silent_peers() {
        let mut g = GmCast::new(vec![], Duration::from_millis(1), Duration::from_millis(1), Duration::from_millis(1));
        let m = MemberId::new();
        g.note_discovered(m);
        std::thread::sleep(Duration::from_millis(5));
        let evicted = g.evict_stale();
        assert_eq!(evicted, vec![m]);
        assert_eq!(g.state_of(&m), None);
    }
}
