//! Runtime-configurable options. Mirrors `protos::Metadata`'s `Default`-impl
//! idiom, but for tunables rather than persistent state.

use std::time::Duration;

use rand::RngCore;

/// At some random point within this range, a follower with no leader
/// contact becomes a candidate. Mirrors `consensus.rs::ELECTION_TIMEOUT`,
/// made runtime-configurable since this crate describes election timing
/// without driving elections itself.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// Target number of voting (ACTIVE) members. Defaults to the size of
    /// the initial member list, which the caller of `RaftNode::new` must
    /// supply since this crate has no discovery mechanism of its own.
    pub quorum_hint: usize,

    /// Multiplier for the passive (non-voting, replicating) population
    /// target: `target_passive = quorum_hint * backup_count`.
    pub backup_count: usize,

    /// Range within which a follower randomizes its election timeout.
    pub election_timeout: (Duration, Duration),

    /// Interval at which a leader sends an empty append (heartbeat) if no
    /// other traffic has gone out.
    pub heartbeat_interval: Duration,

    /// How long a client session is considered valid with no activity.
    pub session_timeout: Duration,
}

impl RaftConfig {
    /// Builds a config whose `quorum_hint` defaults to the given initial
    /// member count.
    pub fn with_initial_members(member_count: usize) -> Self {
        RaftConfig {
            quorum_hint: member_count,
            ..RaftConfig::default()
        }
    }

    /// Draws a fresh randomized election timeout within `self.election_timeout`.
    /// This core never starts its own timers; the active handlers are
    /// time-free, but a caller driving a follower's timeout needs a way to
    /// pick one. Mirrors `consensus.rs::new_election_timeout`'s formula
    /// exactly, generalized from a fixed constant to `self`'s range.
    pub fn random_election_timeout(&self) -> Duration {
        let (low, high) = self.election_timeout;
        let mut rng = rand::thread_rng();
        let span = (high - low).as_millis() as u64;
        let offset = (rng.next_u32() as u64 * span) / (std::u32::MAX as u64);
        low + Duration::from_millis(offset)
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            quorum_hint: 0,
            backup_count: 0,
            election_timeout: (Duration::from_millis(400), Duration::from_millis(800)),
            heartbeat_interval: Duration::from_millis(150),
            session_timeout: Duration::from_secs(30),
        }
    }
}
