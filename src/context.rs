//! The Raft Context: the shared mutable state of one node, plus the `Tick`
//! side-effect accumulator handlers write into. Mirrors
//! `consensus.rs::Tick`, which accumulates `meta`/`config`/`messages`/
//! `next_tick` side effects for a caller to act on after a handler returns,
//! rather than acting on them inline.

use std::future::Future;
use std::pin::Pin;
use std::thread::{self, ThreadId};
use std::time::Instant;

use async_trait::async_trait;
use ::log::debug;

use crate::errors::Result;
use crate::membership::cluster::ClusterView;
use crate::protos::{MemberId, Term};

/// The target of a role transition this core can request. Candidate/Leader
/// sub-states are out of scope, so the only variant this crate ever asks for
/// is `Follower`: stepping down from whatever the node was doing before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTarget {
    Follower,
}

/// Injected collaborator that actually performs a role transition (e.g.
/// cancelling in-flight candidate/leader async work). This core only ever
/// calls `transition(Follower)`; what that means for a candidate or leader
/// role is entirely the collaborator's concern.
#[async_trait]
pub trait TransitionSink: Send + Sync {
    async fn transition(&self, target: RoleTarget) -> Result<()>;
}

/// A `TransitionSink` that does nothing, for tests and for nodes that don't
/// need to hook role transitions.
pub struct NoopTransitionSink;

#[async_trait]
impl TransitionSink for NoopTransitionSink {
    async fn transition(&self, _target: RoleTarget) -> Result<()> {
        Ok(())
    }
}

/// This node's role. Only `Follower` carries state this core reads/writes;
/// `Candidate`/`Leader` are opaque markers, sufficient to make the
/// `Follower` transition idempotent when already a follower.
pub enum Role {
    Follower(FollowerState),
    Candidate,
    Leader,
}

pub struct FollowerState {
    pub last_heartbeat: Instant,
    pub last_leader_id: MemberId,
}

impl FollowerState {
    fn new(now: Instant) -> Self {
        FollowerState {
            last_heartbeat: now,
            last_leader_id: 0,
        }
    }
}

/// Side effects requested by a single handler invocation, collected for the
/// caller to carry out once the (synchronous) handler has returned. Mirrors
/// `consensus.rs::Tick`.
pub struct Tick {
    pub time: Instant,

    /// Set when `current_term`/`leader_id`/`last_voted_for`/`commit_index`/
    /// `last_applied` changed and should be persisted by the caller.
    pub meta_dirty: bool,

    /// Set when new entries were appended to the log.
    pub new_entries: bool,

    /// Present if this handler invocation ended with a pending role
    /// transition the caller must drive to completion, fire-and-forget from
    /// this core's perspective.
    pub pending_transition: Option<Pin<Box<dyn Future<Output = Result<()>> + Send>>>,
}

impl Tick {
    pub fn empty() -> Self {
        Tick {
            time: Instant::now(),
            meta_dirty: false,
            new_entries: false,
            pending_transition: None,
        }
    }

    pub fn write_meta(&mut self) {
        self.meta_dirty = true;
    }
}

/// The shared mutable state of one node.
pub struct RaftContext {
    id: MemberId,

    current_term: Term,
    /// `0` means "no leader known".
    leader_id: MemberId,
    /// `0` means "no vote cast this term".
    last_voted_for: MemberId,
    commit_index: u64,
    last_applied: u64,

    role: Role,
    cluster: std::sync::Arc<dyn ClusterView>,

    transitions: std::sync::Arc<dyn TransitionSink>,
    owner_thread: ThreadId,
}

impl RaftContext {
    pub fn new(id: MemberId, cluster: std::sync::Arc<dyn ClusterView>, transitions: std::sync::Arc<dyn TransitionSink>) -> Self {
        RaftContext {
            id,
            current_term: 0,
            leader_id: 0,
            last_voted_for: 0,
            commit_index: 0,
            last_applied: 0,
            role: Role::Follower(FollowerState::new(Instant::now())),
            cluster,
            transitions,
            owner_thread: thread::current().id(),
        }
    }

    /// Enforces the single-logical-executor invariant: every context/log
    /// mutation must happen on the node's owning thread.
    pub fn check_thread(&self) {
        assert_eq!(
            thread::current().id(),
            self.owner_thread,
            "RaftContext accessed from a thread other than its owner; handlers must be \
             serialized onto the node's single logical executor"
        );
    }

    pub fn id(&self) -> MemberId {
        self.id
    }

    pub fn current_term(&self) -> Term {
        self.current_term
    }

    pub fn leader_id(&self) -> MemberId {
        self.leader_id
    }

    pub fn last_voted_for(&self) -> MemberId {
        self.last_voted_for
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Queries the live cluster view, so a member added or promoted after
    /// this context was constructed is seen immediately.
    pub fn is_member(&self, id: MemberId) -> bool {
        self.cluster.members().iter().any(|m| m.id == id)
    }

    /// The live cluster view this context and the Membership Rebalancer
    /// both read from.
    pub(crate) fn cluster(&self) -> &std::sync::Arc<dyn ClusterView> {
        &self.cluster
    }

    pub fn is_follower(&self) -> bool {
        matches!(self.role, Role::Follower(_))
    }

    /// Whether this node currently believes itself to be leader. Driving the
    /// candidate/leader sub-states themselves is out of scope here, so this
    /// just reads the discriminant a candidate/leader-driving collaborator
    /// elsewhere set via `transition`/`note_elected_leader`.
    pub fn is_leader(&self) -> bool {
        matches!(self.role, Role::Leader)
    }

    pub(crate) fn follower_state_mut(&mut self) -> Option<&mut FollowerState> {
        match &mut self.role {
            Role::Follower(s) => Some(s),
            _ => None,
        }
    }

    /// Unconditionally advances `current_term` and records the new leader.
    /// Marks `tick.meta_dirty`.
    pub(crate) fn set_term_and_leader(&mut self, term: Term, leader_id: MemberId, tick: &mut Tick) {
        self.current_term = term;
        self.leader_id = leader_id;
        tick.write_meta();
    }

    /// Sets `current_term` alone, for the vote handler's term bump,
    /// resetting `last_voted_for`: canonical Raft clears the vote on every
    /// term advance.
    pub(crate) fn bump_term(&mut self, term: Term, tick: &mut Tick) {
        if term > self.current_term {
            self.current_term = term;
            self.last_voted_for = 0;
            tick.write_meta();
        }
    }

    pub(crate) fn set_voted_for(&mut self, candidate: MemberId, tick: &mut Tick) {
        self.last_voted_for = candidate;
        tick.write_meta();
    }

    pub(crate) fn set_commit_index(&mut self, index: u64, tick: &mut Tick) {
        self.commit_index = index;
        tick.write_meta();
    }

    pub(crate) fn set_last_applied(&mut self, index: u64) {
        self.last_applied = index;
    }

    /// Requests a step-down to FOLLOWER. Idempotent if already a follower.
    /// The actual async completion is handed to the caller via
    /// `tick.pending_transition` rather than awaited here, since handlers
    /// run synchronously.
    pub(crate) fn request_follower_transition(&mut self, tick: &mut Tick) {
        if self.is_follower() {
            debug!("already a follower; FOLLOWER transition is a no-op");
            return;
        }

        self.role = Role::Follower(FollowerState::new(tick.time));
        let sink = self.transitions.clone();
        tick.pending_transition = Some(Box::pin(async move { sink.transition(RoleTarget::Follower).await }));
    }

    /// Records that an out-of-scope candidate/leader collaborator has won
    /// an election for this node. This core never drives an election
    /// itself, but the Membership Rebalancer needs to know when it gains or
    /// loses leadership, so whatever external code wins the election
    /// reports it here.
    pub fn note_elected_leader(&mut self) {
        self.role = Role::Leader;
    }
}
