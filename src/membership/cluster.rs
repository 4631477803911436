//! The Cluster View: the port through which the Raft Context and the
//! Membership Rebalancer inspect and mutate member tiers. Mirrors
//! `protos.rs::Configuration` (`members: HashSet<ServerId>`, `learners:
//! HashSet<ServerId>`) and its `ConfigChange` enum, generalized from a
//! 2-tier member/learner model to a 4-tier model, since reconfiguration
//! here is expressed as leader-issued member-type changes coordinated
//! through this port instead of a log-embedded joint-consensus mechanism.

use async_trait::async_trait;

use crate::errors::Result;
use crate::protos::MemberId;

/// The tier a member currently occupies. Voters are `Active`; `Promotable`
/// members are voters-in-waiting that haven't finished catching up yet.
/// This crate only ever asks a member to become `Promotable`, never
/// `Active` directly, since the catch-up/promotion-to-voter decision is
/// made by the collaborator that owns replication progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberType {
    Active,
    Promotable,
    Passive,
    Reserve,
}

impl MemberType {
    /// Whether this tier counts toward the rebalancer's active population
    /// (voters and voters-in-waiting together).
    pub fn is_voter_track(&self) -> bool {
        matches!(self, MemberType::Active | MemberType::Promotable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Available,
    Unavailable,
}

/// A single row of the cluster member table.
#[derive(Debug, Clone, Copy)]
pub struct Member {
    pub id: MemberId,
    pub member_type: MemberType,
    pub status: MemberStatus,
}

/// The live view of cluster membership. A concrete implementation owns the
/// member table, the async promote/demote RPCs, and the change-callback
/// wiring. `RaftContext` holds one of these to answer "is this id a current
/// member" for vote handling, and the Membership Rebalancer holds the same
/// one to read tallies and issue actions; only one promote or demote call is
/// ever in flight per `rebalance()` pass.
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// A point-in-time snapshot of every known member, including this node.
    fn members(&self) -> Vec<Member>;

    /// This node's own id, so the rebalancer can exclude itself from
    /// demotion candidates.
    fn self_id(&self) -> MemberId;

    /// Requests that `id` transition to `target`. Asynchronous; the
    /// rebalancer re-runs once this resolves.
    async fn promote(&self, id: MemberId, target: MemberType) -> Result<()>;

    /// Requests that `id` transition to `target`.
    async fn demote(&self, id: MemberId, target: MemberType) -> Result<()>;
}

/// A `ClusterView` used by this crate's own tests: a fixed member table with
/// promote/demote recorded as no-ops.
#[derive(Debug, Clone)]
pub struct StaticClusterView {
    self_id: MemberId,
    members: Vec<Member>,
}

impl StaticClusterView {
    /// Builds a view where every id in `ids` is an available ACTIVE voter,
    /// the common case for tests that only care about membership lookup
    /// rather than tiering.
    pub fn new(self_id: MemberId, ids: impl IntoIterator<Item = MemberId>) -> Self {
        StaticClusterView {
            self_id,
            members: ids
                .into_iter()
                .map(|id| Member { id, member_type: MemberType::Active, status: MemberStatus::Available })
                .collect(),
        }
    }

    /// Builds a view from an explicit member table, for tests that need
    /// specific tiers or statuses.
    pub fn with_members(self_id: MemberId, members: Vec<Member>) -> Self {
        StaticClusterView { self_id, members }
    }
}

#[async_trait]
impl ClusterView for StaticClusterView {
    fn members(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn self_id(&self) -> MemberId {
        self.self_id
    }

    async fn promote(&self, _id: MemberId, _target: MemberType) -> Result<()> {
        Ok(())
    }

    async fn demote(&self, _id: MemberId, _target: MemberType) -> Result<()> {
        Ok(())
    }
}
