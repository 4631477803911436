//! `RaftNode`: the builder/assembly type bundling a `RaftContext`, a
//! `LogStorage` handle, a `StateMachine` handle, and a `RaftConfig` behind
//! the three inbound RPC entry points plus a `rebalance()` trigger.
//! Mirrors `consensus.rs::ConsensusModule::new`'s assembly pattern, which
//! bundles `id`, `meta`, `config`, and `log` into one struct with a
//! constructor performing startup reconciliation.

use std::sync::Arc;

use crate::active;
use crate::commit::{self, StateMachine};
use crate::config::RaftConfig;
use crate::context::{RaftContext, Tick, TransitionSink};
use crate::errors::Result;
use crate::log::LogStorage;
use crate::membership::{rebalancer, ClusterView};
use crate::protos::{AppendRequest, AppendResponse, MemberId, PollRequest, PollResponse, VoteRequest, VoteResponse};

/// One node's full assembly of consensus-core collaborators. Owns the
/// `RaftContext` and the log exclusively (the log is an exclusive resource
/// of the node); `StateMachine`/`TransitionSink` are shared handles since
/// they're driven from outside this core too, e.g. a transport layer
/// delivering RPCs concurrently with this node's own handler calls,
/// serialized by the single logical executor rather than by locking here.
/// `ClusterView` is held only by `ctx`, which both the vote handler and the
/// rebalancer read from, so member changes made after construction are
/// always visible.
pub struct RaftNode {
    ctx: RaftContext,
    log: Box<dyn LogStorage>,
    state_machine: Arc<dyn StateMachine>,
    config: RaftConfig,
}

impl RaftNode {
    pub fn new(
        id: MemberId,
        cluster: Arc<dyn ClusterView>,
        log: Box<dyn LogStorage>,
        state_machine: Arc<dyn StateMachine>,
        transitions: Arc<dyn TransitionSink>,
        config: RaftConfig,
    ) -> Self {
        RaftNode {
            ctx: RaftContext::new(id, cluster, transitions),
            log,
            state_machine,
            config,
        }
    }

    pub fn context(&self) -> &RaftContext {
        &self.ctx
    }

    /// Handles an inbound `AppendRequest` end to end: the Active Role
    /// handler, then the Commit Applier's apply loop, then awaiting any
    /// pending FOLLOWER transition the handler requested.
    pub async fn append(&mut self, req: AppendRequest) -> Result<AppendResponse> {
        let mut tick = Tick::empty();
        let resp = active::handle_append(&mut self.ctx, self.log.as_mut(), req, &mut tick)?;

        commit::apply_committed(&mut self.ctx, self.log.as_ref(), self.state_machine.as_ref());

        if let Some(transition) = tick.pending_transition.take() {
            transition.await?;
        }

        Ok(resp)
    }

    /// Handles an inbound `PollRequest`. Read-only; no tick.
    pub fn poll(&self, req: PollRequest) -> PollResponse {
        active::handle_poll(&self.ctx, self.log.as_ref(), req)
    }

    /// Handles an inbound `VoteRequest`.
    pub fn vote(&mut self, req: VoteRequest) -> VoteResponse {
        let mut tick = Tick::empty();
        active::handle_vote(&mut self.ctx, self.log.as_ref(), req, &mut tick)
    }

    /// Records that this node won an election, per `RaftContext::note_elected_leader`.
    pub fn note_elected_leader(&mut self) {
        self.ctx.note_elected_leader();
    }

    /// Runs the Membership Rebalancer to a fixed point. A no-op unless this
    /// node currently believes itself leader. Callers invoke this on every
    /// membership-change event: leader election, member join, member leave,
    /// member type/status change.
    pub async fn rebalance(&self) -> Result<()> {
        rebalancer::rebalance(&self.ctx, self.config.quorum_hint, self.config.backup_count).await
    }
}
