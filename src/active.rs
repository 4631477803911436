//! The Active Role State Machine: pure-over-(context, log) handlers for the
//! three inbound RPCs. Restructured from `consensus.rs::append_entries`/
//! `pre_vote`/`request_vote` into numbered steps, and rebuilt to use the
//! canonical up-to-date predicate and to clear the vote on every term
//! advance rather than the source's literal behavior.

use ::log::{debug, warn};

use crate::commit;
use crate::context::{RaftContext, Tick};
use crate::errors::Result;
use crate::log::LogStorage;
use crate::protos::{
    AppendRequest, AppendResponse, LogEntry, LogIndex, PollRequest, PollResponse, Status, Term,
    VoteRequest, VoteResponse,
};

/// Handles an inbound `AppendRequest`.
pub fn handle_append(
    ctx: &mut RaftContext,
    log: &mut dyn LogStorage,
    req: AppendRequest,
    tick: &mut Tick,
) -> Result<AppendResponse> {
    ctx.check_thread();

    // Step 1: term reconciliation.
    let should_step_down = req.term > ctx.current_term()
        || (req.term == ctx.current_term() && ctx.leader_id() == 0);
    if should_step_down {
        ctx.set_term_and_leader(req.term, req.leader_id, tick);
    }

    let reject = |ctx: &RaftContext, log: &dyn LogStorage| AppendResponse {
        status: Status::Ok,
        term: ctx.current_term(),
        succeeded: false,
        log_index: log.last_index(),
    };

    // Step 2: stale leader rejection.
    if req.term < ctx.current_term() {
        warn!(
            "rejecting append from stale term {} (current term {})",
            req.term,
            ctx.current_term()
        );
        return Ok(reject(ctx, log));
    }

    // Step 3: previous-entry consistency (skipped when there is no
    // precondition, i.e. prev_log_index == 0 && prev_log_term == 0).
    if req.prev_log_index != 0 && req.prev_log_term != 0 {
        if log.is_empty() || req.prev_log_index > log.last_index() {
            warn!("rejecting append: prev_log_index {} is beyond our log", req.prev_log_index);
            return Ok(reject(ctx, log));
        }

        match log.get_entry(req.prev_log_index) {
            Some(m) if m.term == req.prev_log_term => {}
            _ => {
                warn!(
                    "rejecting append: term mismatch at prev_log_index {}",
                    req.prev_log_index
                );
                return Ok(reject(ctx, log));
            }
        }
    }

    // Step 4: append, in order.
    for e in req.entries.into_iter() {
        append_one(ctx, log, e)?;
    }

    // Step 5: commit advance.
    commit::advance_commit_index(ctx, log, req.commit_index, tick);

    // Step 6: recycle.
    if req.recycle_index > 0 {
        log.recycle(req.recycle_index);
    }

    // Deferred role transition, now that the log/commit mutations are done.
    if should_step_down {
        ctx.request_follower_transition(tick);
    }

    // Step 7: response.
    Ok(AppendResponse {
        status: Status::Ok,
        term: ctx.current_term(),
        succeeded: true,
        log_index: log.last_index(),
    })
}

fn append_one(ctx: &mut RaftContext, log: &mut dyn LogStorage, e: LogEntry) -> Result<()> {
    if log.contains_index(e.index) {
        let existing = log.get_entry(e.index);
        let conflicts = match &existing {
            None => true,
            Some(m) => m.term != e.term,
        };

        if conflicts {
            if e.index <= ctx.commit_index() {
                return Err(crate::errors::ErrorKind::InvariantViolation(format!(
                    "refusing to truncate index {} at or below commit_index {}",
                    e.index,
                    ctx.commit_index()
                ))
                .into());
            }

            debug!("truncating log suffix at index {} due to term conflict", e.index);
            log.truncate(e.index - 1);
            if log.last_index() + 1 != e.index {
                return Err(crate::errors::ErrorKind::InvariantViolation(format!(
                    "log port left last_index at {} after truncate(); expected {}",
                    log.last_index(),
                    e.index - 1
                ))
                .into());
            }
            log.create_entry(e);
        }
        // Else: entry already present with matching term, idempotent
        // overwrite, leave it in place.
    } else {
        let gap = e.index - log.last_index() - 1;
        log.skip(gap);
        log.create_entry(e);
    }

    Ok(())
}

/// Handles an inbound `PollRequest` (pre-vote probe). Never mutates
/// `last_voted_for` or `current_term`.
pub fn handle_poll(ctx: &RaftContext, log: &dyn LogStorage, req: PollRequest) -> PollResponse {
    ctx.check_thread();

    let accepted = is_up_to_date(log, req.last_log_index, req.last_log_term);

    PollResponse {
        status: Status::Ok,
        term: ctx.current_term(),
        accepted,
    }
}

/// Handles an inbound `VoteRequest`.
pub fn handle_vote(ctx: &mut RaftContext, log: &dyn LogStorage, req: VoteRequest, tick: &mut Tick) -> VoteResponse {
    ctx.check_thread();

    // Step 1: term bump. `last_voted_for` is cleared whenever `current_term`
    // advances, unlike the literal source behavior.
    ctx.bump_term(req.term, tick);

    // Step 2: stale term rejection.
    if req.term < ctx.current_term() {
        return VoteResponse {
            status: Status::Ok,
            term: ctx.current_term(),
            voted: false,
        };
    }

    // Step 3: self-vote is always granted.
    if req.candidate_id == ctx.id() {
        ctx.set_voted_for(ctx.id(), tick);
        return VoteResponse {
            status: Status::Ok,
            term: ctx.current_term(),
            voted: true,
        };
    }

    // Step 4: unknown candidates are rejected.
    if !ctx.is_member(req.candidate_id) {
        debug!("rejecting vote for non-member candidate {}", req.candidate_id);
        return VoteResponse {
            status: Status::Ok,
            term: ctx.current_term(),
            voted: false,
        };
    }

    // Steps 5-6: single-vote-per-term rule.
    let may_vote = ctx.last_voted_for() == 0 || ctx.last_voted_for() == req.candidate_id;
    if may_vote && is_up_to_date(log, req.last_log_index, req.last_log_term) {
        ctx.set_voted_for(req.candidate_id, tick);

        // Mirrors `request_vote`: resetting the follower timer on every
        // granted vote (including a recast in the same term) ensures a
        // newly-elected leader can depend on a known-fresh heartbeat
        // baseline.
        if let Some(follower) = ctx.follower_state_mut() {
            follower.last_heartbeat = tick.time;
        }

        return VoteResponse {
            status: Status::Ok,
            term: ctx.current_term(),
            voted: true,
        };
    }

    VoteResponse {
        status: Status::Ok,
        term: ctx.current_term(),
        voted: false,
    }
}

/// Whether a candidate with the given `(last_log_index, last_log_term)` is
/// at least as up-to-date as the local log.
///
/// Implements the canonical Raft ordering: a higher term always wins, and
/// index only breaks a tie between equal terms. This differs from the
/// source's `index >= lastIndex && term >= lastEntry.term` relation, which
/// can grant votes to candidates with an older term but an equal or higher
/// index, violating leader completeness.
pub fn is_up_to_date(log: &dyn LogStorage, candidate_index: LogIndex, candidate_term: Term) -> bool {
    if log.is_empty() {
        return true;
    }

    let last_index = log.last_index();
    let last_entry = match log.get_entry(last_index) {
        Some(e) => e,
        // Recycled past the point we can compare against; treat as
        // trivially up-to-date.
        None => return true,
    };

    match candidate_term.cmp(&last_entry.term) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate_index >= last_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoopTransitionSink;
    use crate::log::MemoryLog;
    use crate::membership::cluster::StaticClusterView;
    use crate::protos::LogEntryType;
    use std::sync::Arc;

    fn entry(index: LogIndex, term: Term) -> LogEntry {
        LogEntry {
            index,
            term,
            entry_type: LogEntryType::Command,
            key: vec![],
            payload: vec![],
        }
    }

    fn new_ctx(id: u64, members: Vec<u64>) -> RaftContext {
        RaftContext::new(id, Arc::new(StaticClusterView::new(id, members)), Arc::new(NoopTransitionSink))
    }

    // Heartbeat on a fresh node.
    #[test]
    fn heartbeat_on_fresh_node() {
        let mut ctx = new_ctx(1, vec![1, 7]);
        let mut log = MemoryLog::new();
        let mut tick = Tick::empty();

        let req = AppendRequest {
            term: 1,
            leader_id: 7,
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![],
            commit_index: 0,
            recycle_index: 0,
        };

        let resp = handle_append(&mut ctx, &mut log, req, &mut tick).unwrap();
        assert!(resp.succeeded);
        assert_eq!(resp.term, 1);
        assert_eq!(resp.log_index, 0);
        assert_eq!(ctx.current_term(), 1);
        assert_eq!(ctx.leader_id(), 7);
        assert!(tick.pending_transition.is_some());
    }

    // Prefix conflict truncates then appends.
    #[test]
    fn prefix_conflict_truncates_and_appends() {
        let mut ctx = new_ctx(1, vec![1, 9]);
        let mut log = MemoryLog::new();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 1));
        log.create_entry(entry(3, 1));

        let mut tick = Tick::empty();
        ctx.bump_term(1, &mut tick);
        ctx.set_commit_index(1, &mut tick);

        let req = AppendRequest {
            term: 2,
            leader_id: 9,
            prev_log_index: 2,
            prev_log_term: 1,
            entries: vec![entry(3, 2)],
            commit_index: 1,
            recycle_index: 0,
        };

        let resp = handle_append(&mut ctx, &mut log, req, &mut tick).unwrap();
        assert!(resp.succeeded);
        assert_eq!(resp.log_index, 3);
        assert_eq!(ctx.current_term(), 2);
        assert_eq!(log.get_entry(3).unwrap().term, 2);
        assert_eq!(log.get_entry(2).unwrap().term, 1);
    }

    // Stale term is rejected without mutation.
    #[test]
    fn stale_term_is_rejected() {
        let mut ctx = new_ctx(1, vec![1, 2]);
        let mut log = MemoryLog::new();
        let mut tick = Tick::empty();
        ctx.bump_term(5, &mut tick);

        let req = AppendRequest {
            term: 3,
            leader_id: 2,
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![],
            commit_index: 0,
            recycle_index: 0,
        };

        let resp = handle_append(&mut ctx, &mut log, req, &mut tick).unwrap();
        assert!(!resp.succeeded);
        assert_eq!(resp.term, 5);
        assert_eq!(ctx.current_term(), 5);
    }

    // Vote tie: first vote granted, second refused.
    #[test]
    fn single_vote_per_term() {
        let mut ctx = new_ctx(1, vec![1, 11, 12]);
        let mut log = MemoryLog::new();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 4));

        let mut tick = Tick::empty();
        ctx.bump_term(4, &mut tick);

        let req1 = VoteRequest {
            term: 4,
            candidate_id: 11,
            last_log_index: 2,
            last_log_term: 4,
        };
        let resp1 = handle_vote(&mut ctx, &log, req1, &mut tick);
        assert!(resp1.voted);
        assert_eq!(ctx.last_voted_for(), 11);

        let req2 = VoteRequest {
            term: 4,
            candidate_id: 12,
            last_log_index: 2,
            last_log_term: 4,
        };
        let resp2 = handle_vote(&mut ctx, &log, req2, &mut tick);
        assert!(!resp2.voted);
    }

    // Up-to-dateness rejection on term then on index.
    #[test]
    fn up_to_dateness_rejects_lower_term_then_lower_index() {
        let mut ctx = new_ctx(1, vec![1, 3]);
        let mut log = MemoryLog::new();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 2));
        log.create_entry(entry(3, 3));
        log.create_entry(entry(4, 4));
        log.create_entry(entry(5, 4));

        let mut tick = Tick::empty();
        ctx.bump_term(4, &mut tick);

        let req_low_term = VoteRequest {
            term: 5,
            candidate_id: 3,
            last_log_index: 5,
            last_log_term: 3,
        };
        let resp = handle_vote(&mut ctx, &log, req_low_term, &mut tick);
        assert!(!resp.voted);

        let mut tick2 = Tick::empty();
        let req_low_index = VoteRequest {
            term: 5,
            candidate_id: 3,
            last_log_index: 4,
            last_log_term: 5,
        };
        let resp2 = handle_vote(&mut ctx, &log, req_low_index, &mut tick2);
        assert!(!resp2.voted);
    }

    #[test]
    fn unknown_candidate_is_rejected() {
        let mut ctx = new_ctx(1, vec![1, 2]);
        let log = MemoryLog::new();
        let mut tick = Tick::empty();

        let req = VoteRequest {
            term: 1,
            candidate_id: 99,
            last_log_index: 0,
            last_log_term: 0,
        };
        let resp = handle_vote(&mut ctx, &log, req, &mut tick);
        assert!(!resp.voted);
    }

    #[test]
    fn poll_never_mutates_state() {
        let ctx = new_ctx(1, vec![1, 2]);
        let log = MemoryLog::new();

        let req = PollRequest {
            term: 9,
            candidate_id: 2,
            last_log_index: 0,
            last_log_term: 0,
        };
        let resp = handle_poll(&ctx, &log, req);
        assert!(resp.accepted);
        assert_eq!(ctx.current_term(), 0);
        assert_eq!(ctx.last_voted_for(), 0);
    }

    #[test]
    fn append_is_idempotent() {
        let mut ctx = new_ctx(1, vec![1, 9]);
        let mut log = MemoryLog::new();
        let mut tick = Tick::empty();

        let req = AppendRequest {
            term: 1,
            leader_id: 9,
            prev_log_index: 0,
            prev_log_term: 0,
            entries: vec![entry(1, 1), entry(2, 1)],
            commit_index: 0,
            recycle_index: 0,
        };

        let resp1 = handle_append(&mut ctx, &mut log, req.clone(), &mut tick).unwrap();
        let resp2 = handle_append(&mut ctx, &mut log, req, &mut tick).unwrap();

        assert_eq!(resp1.log_index, resp2.log_index);
        assert_eq!(log.last_index(), 2);
    }

    #[test]
    fn truncate_below_commit_index_is_an_invariant_violation() {
        let mut ctx = new_ctx(1, vec![1, 9]);
        let mut log = MemoryLog::new();
        let mut tick = Tick::empty();
        log.create_entry(entry(1, 1));
        log.create_entry(entry(2, 1));
        ctx.bump_term(1, &mut tick);
        ctx.set_commit_index(2, &mut tick);

        let req = AppendRequest {
            term: 1,
            leader_id: 9,
            prev_log_index: 1,
            prev_log_term: 1,
            entries: vec![entry(2, 2)],
            commit_index: 2,
            recycle_index: 0,
        };

        let result = handle_append(&mut ctx, &mut log, req, &mut tick);
        assert!(result.is_err());
    }
}
