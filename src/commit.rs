//! The Commit Applier: advances `commit_index` toward the leader's declared
//! value, then drives `last_applied` toward `commit_index` one entry at a
//! time, delivering `Command`/`Tombstone` entries to the state machine.
//! Mirrors `consensus.rs::update_commited` (sets `meta.commit_index`, flags
//! `tick.write_meta()`), generalized to also perform the apply loop, which
//! that earlier version commits but does not itself apply.

use ::log::error;

use crate::context::{RaftContext, Tick};
use crate::errors::Result;
use crate::log::LogStorage;
use crate::protos::LogIndex;

/// The state-machine side effect invoked once per committed `Command`/
/// `Tombstone` entry. Injected as a trait object, following the same
/// dependency-injection shape used for `ConsensusModule::log`.
pub trait StateMachine: Send + Sync {
    /// Applies `payload` keyed by `key`. Errors are logged and swallowed by
    /// the caller; `last_applied` still advances regardless of the outcome.
    fn commit(&self, key: &[u8], payload: &[u8]) -> Result<()>;
}

/// A `StateMachine` that does nothing, for tests that only care about log/
/// index bookkeeping.
pub struct NoopStateMachine;

impl StateMachine for NoopStateMachine {
    fn commit(&self, _key: &[u8], _payload: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Advances `ctx.commit_index` given the leader's declared `leader_commit`.
///
/// This is the entry point `active::handle_append`'s step 5 calls.
pub fn advance_commit_index(
    ctx: &mut RaftContext,
    log: &dyn LogStorage,
    leader_commit: LogIndex,
    tick: &mut Tick,
) {
    let guard = leader_commit != 0
        && !log.is_empty()
        && (ctx.commit_index() == 0
            || leader_commit > ctx.commit_index()
            || ctx.commit_index() > ctx.last_applied());

    if !guard {
        return;
    }

    // Canonical Raft clamp: `commit_index = min(leader_commit, last_index)`,
    // only ever moving forward. This is equivalent to the literal
    // `min(max(leader_commit, commit_index), last_index)` form for every
    // reachable state: the inner `max` only matters when `leader_commit <=
    // commit_index`, in which case the outer `min`/monotonic-increase check
    // below is a no-op either way (DESIGN.md open question 3).
    let candidate = std::cmp::min(leader_commit, log.last_index());
    if candidate > ctx.commit_index() {
        ctx.set_commit_index(candidate, tick);
    }
}

/// Applies every entry from just past `last_applied` up to
/// `min(commit_index, last_index)`, advancing `last_applied` by exactly one
/// per entry, strictly in order.
///
/// Note on the starting bound: a literal `max(lastApplied, firstIndex)`
/// would re-examine an already-applied index on every call after the first
/// (since `lastApplied` itself, not `lastApplied + 1`, is where the range
/// begins), and the strict sequential precondition would then fail
/// immediately (`lastApplied == i - 1` can never hold when `i ==
/// lastApplied`), making the applier a no-op on every call beyond the very
/// first. That can't be the intent, since `lastApplied` is supposed to
/// advance across repeated append calls, so this starts at `lastApplied +
/// 1` instead; the sequential-precondition check still does real work by
/// halting if `recycle` has moved `first_index` ahead of `lastApplied + 1`,
/// i.e. there is a gap this applier cannot safely cross.
pub fn apply_committed(ctx: &mut RaftContext, log: &dyn LogStorage, state_machine: &dyn StateMachine) {
    if log.is_empty() {
        return;
    }

    let start = std::cmp::max(ctx.last_applied() + 1, log.first_index());
    let end = std::cmp::min(ctx.commit_index(), log.last_index());

    let mut i = start;
    while i <= end {
        let precondition = (ctx.last_applied() == 0 && i == log.first_index()) || ctx.last_applied() == i - 1;

        if !precondition {
            break;
        }

        if let Some(entry) = log.get_entry(i) {
            if entry.entry_type.is_applicable() {
                if let Err(e) = state_machine.commit(&entry.key, &entry.payload) {
                    error!("state machine commit failed for index {}: {:?}", i, e);
                }
            }
        }

        ctx.set_last_applied(i);
        i += 1;
    }
}
