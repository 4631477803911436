//! The Membership Rebalancer: a leader-scoped control loop that inspects the
//! cluster member table on any change and issues promote/demote actions to
//! reach the configured `quorum_hint` (voters) and `quorum_hint *
//! backup_count` (backups) targets. Mirrors `consensus.rs::cycle()`'s
//! re-trigger-on-completion shape (match on a computed summary, apply one
//! state change, recurse/re-schedule) and its `majority_size()`-style small
//! arithmetic helpers.

use crate::context::RaftContext;
use crate::errors::Result;
use crate::membership::cluster::{Member, MemberStatus, MemberType};
use crate::protos::MemberId;

/// One step the rebalancer wants taken. `decide` never issues more than one
/// of these per call: the rule table applies the first rule that matches,
/// and the loop in `rebalance` re-evaluates from scratch after each action
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceAction {
    Promote { id: MemberId, target: MemberType },
    Demote { id: MemberId, target: MemberType },
}

struct Counts {
    total_active: usize,
    available_active: usize,
    total_passive: usize,
    available_passive: usize,
    available_reserve: usize,
}

fn tally(members: &[Member]) -> Counts {
    let mut c = Counts {
        total_active: 0,
        available_active: 0,
        total_passive: 0,
        available_passive: 0,
        available_reserve: 0,
    };

    for m in members {
        let available = m.status == MemberStatus::Available;
        match m.member_type {
            MemberType::Active | MemberType::Promotable => {
                c.total_active += 1;
                if available {
                    c.available_active += 1;
                }
            }
            MemberType::Passive => {
                c.total_passive += 1;
                if available {
                    c.available_passive += 1;
                }
            }
            MemberType::Reserve => {
                if available {
                    c.available_reserve += 1;
                }
            }
        }
    }

    c
}

/// Picks an available member of `member_type`, lowest id first, excluding
/// `self_id`. Used for promotion rules, where any available candidate is
/// interchangeable.
fn pick_available(members: &[Member], member_type: MemberType, self_id: MemberId) -> Option<MemberId> {
    members
        .iter()
        .filter(|m| m.member_type == member_type && m.status == MemberStatus::Available && m.id != self_id)
        .map(|m| m.id)
        .min()
}

/// Picks a demotion candidate of `member_type`, excluding `self_id`.
/// Prefers an unavailable member; when no unavailable candidate exists the
/// choice among available ones is stabilized to the lowest id.
fn pick_demotable(members: &[Member], member_type: MemberType, self_id: MemberId) -> Option<MemberId> {
    let candidates: Vec<&Member> = members.iter().filter(|m| m.member_type == member_type && m.id != self_id).collect();

    candidates
        .iter()
        .filter(|m| m.status == MemberStatus::Unavailable)
        .map(|m| m.id)
        .min()
        .or_else(|| candidates.iter().map(|m| m.id).min())
}

/// Pure decision function implementing the rebalancer's rule table. Returns
/// `None` once the cluster has reached a fixed point.
pub fn decide(members: &[Member], self_id: MemberId, quorum_hint: usize, backup_count: usize) -> Option<RebalanceAction> {
    let c = tally(members);
    let q = quorum_hint;
    let target_passive = quorum_hint * backup_count;

    if c.available_active < q && c.available_passive > 0 {
        if let Some(id) = pick_available(members, MemberType::Passive, self_id) {
            return Some(RebalanceAction::Promote { id, target: MemberType::Promotable });
        }
    }

    if c.available_active < q && c.available_reserve > 0 {
        if let Some(id) = pick_available(members, MemberType::Reserve, self_id) {
            return Some(RebalanceAction::Promote { id, target: MemberType::Promotable });
        }
    }

    if c.total_active > q && c.available_passive < target_passive {
        if let Some(id) = pick_demotable(members, MemberType::Active, self_id) {
            return Some(RebalanceAction::Demote { id, target: MemberType::Passive });
        }
    }

    if c.total_active > q {
        if let Some(id) = pick_demotable(members, MemberType::Active, self_id) {
            return Some(RebalanceAction::Demote { id, target: MemberType::Reserve });
        }
    }

    if c.available_passive < target_passive && c.available_reserve > 0 {
        if let Some(id) = pick_available(members, MemberType::Reserve, self_id) {
            return Some(RebalanceAction::Promote { id, target: MemberType::Passive });
        }
    }

    if c.total_passive > target_passive {
        if let Some(id) = pick_demotable(members, MemberType::Passive, self_id) {
            return Some(RebalanceAction::Demote { id, target: MemberType::Reserve });
        }
    }

    None
}

/// Drives the rebalancer to a fixed point, applying actions through `ctx`'s
/// cluster view one at a time and re-evaluating `decide` after each
/// completes. A no-op unless `ctx` currently believes itself to be leader.
pub async fn rebalance(ctx: &RaftContext, quorum_hint: usize, backup_count: usize) -> Result<()> {
    if !ctx.is_leader() {
        return Ok(());
    }

    let cluster = ctx.cluster();

    loop {
        let members = cluster.members();
        let self_id = cluster.self_id();

        match decide(&members, self_id, quorum_hint, backup_count) {
            None => return Ok(()),
            Some(RebalanceAction::Promote { id, target }) => cluster.promote(id, target).await?,
            Some(RebalanceAction::Demote { id, target }) => cluster.demote(id, target).await?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: MemberId, member_type: MemberType, status: MemberStatus) -> Member {
        Member { id, member_type, status }
    }

    // Promotion while below quorum, then demote-to-fill-backups once over
    // quorum.
    #[test]
    fn promotes_reserve_when_active_below_quorum() {
        let members = vec![
            member(1, MemberType::Active, MemberStatus::Available),
            member(2, MemberType::Active, MemberStatus::Available),
            member(3, MemberType::Active, MemberStatus::Unavailable),
            member(4, MemberType::Reserve, MemberStatus::Available),
        ];

        let action = decide(&members, 1, 3, 1);
        assert_eq!(action, Some(RebalanceAction::Promote { id: 4, target: MemberType::Promotable }));
    }

    #[test]
    fn demotes_unavailable_active_when_over_quorum_and_backups_unfilled() {
        let members = vec![
            member(1, MemberType::Active, MemberStatus::Available),
            member(2, MemberType::Active, MemberStatus::Available),
            member(3, MemberType::Active, MemberStatus::Unavailable),
            member(4, MemberType::Promotable, MemberStatus::Available),
        ];

        // total_active = 4 > Q=3, available_passive = 0 < Q*B = 3.
        let action = decide(&members, 1, 3, 1);
        assert_eq!(action, Some(RebalanceAction::Demote { id: 3, target: MemberType::Passive }));
    }

    #[test]
    fn demotes_to_reserve_once_backups_are_filled() {
        let members = vec![
            member(1, MemberType::Active, MemberStatus::Available),
            member(2, MemberType::Active, MemberStatus::Available),
            member(3, MemberType::Active, MemberStatus::Available),
            member(4, MemberType::Active, MemberStatus::Unavailable),
            member(5, MemberType::Passive, MemberStatus::Available),
            member(6, MemberType::Passive, MemberStatus::Available),
            member(7, MemberType::Passive, MemberStatus::Available),
        ];

        // total_active = 4 > Q=3, available_passive = 3 >= Q*B = 3, so the
        // first demote rule doesn't match; falls through to plain excess.
        let action = decide(&members, 1, 3, 1);
        assert_eq!(action, Some(RebalanceAction::Demote { id: 4, target: MemberType::Reserve }));
    }

    #[test]
    fn never_selects_self_as_a_demotion_candidate() {
        let members = vec![
            member(1, MemberType::Active, MemberStatus::Unavailable),
            member(2, MemberType::Active, MemberStatus::Available),
            member(3, MemberType::Active, MemberStatus::Available),
        ];

        // total_active = 3 == Q=3: no demote rule should fire at all, so
        // confirm self's unavailability doesn't wrongly trigger one.
        assert_eq!(decide(&members, 1, 3, 0), None);
    }

    #[test]
    fn fixed_point_returns_none() {
        let members = vec![
            member(1, MemberType::Active, MemberStatus::Available),
            member(2, MemberType::Active, MemberStatus::Available),
            member(3, MemberType::Active, MemberStatus::Available),
        ];
        assert_eq!(decide(&members, 1, 3, 0), None);
    }
}
