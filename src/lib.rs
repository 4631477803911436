//! Per-node Raft consensus core: the Active Role state machine (append,
//! poll, vote), the Commit Applier, and the leader-driven Membership
//! Rebalancer. Everything a node needs outside this crate (the log's
//! persistence, the state machine's storage, wire transport and discovery,
//! and the candidate/leader sub-states themselves) is injected as a trait
//! object; see `log::LogStorage`, `commit::StateMachine`,
//! `membership::ClusterView`, and `context::TransitionSink`.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate serde_derive;

pub mod errors;

pub mod protos;

pub mod log;
pub mod context;
pub mod commit;
pub mod active;
pub mod config;
pub mod membership;
pub mod node;
