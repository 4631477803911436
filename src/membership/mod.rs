//! The Membership Rebalancer and the Cluster View port it drives.

pub mod cluster;
pub mod rebalancer;

pub use cluster::{ClusterView, Member, MemberStatus, MemberType, StaticClusterView};
pub use rebalancer::{decide, rebalance, RebalanceAction};
