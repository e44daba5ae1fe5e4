//! ResourceManager port - ノードのリースと回収
//!
//! スケジューラ本体は `free_nodes` しか呼ばない。`acquire_nodes` は
//! policy がタスクにノードを割り当てるときに使う。

use async_trait::async_trait;

use super::executor::{BoundNode, NodeHandle};
use crate::domain::errors::ResourceError;

#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Lease up to `max` nodes. May return fewer, including none.
    async fn acquire_nodes(&self, max: usize) -> Vec<BoundNode>;

    /// Hand leased nodes back for recycling. Healthy and unhealthy nodes both
    /// come back through here.
    async fn free_nodes(&self, nodes: Vec<NodeHandle>) -> Result<(), ResourceError>;
}
