//! InMemoryResourceManager - 開発用のノードプール
//!
//! 登録済みノードを free / leased に分けて管理する。返却されたノードは
//! 健全かどうかに関係なく free に戻り、次のリースで再利用される。

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::NodeId;
use crate::domain::errors::ResourceError;
use crate::ports::{BoundNode, NodeHandle, ResourceManager};

#[derive(Default)]
struct Pool {
    free: VecDeque<BoundNode>,
    leased: HashMap<NodeId, BoundNode>,
}

#[derive(Default)]
pub struct InMemoryResourceManager {
    pool: Mutex<Pool>,
}

impl InMemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(nodes: impl IntoIterator<Item = BoundNode>) -> Self {
        Self {
            pool: Mutex::new(Pool {
                free: nodes.into_iter().collect(),
                leased: HashMap::new(),
            }),
        }
    }

    /// Add a node to the free pool.
    pub async fn add_node(&self, node: BoundNode) {
        self.pool.lock().await.free.push_back(node);
    }

    pub async fn available(&self) -> usize {
        self.pool.lock().await.free.len()
    }

    pub async fn leased(&self) -> usize {
        self.pool.lock().await.leased.len()
    }
}

#[async_trait]
impl ResourceManager for InMemoryResourceManager {
    async fn acquire_nodes(&self, max: usize) -> Vec<BoundNode> {
        let mut pool = self.pool.lock().await;
        let n = max.min(pool.free.len());
        let nodes: Vec<BoundNode> = pool.free.drain(..n).collect();
        for node in &nodes {
            pool.leased.insert(node.node.id, node.clone());
        }
        if !nodes.is_empty() {
            debug!(count = nodes.len(), free = pool.free.len(), "nodes leased");
        }
        nodes
    }

    async fn free_nodes(&self, nodes: Vec<NodeHandle>) -> Result<(), ResourceError> {
        let mut pool = self.pool.lock().await;
        let mut unknown = Vec::new();
        for handle in nodes {
            match pool.leased.remove(&handle.id) {
                Some(node) => pool.free.push_back(node),
                None => unknown.push(handle.url),
            }
        }
        debug!(free = pool.free.len(), leased = pool.leased.len(), "nodes returned");
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ResourceError::UnknownNode(unknown.join(", ")))
        }
    }
}
