use crate::modules::names;
use crate::types::{NodeId, ScanNode, TargetKind};
use crate::{Result, ScanError};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;

/// Decide how a user supplied target is scanned first.
///
/// Only strict IP literals count as addresses; anything else containing a dot is
/// treated as a domain and starts with subdomain enumeration.
pub fn classify_target(target: &str) -> (TargetKind, &'static str) {
    if target.parse::<IpAddr>().is_ok() {
        (TargetKind::Ip, names::PING_SCANNER)
    } else if target.contains('.') {
        (TargetKind::Domain, names::SUBDOMAIN_SCANNER)
    } else {
        (TargetKind::Hostname, names::PING_SCANNER)
    }
}

/// Append-only node store plus the FIFO of nodes still waiting to run.
pub struct NodeGraph {
    nodes: Vec<ScanNode>,
    index: HashMap<NodeId, usize>,
    queue: VecDeque<NodeId>,
    max_depth: u32,
    pruned: usize,
}

impl NodeGraph {
    pub fn new(max_depth: u32) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            queue: VecDeque::new(),
            max_depth,
            pruned: 0,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Takes effect for nodes already queued as well; see [`NodeGraph::dequeue_batch`].
    pub fn set_max_depth(&mut self, max_depth: u32) {
        self.max_depth = max_depth;
    }

    /// Create and enqueue a depth-0 node for `target`.
    pub fn add_initial_target(&mut self, target: &str) -> Result<NodeId> {
        let (kind, module) = classify_target(target.trim());
        self.add_initial_target_with_module(target, kind, module)
    }

    pub fn add_initial_target_with_module(
        &mut self,
        target: &str,
        kind: TargetKind,
        module: &str,
    ) -> Result<NodeId> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ScanError::InvalidTarget("empty target".to_string()));
        }

        let node = ScanNode::root(target, kind, module);
        let id = node.id;
        debug!("Initial target {} classified as {} -> {}", target, kind.as_str(), module);
        self.insert(node, true);
        Ok(id)
    }

    /// Accept `node` when it is within the depth bound. Returns whether it was kept.
    pub fn add_discovered_node(&mut self, node: ScanNode) -> bool {
        if node.depth > self.max_depth {
            debug!(
                "Pruned {} {} at depth {} (max {})",
                node.node_type, node.data, node.depth, self.max_depth
            );
            self.pruned += 1;
            return false;
        }

        if self.index.contains_key(&node.id) {
            warn!("Node {} already present, ignoring duplicate", node.id);
            return false;
        }

        if let Some(parent) = node.source.and_then(|source| self.get(&source)) {
            if node.depth != parent.depth + 1 {
                warn!(
                    "Rejected node {}: depth {} does not follow parent depth {}",
                    node.id, node.depth, parent.depth
                );
                return false;
            }
        }

        self.insert(node, true);
        true
    }

    /// Load a previously exported node without scheduling it.
    pub fn restore(&mut self, node: ScanNode) {
        if !self.index.contains_key(&node.id) {
            self.insert(node, false);
        }
    }

    fn insert(&mut self, node: ScanNode, enqueue: bool) {
        let id = node.id;
        self.index.insert(id, self.nodes.len());
        self.nodes.push(node);
        if enqueue {
            self.queue.push_back(id);
        }
    }

    /// Pull up to `limit` pending nodes in FIFO order, dropping any that now exceed the
    /// depth bound.
    pub fn dequeue_batch(&mut self, limit: usize) -> Vec<ScanNode> {
        let mut batch = Vec::with_capacity(limit.min(self.queue.len()));

        while batch.len() < limit {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(node) = self.get(&id) else {
                continue;
            };
            if node.depth > self.max_depth {
                debug!("Skipping {} at depth {} after depth bound change", node.id, node.depth);
                self.pruned += 1;
                continue;
            }
            batch.push(node.clone());
        }

        batch
    }

    pub fn get(&self, id: &NodeId) -> Option<&ScanNode> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    pub fn nodes(&self) -> &[ScanNode] {
        &self.nodes
    }

    pub fn children_of(&self, id: &NodeId) -> Vec<&ScanNode> {
        self.nodes
            .iter()
            .filter(|node| node.source.as_ref() == Some(id))
            .collect()
    }

    pub fn roots(&self) -> Vec<&ScanNode> {
        self.nodes.iter().filter(|node| node.source.is_none()).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pruned(&self) -> usize {
        self.pruned
    }
}
