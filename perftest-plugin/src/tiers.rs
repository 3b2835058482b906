//! Replica replication tree

use std::collections::VecDeque;

/// Children allowed under the initial server
pub const ROOT_FANOUT: usize = 4;

/// Children allowed under every replica
pub const REPLICA_FANOUT: usize = 3;

/// Replication parent of a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Server,
    Replica(u32),
}

impl Parent {
    /// Short host name of the parent
    pub fn host_name(&self) -> String {
        match self {
            Parent::Server => "server".to_string(),
            Parent::Replica(index) => format!("replica{}", index),
        }
    }

    fn fanout(&self) -> usize {
        match self {
            Parent::Server => ROOT_FANOUT,
            Parent::Replica(_) => REPLICA_FANOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaNode {
    pub index: u32,
    pub parent: Parent,
}

/// Replicas grouped into breadth-first tiers.
///
/// Tier 0 holds the direct children of the server; every later tier hangs
/// off members of the tier before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaTree {
    tiers: Vec<Vec<ReplicaNode>>,
}

impl ReplicaTree {
    /// Place replicas `0..count` breadth-first under the server
    pub fn build(count: u32) -> Self {
        let mut tiers: Vec<Vec<ReplicaNode>> = Vec::new();
        // (parent, tier its children land in)
        let mut queue = VecDeque::from([(Parent::Server, 0usize)]);
        let mut next = 0u32;

        while next < count {
            let Some((parent, tier)) = queue.pop_front() else {
                break;
            };
            for _ in 0..parent.fanout() {
                if next == count {
                    break;
                }
                if tiers.len() == tier {
                    tiers.push(Vec::new());
                }
                tiers[tier].push(ReplicaNode {
                    index: next,
                    parent,
                });
                queue.push_back((Parent::Replica(next), tier + 1));
                next += 1;
            }
        }

        Self { tiers }
    }

    pub fn tiers(&self) -> &[Vec<ReplicaNode>] {
        &self.tiers
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn replica_count(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Every node with its tier number, tier by tier
    pub fn nodes(&self) -> impl Iterator<Item = (usize, &ReplicaNode)> + '_ {
        self.tiers
            .iter()
            .enumerate()
            .flat_map(|(tier, nodes)| nodes.iter().map(move |node| (tier, node)))
    }

    pub fn parent_of(&self, index: u32) -> Option<Parent> {
        self.nodes()
            .find(|(_, node)| node.index == index)
            .map(|(_, node)| node.parent)
    }
}
