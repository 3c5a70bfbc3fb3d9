//! Binary bit trie keyed on address bits.

use crate::Flag;

/// Index of a node inside the arena. Zero is the root and never a child,
/// so it doubles as "no child".
type NodeId = u32;

const NO_CHILD: NodeId = 0;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [NodeId; 2],
    value: Option<Flag>,
}

/// A fixed-width binary trie storing one flag per prefix.
///
/// Keys are right-aligned in a `u128`; bit 0 of the prefix is bit
/// `width - 1` of the key.
#[derive(Debug, Clone)]
pub(crate) struct BitTrie {
    nodes: Vec<Node>,
    width: u8,
    prefixes: usize,
}

impl BitTrie {
    /// Create an empty trie for keys of `width` bits (32 or 128).
    pub(crate) fn new(width: u8) -> Self {
        Self {
            nodes: vec![Node::default()],
            width,
            prefixes: 0,
        }
    }

    #[inline]
    fn bit(&self, key: u128, depth: u8) -> usize {
        ((key >> (self.width - 1 - depth)) & 1) as usize
    }

    /// Store `flag` for the prefix `key/prefix_len`, replacing any
    /// previous flag for exactly that prefix.
    pub(crate) fn insert(&mut self, key: u128, prefix_len: u8, flag: Flag) {
        debug_assert!(prefix_len <= self.width);
        let mut node = 0usize;
        for depth in 0..prefix_len {
            let bit = self.bit(key, depth);
            let child = self.nodes[node].children[bit];
            node = if child == NO_CHILD {
                let id = self.nodes.len();
                self.nodes.push(Node::default());
                self.nodes[node].children[bit] = id as NodeId;
                id
            } else {
                child as usize
            };
        }
        if self.nodes[node].value.replace(flag).is_none() {
            self.prefixes += 1;
        }
    }

    /// Flag of the deepest stored prefix containing `key`.
    pub(crate) fn longest_match(&self, key: u128) -> Option<Flag> {
        let mut node = 0usize;
        let mut best = self.nodes[0].value;
        for depth in 0..self.width {
            let child = self.nodes[node].children[self.bit(key, depth)];
            if child == NO_CHILD {
                break;
            }
            node = child as usize;
            if let Some(flag) = self.nodes[node].value {
                best = Some(flag);
            }
        }
        best
    }

    /// All stored prefixes as `(key, prefix_len, flag)`, in key order with
    /// shorter prefixes first.
    pub(crate) fn prefixes(&self) -> Vec<(u128, u8, Flag)> {
        let mut out = Vec::with_capacity(self.prefixes);
        let mut stack: Vec<(usize, u128, u8)> = vec![(0, 0, 0)];
        while let Some((node, path, depth)) = stack.pop() {
            if let Some(flag) = self.nodes[node].value {
                let key = if depth == 0 {
                    0
                } else {
                    path << (self.width - depth)
                };
                out.push((key, depth, flag));
            }
            // Push the 1-branch first so the 0-branch is visited first.
            for bit in [1u128, 0] {
                let child = self.nodes[node].children[bit as usize];
                if child != NO_CHILD {
                    stack.push((child as usize, (path << 1) | bit, depth + 1));
                }
            }
        }
        out
    }

    /// Number of stored prefixes.
    pub(crate) fn len(&self) -> usize {
        self.prefixes
    }

    /// Number of allocated nodes.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
