//! B+ Tree Index for PageDB
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to each other by position, which lets
//! every leaf carry a forward link to its right sibling. Leaves store the row address of
//! each key; duplicate keys are kept side by side in insertion order.
//!
//! Separators follow `left subtree <= separator <= right subtree`. Inserts descend to the
//! right of equal separators, lookups to the left, and lookups then walk the leaf chain so
//! runs of equal keys that straddle a split are returned whole.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{PageId, RowLocation, Value};

/// Maximum number of keys in a node before it splits
pub const ORDER: usize = 4;

type NodeId = usize;

/// A key in the B+ tree (wraps Value for a total order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexKey(pub Value);

impl IndexKey {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for IndexKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Ord for IndexKey {
    /// Integers order before strings; within a type the natural order applies
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(_), Value::String(_)) => Ordering::Less,
            (Value::String(_), Value::Integer(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One indexed row: its key and physical address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: IndexKey,
    pub page_id: PageId,
    pub slot_id: u32,
}

impl IndexEntry {
    pub fn location(&self) -> RowLocation {
        RowLocation {
            page_id: self.page_id,
            slot_id: self.slot_id,
        }
    }
}

/// B+ Tree Node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Internal node: `children.len() == keys.len() + 1`
    Internal {
        keys: Vec<IndexKey>,
        children: Vec<NodeId>,
    },
    /// Leaf node with one entry per key and a link to the next leaf
    Leaf {
        keys: Vec<IndexKey>,
        entries: Vec<IndexEntry>,
        next: Option<NodeId>,
    },
}

impl Node {
    fn empty_leaf() -> Self {
        Node::Leaf {
            keys: Vec::new(),
            entries: Vec::new(),
            next: None,
        }
    }
}

/// B+ Tree Index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BPlusTree {
    nodes: Vec<Node>,
    root: NodeId,
    /// Number of entries
    size: usize,
}

impl Default for BPlusTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BPlusTree {
    /// Create a new tree holding a single empty leaf
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty_leaf()],
            root: 0,
            size: 0,
        }
    }

    /// Save the whole tree to one file
    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load a tree previously written by `save_to_disk`
    pub fn load_from_disk(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let tree = serde_json::from_reader(BufReader::new(file))?;
        Ok(tree)
    }

    /// Insert a key with the address of its row
    pub fn insert(&mut self, key: IndexKey, page_id: PageId, slot_id: u32) {
        let entry = IndexEntry {
            key: key.clone(),
            page_id,
            slot_id,
        };

        if let Some((separator, right)) = self.insert_recursive(self.root, key, entry) {
            // Root split, create new root
            let old_root = self.root;
            self.nodes.push(Node::Internal {
                keys: vec![separator],
                children: vec![old_root, right],
            });
            self.root = self.nodes.len() - 1;
        }
        self.size += 1;
    }

    /// Insert below `node_id`. Returns the separator and new right sibling on a split.
    fn insert_recursive(
        &mut self,
        node_id: NodeId,
        key: IndexKey,
        entry: IndexEntry,
    ) -> Option<(IndexKey, NodeId)> {
        let descend = match &self.nodes[node_id] {
            Node::Internal { keys, children } => {
                let pos = keys.partition_point(|k| k <= &key);
                Some((pos, children[pos]))
            }
            Node::Leaf { .. } => None,
        };

        match descend {
            None => self.insert_into_leaf(node_id, key, entry),
            Some((pos, child)) => {
                let (separator, right) = self.insert_recursive(child, key, entry)?;
                self.insert_into_internal(node_id, pos, separator, right)
            }
        }
    }

    fn insert_into_leaf(
        &mut self,
        node_id: NodeId,
        key: IndexKey,
        entry: IndexEntry,
    ) -> Option<(IndexKey, NodeId)> {
        let new_id = self.nodes.len();
        let Node::Leaf {
            keys,
            entries,
            next,
        } = &mut self.nodes[node_id]
        else {
            return None;
        };

        let pos = keys.partition_point(|k| k <= &key);
        keys.insert(pos, key);
        entries.insert(pos, entry);

        if keys.len() <= ORDER {
            return None;
        }

        let mid = keys.len() / 2;
        let right_keys = keys.split_off(mid);
        let right_entries = entries.split_off(mid);
        let separator = right_keys[0].clone();
        let right = Node::Leaf {
            keys: right_keys,
            entries: right_entries,
            next: next.replace(new_id),
        };

        self.nodes.push(right);
        Some((separator, new_id))
    }

    fn insert_into_internal(
        &mut self,
        node_id: NodeId,
        pos: usize,
        separator: IndexKey,
        right: NodeId,
    ) -> Option<(IndexKey, NodeId)> {
        let new_id = self.nodes.len();
        let Node::Internal { keys, children } = &mut self.nodes[node_id] else {
            return None;
        };

        keys.insert(pos, separator);
        children.insert(pos + 1, right);

        if keys.len() <= ORDER {
            return None;
        }

        let mid = keys.len() / 2;
        let right_keys = keys.split_off(mid + 1);
        let push_up = keys.pop()?;
        let right_children = children.split_off(mid + 1);

        self.nodes.push(Node::Internal {
            keys: right_keys,
            children: right_children,
        });
        Some((push_up, new_id))
    }

    /// All entries whose key equals `key`, in insertion order
    pub fn search(&self, key: &IndexKey) -> Vec<IndexEntry> {
        self.range_scan(key, key)
    }

    /// All entries with `start <= key <= end`, in ascending key order
    pub fn range_scan(&self, start: &IndexKey, end: &IndexKey) -> Vec<IndexEntry> {
        let mut result = Vec::new();
        if start > end {
            return result;
        }

        let mut current = Some(self.find_leaf(start));
        while let Some(node_id) = current {
            let Node::Leaf {
                keys,
                entries,
                next,
            } = &self.nodes[node_id]
            else {
                break;
            };

            for (k, entry) in keys.iter().zip(entries) {
                if k > end {
                    return result;
                }
                if k >= start {
                    result.push(entry.clone());
                }
            }
            current = *next;
        }
        result
    }

    /// Every entry in ascending key order
    pub fn scan_all(&self) -> Vec<IndexEntry> {
        let mut result = Vec::with_capacity(self.size);
        let mut current = Some(self.leftmost_leaf());
        while let Some(node_id) = current {
            match &self.nodes[node_id] {
                Node::Leaf { entries, next, .. } => {
                    result.extend(entries.iter().cloned());
                    current = *next;
                }
                Node::Internal { .. } => break,
            }
        }
        result
    }

    /// Leaf where the first key `>= key` would be found
    fn find_leaf(&self, key: &IndexKey) -> NodeId {
        let mut node_id = self.root;
        while let Node::Internal { keys, children } = &self.nodes[node_id] {
            let pos = keys.partition_point(|k| k < key);
            node_id = children[pos];
        }
        node_id
    }

    fn leftmost_leaf(&self) -> NodeId {
        let mut node_id = self.root;
        while let Node::Internal { children, .. } = &self.nodes[node_id] {
            node_id = children[0];
        }
        node_id
    }

    /// Number of levels, 1 for a tree that is a single leaf
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node_id = self.root;
        while let Node::Internal { children, .. } = &self.nodes[node_id] {
            node_id = children[0];
            height += 1;
        }
        height
    }

    /// Number of entries in the tree
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
