use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased value slot; `Trie::get` re-types it at the call site.
type ValueHandle = Arc<dyn Any + Send + Sync>;

/// One trie node. A node is immutable once it is shared between versions:
/// mutation happens only on freshly cloned nodes along a put/remove path.
#[derive(Default, Clone)]
struct TrieNode {
    children: HashMap<u8, Arc<TrieNode>>,
    value: Option<ValueHandle>,
}

/// A persistent copy-on-write trie keyed by byte strings.
///
/// Every mutation returns a new version; versions share the subtrees the
/// mutation did not touch and stay independently readable forever. Values
/// are heterogeneous: each key may hold any `Send + Sync` type, and `get`
/// checks the stored type at runtime.
#[derive(Default, Clone)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// An empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value stored at `key`. Returns None when the key is
    /// absent, holds no value, or holds a value of a different type.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<&T> {
        let mut node = self.root.as_ref()?;
        for byte in key {
            node = node.children.get(byte)?;
        }
        node.value.as_ref()?.downcast_ref::<T>()
    }

    /// Produce a new version with `value` stored at `key`. Nodes along the
    /// path are cloned; everything else is shared with `self`.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: ValueHandle = Arc::new(value);
        let root = put_path(self.root.as_deref(), key, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    /// Produce a new version with the value at `key` removed. A key that
    /// is not present yields an unchanged clone. Intermediate nodes are
    /// kept even when they end up empty and value-less.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let Some(root) = self.root.as_deref() else {
            return self.clone();
        };
        match remove_path(root, key) {
            Some(new_root) => Trie {
                root: Some(Arc::new(new_root)),
            },
            None => self.clone(),
        }
    }
}

/// Rebuild the path for a put: clone each touched node, create fresh plain
/// nodes for missing prefixes, and install the valued terminal over the
/// children of whatever node sat there before.
fn put_path(node: Option<&TrieNode>, key: &[u8], value: ValueHandle) -> TrieNode {
    match key.split_first() {
        None => TrieNode {
            children: node.map(|n| n.children.clone()).unwrap_or_default(),
            value: Some(value),
        },
        Some((byte, rest)) => {
            let mut cloned = node.cloned().unwrap_or_default();
            let child = cloned.children.get(byte).cloned();
            let new_child = put_path(child.as_deref(), rest, value);
            cloned.children.insert(*byte, Arc::new(new_child));
            cloned
        }
    }
}

/// Rebuild the path for a remove. Returns None when the key's path does
/// not reach a stored value, in which case the caller keeps the old root.
fn remove_path(node: &TrieNode, key: &[u8]) -> Option<TrieNode> {
    match key.split_first() {
        None => {
            // No value at the terminal node: keep the old version.
            node.value.as_ref()?;
            Some(TrieNode {
                children: node.children.clone(),
                value: None,
            })
        }
        Some((byte, rest)) => {
            let child = node.children.get(byte)?;
            let new_child = remove_path(child, rest)?;
            let mut cloned = node.clone();
            cloned.children.insert(*byte, Arc::new(new_child));
            Some(cloned)
        }
    }
}
