//! Ordered key index: a path-compressed byte trie.
//!
//! Keys are byte strings ordered lexicographically. Each node carries the
//! compressed path below the edge byte that leads to it, an optional value
//! (a key ends here) and its child edges sorted by byte. A pre-order walk
//! therefore visits keys in ascending order, which is what `first`, `seek`
//! and `successor` rely on.
//!
//! Invariant: every node except the root holds a value or has at least two
//! children. `remove` restores it by pruning empty leaves and merging
//! single-child chains.

use smallvec::SmallVec;

use crate::error::Result;

// =============================================================================
// Node arena
// =============================================================================

/// Index into the node arena. The root always lives at `0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(u32);

impl NodeId {
    const ROOT: NodeId = NodeId(0);

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
struct Node<T> {
    /// Path bytes after the incoming edge byte. Always empty for the root.
    prefix: SmallVec<[u8; 8]>,
    value: Option<T>,
    /// Child edges, sorted by byte.
    children: SmallVec<[(u8, NodeId); 4]>,
}

impl<T> Node<T> {
    fn empty() -> Self {
        Self {
            prefix: SmallVec::new(),
            value: None,
            children: SmallVec::new(),
        }
    }

    fn leaf(prefix: &[u8], value: T) -> Self {
        Self {
            prefix: SmallVec::from_slice(prefix),
            value: Some(value),
            children: SmallVec::new(),
        }
    }

    #[inline]
    fn find_child(&self, byte: u8) -> std::result::Result<usize, usize> {
        self.children.binary_search_by_key(&byte, |&(b, _)| b)
    }
}

#[derive(Clone)]
struct NodeArena<T> {
    nodes: Vec<Node<T>>,
    free: Vec<NodeId>,
}

impl<T> NodeArena<T> {
    fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
            free: Vec::new(),
        }
    }

    /// Make sure the next `additional` allocations cannot fail.
    fn reserve(&mut self, additional: usize) -> Result<()> {
        let recycled = self.free.len().min(additional);
        self.nodes.try_reserve(additional - recycled)?;
        Ok(())
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.idx()] = node;
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn free_node(&mut self, id: NodeId) -> Node<T> {
        debug_assert_ne!(id, NodeId::ROOT);
        let node = std::mem::replace(&mut self.nodes[id.idx()], Node::empty());
        self.free.push(id);
        node
    }

    #[inline]
    fn get(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id.idx()]
    }

    #[inline]
    fn get_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.nodes[id.idx()]
    }

    fn memory_usage(&self) -> usize {
        let spilled: usize = self
            .nodes
            .iter()
            .map(|n| {
                let prefix = if n.prefix.spilled() {
                    n.prefix.capacity()
                } else {
                    0
                };
                let children = if n.children.spilled() {
                    n.children.capacity() * std::mem::size_of::<(u8, NodeId)>()
                } else {
                    0
                };
                prefix + children
            })
            .sum();
        self.nodes.capacity() * std::mem::size_of::<Node<T>>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
            + spilled
    }
}

#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

// =============================================================================
// KeyIndex
// =============================================================================

/// A sparse ordered map from byte-string keys to `T`.
///
/// `insert` reports its outcome as `Ok(None)` (key was absent),
/// `Ok(Some(old))` (key was present) or `Err(Error::AllocationFailure)`;
/// a failed insert leaves the index untouched.
#[derive(Clone)]
pub struct KeyIndex<T> {
    arena: NodeArena<T>,
    count: usize,
}

impl<T> KeyIndex<T> {
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.arena = NodeArena::new();
        self.count = 0;
    }

    /// Approximate heap bytes held by the index (values' own heap excluded).
    pub fn memory_usage(&self) -> usize {
        self.arena.memory_usage()
    }

    fn find(&self, key: &[u8]) -> Option<NodeId> {
        let mut id = NodeId::ROOT;
        let mut rest = key;
        loop {
            let node = self.arena.get(id);
            rest = rest.strip_prefix(node.prefix.as_slice())?;
            let Some((&byte, tail)) = rest.split_first() else {
                return Some(id);
            };
            let pos = node.find_child(byte).ok()?;
            id = node.children[pos].1;
            rest = tail;
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&T> {
        let id = self.find(key)?;
        self.arena.get(id).value.as_ref()
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: &[u8], value: T) -> Result<Option<T>> {
        // At most one split node and one leaf.
        self.arena.reserve(2)?;

        let mut id = NodeId::ROOT;
        let mut rest = key;
        loop {
            let node = self.arena.get(id);
            let common = common_prefix_len(&node.prefix, rest);
            let diverges = common < node.prefix.len();
            rest = &rest[common..];

            let Some((&byte, tail)) = rest.split_first() else {
                if diverges {
                    self.split(id, common);
                }
                let old = self.arena.get_mut(id).value.replace(value);
                if old.is_none() {
                    self.count += 1;
                }
                return Ok(old);
            };

            if diverges {
                // The split node keeps its single edge inline, so adding the
                // leaf edge next to it cannot allocate.
                self.split(id, common);
            } else {
                match node.find_child(byte) {
                    Ok(pos) => {
                        id = node.children[pos].1;
                        rest = tail;
                        continue;
                    }
                    Err(_) => {
                        self.arena.get_mut(id).children.try_reserve(1)?;
                    }
                }
            }

            let leaf = self.arena.alloc(Node::leaf(tail, value));
            let node = self.arena.get_mut(id);
            let (Ok(pos) | Err(pos)) = node.find_child(byte);
            node.children.insert(pos, (byte, leaf));
            self.count += 1;
            return Ok(None);
        }
    }

    /// Cut `id`'s prefix at `at`: the node keeps `prefix[..at]` and gets a
    /// single child holding the rest of the path, its value and its children.
    fn split(&mut self, id: NodeId, at: usize) {
        let node = self.arena.get_mut(id);
        let edge = node.prefix[at];
        let tail = Node {
            prefix: SmallVec::from_slice(&node.prefix[at + 1..]),
            value: node.value.take(),
            children: std::mem::take(&mut node.children),
        };
        node.prefix.truncate(at);
        let tail_id = self.arena.alloc(tail);
        self.arena.get_mut(id).children.push((edge, tail_id));
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<T> {
        // (parent, child position) along the path.
        let mut path: Vec<(NodeId, usize)> = Vec::with_capacity(16);
        let mut id = NodeId::ROOT;
        let mut rest = key;
        loop {
            let node = self.arena.get(id);
            rest = rest.strip_prefix(node.prefix.as_slice())?;
            let Some((&byte, tail)) = rest.split_first() else {
                break;
            };
            let pos = node.find_child(byte).ok()?;
            path.push((id, pos));
            id = node.children[pos].1;
            rest = tail;
        }

        let old = self.arena.get_mut(id).value.take()?;
        self.count -= 1;

        if id == NodeId::ROOT {
            return Some(old);
        }

        match self.arena.get(id).children.len() {
            0 => {
                let (parent, pos) = path[path.len() - 1];
                self.arena.free_node(id);
                self.arena.get_mut(parent).children.remove(pos);
                let p = self.arena.get(parent);
                if parent != NodeId::ROOT && p.value.is_none() && p.children.len() == 1 {
                    self.merge_child(parent);
                }
            }
            1 => self.merge_child(id),
            _ => {}
        }

        Some(old)
    }

    /// Fold the only child of a valueless node into it.
    fn merge_child(&mut self, id: NodeId) {
        let (edge, child_id) = self.arena.get(id).children[0];
        let child = self.arena.free_node(child_id);
        let node = self.arena.get_mut(id);
        debug_assert!(node.value.is_none());
        node.prefix.push(edge);
        node.prefix.extend_from_slice(&child.prefix);
        node.value = child.value;
        node.children = child.children;
    }

    // -------------------------------------------------------------------------
    // Ordered queries
    // -------------------------------------------------------------------------

    /// Smallest entry.
    pub fn first(&self) -> Option<(Vec<u8>, &T)> {
        self.leftmost(NodeId::ROOT, Vec::new())
    }

    /// Smallest entry whose key is `>= key`.
    pub fn seek(&self, key: &[u8]) -> Option<(Vec<u8>, &T)> {
        self.bound(key, true)
    }

    /// Smallest entry whose key is `> key`. `key` need not be present.
    pub fn successor(&self, key: &[u8]) -> Option<(Vec<u8>, &T)> {
        self.bound(key, false)
    }

    fn leftmost(&self, mut id: NodeId, mut path: Vec<u8>) -> Option<(Vec<u8>, &T)> {
        loop {
            let node = self.arena.get(id);
            path.extend_from_slice(&node.prefix);
            if let Some(value) = node.value.as_ref() {
                return Some((path, value));
            }
            let &(edge, child) = node.children.first()?;
            path.push(edge);
            id = child;
        }
    }

    fn bound(&self, key: &[u8], inclusive: bool) -> Option<(Vec<u8>, &T)> {
        let mut path: Vec<u8> = Vec::with_capacity(key.len() + 8);
        // Closest subtree seen so far whose keys are all greater than `key`:
        // (path length at its parent, edge byte, child).
        let mut fallback: Option<(usize, u8, NodeId)> = None;
        let mut id = NodeId::ROOT;
        let mut rest = key;

        loop {
            let node = self.arena.get(id);
            let common = common_prefix_len(&node.prefix, rest);
            if common < node.prefix.len() {
                if common == rest.len() || node.prefix[common] > rest[common] {
                    // Every key below this node sorts after `key`.
                    return self.leftmost(id, path);
                }
                // Every key below this node sorts before `key`.
                break;
            }

            path.extend_from_slice(&node.prefix);
            rest = &rest[common..];

            let Some((&byte, tail)) = rest.split_first() else {
                if inclusive {
                    if let Some(value) = node.value.as_ref() {
                        return Some((path, value));
                    }
                }
                // Children extend `key`, so all of them sort after it.
                let &(edge, child) = match node.children.first() {
                    Some(first) => first,
                    None => break,
                };
                path.push(edge);
                return self.leftmost(child, path);
            };

            let found = node.find_child(byte);
            let greater = match found {
                Ok(pos) => pos + 1,
                Err(pos) => pos,
            };
            if let Some(&(edge, child)) = node.children.get(greater) {
                fallback = Some((path.len(), edge, child));
            }
            match found {
                Ok(pos) => {
                    path.push(byte);
                    id = node.children[pos].1;
                    rest = tail;
                }
                Err(_) => break,
            }
        }

        let (len, edge, child) = fallback?;
        path.truncate(len);
        path.push(edge);
        self.leftmost(child, path)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            index: self,
            stack: vec![(NodeId::ROOT, 0, None)],
            path: Vec::new(),
            remaining: self.count,
        }
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let mut stack = vec![NodeId::ROOT];
        let mut live = 0usize;
        let mut reachable = 0usize;
        while let Some(id) = stack.pop() {
            reachable += 1;
            let node = self.arena.get(id);
            if id == NodeId::ROOT {
                assert!(node.prefix.is_empty(), "root must not carry a prefix");
            } else {
                assert!(
                    node.value.is_some() || node.children.len() >= 2,
                    "inner node must hold a value or branch"
                );
            }
            if node.value.is_some() {
                live += 1;
            }
            for pair in node.children.windows(2) {
                assert!(pair[0].0 < pair[1].0, "child edges must be sorted");
            }
            stack.extend(node.children.iter().map(|&(_, child)| child));
        }
        assert_eq!(live, self.count, "live values must match len");
        assert_eq!(
            reachable + self.arena.free.len(),
            self.arena.nodes.len(),
            "every arena slot is reachable or free"
        );
    }
}

impl<T> Default for KeyIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for KeyIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order iterator over a [`KeyIndex`].
pub struct Iter<'a, T> {
    index: &'a KeyIndex<T>,
    /// (node, key length before it, incoming edge byte)
    stack: Vec<(NodeId, usize, Option<u8>)>,
    path: Vec<u8>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Vec<u8>, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.index;
        while let Some((id, depth, edge)) = self.stack.pop() {
            let node = index.arena.get(id);
            self.path.truncate(depth);
            if let Some(b) = edge {
                self.path.push(b);
            }
            self.path.extend_from_slice(&node.prefix);

            let len = self.path.len();
            for &(b, child) in node.children.iter().rev() {
                self.stack.push((child, len, Some(b)));
            }

            if let Some(value) = node.value.as_ref() {
                self.remaining -= 1;
                return Some((self.path.clone(), value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;
    use std::ops::Bound;

    #[test]
    fn test_basic() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        t.insert(b"hello", 1).unwrap();
        t.insert(b"world", 2).unwrap();
        assert_eq!(t.get(b"hello"), Some(&1));
        assert_eq!(t.get(b"world"), Some(&2));
        assert_eq!(t.get(b"missing"), None);
        assert_eq!(t.len(), 2);
        t.check_invariants();
    }

    #[test]
    fn test_update() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        assert_eq!(t.insert(b"key", 1).unwrap(), None);
        assert_eq!(t.insert(b"key", 2).unwrap(), Some(1));
        assert_eq!(t.get(b"key"), Some(&2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_nested_prefixes() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        t.insert(b"abc", 3).unwrap();
        t.insert(b"a", 1).unwrap();
        t.insert(b"ab", 2).unwrap();
        t.insert(b"", 0).unwrap();
        t.check_invariants();

        let keys: Vec<Vec<u8>> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![b"".to_vec(), b"a".to_vec(), b"ab".to_vec(), b"abc".to_vec()]
        );

        assert_eq!(t.remove(b"ab"), Some(2));
        t.check_invariants();
        assert_eq!(t.get(b"abc"), Some(&3));
        assert_eq!(t.get(b"ab"), None);
        assert_eq!(t.remove(b"a"), Some(1));
        t.check_invariants();
        assert_eq!(t.get(b"abc"), Some(&3));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        t.insert(b"a", 1).unwrap();
        t.insert(b"b", 2).unwrap();
        t.insert(b"c", 3).unwrap();

        assert_eq!(t.remove(b"b"), Some(2));
        assert_eq!(t.remove(b"b"), None);
        assert_eq!(t.get(b"b"), None);
        assert_eq!(t.len(), 2);

        // Reinserting a removed key should increase length.
        assert_eq!(t.insert(b"b", 4).unwrap(), None);
        assert_eq!(t.get(b"b"), Some(&4));
        assert_eq!(t.len(), 3);
        t.check_invariants();
    }

    #[test]
    fn test_remove_all_recycles_nodes() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        for i in 0..100u64 {
            t.insert(&i.to_be_bytes(), i).unwrap();
        }
        for i in 0..100u64 {
            assert_eq!(t.remove(&i.to_be_bytes()), Some(i));
        }
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
        t.check_invariants();

        let slots = t.arena.nodes.len();
        for i in 0..100u64 {
            t.insert(&i.to_be_bytes(), i).unwrap();
        }
        assert_eq!(t.arena.nodes.len(), slots, "freed nodes must be reused");
        t.check_invariants();
    }

    #[test]
    fn test_first_seek_successor() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        assert_eq!(t.first(), None);
        assert_eq!(t.successor(b""), None);

        for (i, k) in [&b"apple"[..], b"banana", b"band", b"bandana", b"cherry"]
            .iter()
            .enumerate()
        {
            t.insert(k, i as u64).unwrap();
        }

        assert_eq!(t.first(), Some((b"apple".to_vec(), &0)));
        assert_eq!(t.seek(b"apple"), Some((b"apple".to_vec(), &0)));
        assert_eq!(t.successor(b"apple"), Some((b"banana".to_vec(), &1)));
        assert_eq!(t.successor(b"ban"), Some((b"banana".to_vec(), &1)));
        assert_eq!(t.successor(b"banana"), Some((b"band".to_vec(), &2)));
        assert_eq!(t.successor(b"band"), Some((b"bandana".to_vec(), &3)));
        assert_eq!(t.successor(b"bandana"), Some((b"cherry".to_vec(), &4)));
        assert_eq!(t.successor(b"bz"), Some((b"cherry".to_vec(), &4)));
        assert_eq!(t.successor(b"cherry"), None);
        assert_eq!(t.seek(b"cherryz"), None);
        assert_eq!(t.seek(b""), Some((b"apple".to_vec(), &0)));
    }

    #[test]
    fn test_successor_on_integer_keys() {
        let mut t: KeyIndex<()> = KeyIndex::new();
        for k in [3u64, 100, 256, 70_000] {
            t.insert(&k.to_be_bytes(), ()).unwrap();
        }
        let next = |k: u64| {
            t.successor(&k.to_be_bytes())
                .map(|(raw, _)| u64::from_be_bytes(raw.try_into().unwrap()))
        };
        assert_eq!(next(0), Some(3));
        assert_eq!(next(3), Some(100));
        assert_eq!(next(99), Some(100));
        assert_eq!(next(100), Some(256));
        assert_eq!(next(256), Some(70_000));
        assert_eq!(next(70_000), None);
    }

    #[test]
    fn test_iter_sorted_random() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut t: KeyIndex<u64> = KeyIndex::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for _ in 0..2000 {
            let len = rng.gen_range(0..17);
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(0..4u8)).collect();
            let v: u64 = rng.gen();
            assert_eq!(t.insert(&key, v).unwrap(), m.insert(key, v));
        }

        t.check_invariants();
        assert_eq!(t.iter().len(), m.len());
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_randomized_insert_remove_successor() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut t: KeyIndex<u64> = KeyIndex::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for _ in 0..50_000 {
            let op = rng.gen_range(0..100);
            let len = rng.gen_range(0..9);
            // Small alphabet so keys share prefixes and exercise splits/merges.
            let key: Vec<u8> = (0..len).map(|_| rng.gen_range(0..3u8)).collect();

            match op {
                0..=44 => {
                    let v: u64 = rng.gen();
                    assert_eq!(t.insert(&key, v).unwrap(), m.insert(key, v));
                }
                45..=69 => {
                    assert_eq!(t.remove(&key), m.remove(&key));
                }
                70..=84 => {
                    let expected = m
                        .range::<[u8], _>((Bound::Excluded(key.as_slice()), Bound::Unbounded))
                        .next()
                        .map(|(k, v)| (k.clone(), *v));
                    assert_eq!(t.successor(&key).map(|(k, v)| (k, *v)), expected);
                }
                85..=92 => {
                    let expected = m.range(key.clone()..).next().map(|(k, v)| (k.clone(), *v));
                    assert_eq!(t.seek(&key).map(|(k, v)| (k, *v)), expected);
                }
                _ => {
                    assert_eq!(t.get(&key).copied(), m.get(&key).copied());
                }
            }
            assert_eq!(t.len(), m.len());
        }

        t.check_invariants();
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_clear() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        t.insert(b"a", 1).unwrap();
        t.insert(b"b", 2).unwrap();
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.get(b"a"), None);
        assert_eq!(t.first(), None);
        t.check_invariants();
    }

    #[test]
    fn test_clone() {
        let mut t: KeyIndex<u64> = KeyIndex::new();
        t.insert(b"a", 1).unwrap();
        t.insert(b"b", 2).unwrap();
        let t2 = t.clone();
        t.remove(b"a");
        assert_eq!(t2.get(b"a"), Some(&1));
        assert_eq!(t2.get(b"b"), Some(&2));
    }
}
