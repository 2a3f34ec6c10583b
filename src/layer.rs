use std::borrow::Cow;

use crate::bit_vec::BitVector;
use crate::code_map::CodeMapper;
use crate::node::{Node, NO_PARENT};
use crate::KeyId;

/// Index of the root cell in every layer.
pub(crate) const ROOT: u32 = 0;

/// One double-array layer of a cascading trie.
///
/// Besides the base/check cells it keeps:
/// - sibling order (`first_child`, `next_sibling`; 0 means none, the root is
///   never a child),
/// - terminal cells ranked into `key_ids` and inverted by `terminal_nodes`,
/// - link cells ranked into `link_values`, which hold a key ID of the next
///   layer or an offset into the tail store.
///
/// Layers past the first are only walked upward from `terminal_nodes`, so
/// they leave `first_child`, `next_sibling`, `key_ids` and `terminals` empty.
///
/// Every table is a `Cow` so a layer can either own its data or borrow it
/// from a mapped buffer.
#[derive(Clone, Debug)]
pub(crate) struct Layer<'a> {
    pub(crate) code_map: CodeMapper<'a>,
    pub(crate) nodes: Cow<'a, [Node]>,
    pub(crate) first_child: Cow<'a, [u32]>,
    pub(crate) next_sibling: Cow<'a, [u32]>,
    pub(crate) terminals: BitVector<'a>,
    pub(crate) links: BitVector<'a>,
    pub(crate) key_ids: Cow<'a, [u32]>,
    pub(crate) terminal_nodes: Cow<'a, [u32]>,
    pub(crate) link_values: Cow<'a, [u32]>,
    pub(crate) num_nodes: u32,
}

impl<'a> Layer<'a> {
    /// Number of keys stored in this layer.
    #[inline]
    pub(crate) fn num_keys(&self) -> usize {
        self.terminal_nodes.len()
    }

    /// Number of logical nodes (used cells).
    #[inline]
    pub(crate) fn num_nodes(&self) -> usize {
        self.num_nodes as usize
    }

    /// Number of double-array cells, free ones included.
    #[inline]
    pub(crate) fn num_cells(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cells carrying a link.
    #[inline]
    pub(crate) fn num_links(&self) -> usize {
        self.link_values.len()
    }

    /// Follows the edge starting with `label` out of `node`.
    #[inline]
    pub(crate) fn child(&self, node: u32, label: u8) -> Option<u32> {
        let code = self.code_map.get(label);
        if code == 0 {
            return None;
        }
        let next = self.nodes[node as usize].base() ^ code;
        match self.nodes.get(next as usize) {
            Some(n) if n.check() == node => Some(next),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn parent(&self, node: u32) -> u32 {
        self.nodes[node as usize].check()
    }

    /// First byte of the edge into `node`. Not meaningful for the root.
    #[inline]
    pub(crate) fn label(&self, node: u32) -> u8 {
        let parent = self.parent(node);
        let code = node ^ self.nodes[parent as usize].base();
        self.code_map.reverse(code)
    }

    /// Key ID of `node` if a key ends there.
    #[inline]
    pub(crate) fn key_id(&self, node: u32) -> Option<KeyId> {
        if !self.nodes[node as usize].is_terminal() {
            return None;
        }
        Some(self.key_ids[self.terminals.rank1(node as usize)])
    }

    /// Cell where key `id` ends.
    #[inline]
    pub(crate) fn terminal_node(&self, id: KeyId) -> Option<u32> {
        self.terminal_nodes.get(id as usize).copied()
    }

    /// Link value of `node` if its edge is longer than one byte.
    #[inline]
    pub(crate) fn link(&self, node: u32) -> Option<u32> {
        if !self.nodes[node as usize].has_link() {
            return None;
        }
        Some(self.link_values[self.links.rank1(node as usize)])
    }

    #[inline]
    pub(crate) fn first_child(&self, node: u32) -> Option<u32> {
        match self.first_child[node as usize] {
            0 => None,
            c => Some(c),
        }
    }

    #[inline]
    pub(crate) fn next_sibling(&self, node: u32) -> Option<u32> {
        match self.next_sibling[node as usize] {
            0 => None,
            s => Some(s),
        }
    }

    /// Checks every structural invariant the query code relies on, so that
    /// queries over loaded data never index out of bounds or loop forever.
    ///
    /// `link_bound` is the exclusive upper bound for link values (next layer's
    /// key count, or the tail length for the last layer). `first` selects the
    /// full table set of the first layer over the compact one of inner layers.
    pub(crate) fn validate(&self, link_bound: usize, first: bool) -> Result<(), &'static str> {
        let cells = self.nodes.len();
        if cells == 0 || cells > crate::node::MAX_CELLS {
            return Err("layer has no root cell");
        }
        let table_len = if first { cells } else { 0 };
        if self.first_child.len() != table_len || self.next_sibling.len() != table_len {
            return Err("sibling table length mismatch");
        }
        if self.terminals.len() != table_len || self.links.len() != cells {
            return Err("flag vector length mismatch");
        }
        if first
            && (self.terminals.count_ones() != self.key_ids.len()
                || self.key_ids.len() != self.terminal_nodes.len())
        {
            return Err("terminal count mismatch");
        }
        if !first && !self.key_ids.is_empty() {
            return Err("inner layer carries key ids");
        }
        if self.links.count_ones() != self.link_values.len() {
            return Err("link count mismatch");
        }
        let root = self.nodes[ROOT as usize];
        if root.check() != NO_PARENT || root.has_link() {
            return Err("malformed root cell");
        }

        let alphabet = self.code_map.alphabet_size();
        let mut used = 1usize;
        let mut terminal_cells = 0usize;
        for (i, n) in self.nodes.iter().enumerate() {
            if n.has_link() != self.links.get(i)
                || (first && n.is_terminal() != self.terminals.get(i))
            {
                return Err("node flags disagree with flag vectors");
            }
            if n.is_terminal() {
                terminal_cells += 1;
            }
            if i == ROOT as usize {
                continue;
            }
            if n.is_free() {
                if n.is_terminal() || n.has_link() || (first && self.first_child[i] != 0) {
                    return Err("free cell carries node data");
                }
                continue;
            }
            used += 1;
            let p = n.check() as usize;
            if p >= cells || (p != ROOT as usize && self.nodes[p].is_free()) {
                return Err("parent index out of range");
            }
            let code = i as u32 ^ self.nodes[p].base();
            if code == 0 || code >= alphabet {
                return Err("edge code out of range");
            }
        }
        if used != self.num_nodes as usize {
            return Err("node count mismatch");
        }
        if terminal_cells != self.terminal_nodes.len() {
            return Err("terminal count mismatch");
        }

        if first {
            for i in 0..cells {
                let c = self.first_child[i] as usize;
                if c != 0 && (c >= cells || self.nodes[c].check() as usize != i) {
                    return Err("first child is not a child");
                }
                let s = self.next_sibling[i] as usize;
                if s != 0 && (s >= cells || self.nodes[s].check() != self.nodes[i].check()) {
                    return Err("next sibling has a different parent");
                }
            }
        }
        self.validate_acyclic()?;

        if first {
            for (rank, &id) in self.key_ids.iter().enumerate() {
                let node = match self.terminal_nodes.get(id as usize) {
                    Some(&n) => n as usize,
                    None => return Err("key id out of range"),
                };
                if node >= cells
                    || !self.nodes[node].is_terminal()
                    || self.terminals.rank1(node) != rank
                {
                    return Err("key id table is not a bijection");
                }
            }
        } else {
            // Distinct terminal cells, as many as there are flags, cover each
            // terminal exactly once.
            let mut seen = vec![false; cells];
            for &node in self.terminal_nodes.iter() {
                let node = node as usize;
                if node >= cells || !self.nodes[node].is_terminal() || seen[node] {
                    return Err("terminal node table is not a bijection");
                }
                seen[node] = true;
            }
        }
        if self.link_values.iter().any(|&v| v as usize >= link_bound) {
            return Err("link value out of range");
        }
        Ok(())
    }

    /// Parent chains must reach the root and sibling chains must end.
    fn validate_acyclic(&self) -> Result<(), &'static str> {
        const UNSEEN: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;
        let cells = self.nodes.len();
        let mut state = vec![UNSEEN; cells];
        state[ROOT as usize] = DONE;
        let mut path = Vec::new();
        for start in 0..cells {
            if self.nodes[start].is_free() {
                continue;
            }
            let mut cur = start;
            while state[cur] == UNSEEN {
                state[cur] = ON_PATH;
                path.push(cur);
                cur = self.nodes[cur].check() as usize;
            }
            if state[cur] == ON_PATH {
                return Err("parent cycle");
            }
            for &n in &path {
                state[n] = DONE;
            }
            path.clear();
        }

        // A sibling chain visits at most alphabet_size distinct children.
        let limit = self.code_map.alphabet_size() as usize;
        for i in 0..self.first_child.len() {
            let mut sib = self.first_child[i];
            let mut steps = 0usize;
            while sib != 0 {
                steps += 1;
                if steps > limit {
                    return Err("sibling cycle");
                }
                sib = self.next_sibling[sib as usize];
            }
        }
        Ok(())
    }

    pub(crate) fn into_owned(self) -> Layer<'static> {
        Layer {
            code_map: self.code_map.into_owned(),
            nodes: Cow::Owned(self.nodes.into_owned()),
            first_child: Cow::Owned(self.first_child.into_owned()),
            next_sibling: Cow::Owned(self.next_sibling.into_owned()),
            terminals: self.terminals.into_owned(),
            links: self.links.into_owned(),
            key_ids: Cow::Owned(self.key_ids.into_owned()),
            terminal_nodes: Cow::Owned(self.terminal_nodes.into_owned()),
            link_values: Cow::Owned(self.link_values.into_owned()),
            num_nodes: self.num_nodes,
        }
    }
}
