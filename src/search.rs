use crate::agent::{SearchKind, Status};
use crate::layer::ROOT;
use crate::{Agent, KeyId, QueryError, Trie, INVALID_KEY_ID};

/// Result of a common prefix search match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixMatch {
    /// Length of the matched prefix (in bytes).
    pub len: usize,
    /// ID of the matched key.
    pub key_id: KeyId,
}

/// Result of a predictive search match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchMatch {
    /// The full matched key.
    pub key: Vec<u8>,
    /// ID of the matched key.
    pub key_id: KeyId,
}

impl Trie<'_> {
    /// Exact match of `agent.query()`.
    ///
    /// Returns `Ok(true)` and sets `agent.key()`/`agent.key_id()` if the query
    /// is a stored key; `Ok(false)` with `key_id() == INVALID_KEY_ID` otherwise.
    ///
    /// # Errors
    ///
    /// [`QueryError::QueryNotSet`] if the agent has no byte-string query.
    pub fn lookup(&self, agent: &mut Agent) -> Result<bool, QueryError> {
        agent.require_bytes()?;
        let (query, _, key, key_id) = agent.parts();
        key.clear();
        match self.find(query) {
            Some(id) => {
                key.extend_from_slice(query);
                *key_id = id;
                Ok(true)
            }
            None => {
                *key_id = INVALID_KEY_ID;
                Ok(false)
            }
        }
    }

    /// Exact match search. Returns the key ID, or [`INVALID_KEY_ID`] if `key`
    /// is not stored.
    pub fn lookup_key(&self, key: &[u8]) -> KeyId {
        self.find(key).unwrap_or(INVALID_KEY_ID)
    }

    /// Returns true if `key` is stored.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Restores the key whose ID is `agent.query_id()` into `agent.key()`.
    ///
    /// # Errors
    ///
    /// [`QueryError::QueryIdNotSet`] without an ID query,
    /// [`QueryError::KeyIdOutOfRange`] if the ID is not below `num_keys()`.
    pub fn reverse_lookup(&self, agent: &mut Agent) -> Result<bool, QueryError> {
        let id = agent.require_id()?;
        let (_, _, key, key_id) = agent.parts();
        self.restore_key(id, key)?;
        *key_id = id;
        Ok(true)
    }

    /// Returns the key whose ID is `id`.
    ///
    /// # Errors
    ///
    /// [`QueryError::KeyIdOutOfRange`] if `id` is not below `num_keys()`.
    pub fn reverse_lookup_id(&self, id: KeyId) -> Result<Vec<u8>, QueryError> {
        let mut key = Vec::new();
        self.restore_key(id, &mut key)?;
        Ok(key)
    }

    /// Yields the next stored key that is a prefix of `agent.query()`,
    /// shortest first.
    ///
    /// Call repeatedly; returns `Ok(false)` once every prefix was reported,
    /// and keeps returning `Ok(false)` until a new query is set. Switching
    /// to [`predictive_search`](Trie::predictive_search) and back restarts.
    ///
    /// # Errors
    ///
    /// [`QueryError::QueryNotSet`] if the agent has no byte-string query.
    pub fn common_prefix_search(&self, agent: &mut Agent) -> Result<bool, QueryError> {
        agent.require_bytes()?;
        let (query, state, key, key_id) = agent.parts();
        let layer = &self.layers[0];

        match state.status {
            Status::Running(SearchKind::CommonPrefix) => {}
            Status::Exhausted(SearchKind::CommonPrefix) => return Ok(false),
            _ => {
                state.reset_to(Status::Running(SearchKind::CommonPrefix));
                if let Some(id) = layer.key_id(ROOT) {
                    key.clear();
                    *key_id = id;
                    return Ok(true);
                }
            }
        }

        loop {
            let mut pos = state.pos;
            match self.step(state.node, query, &mut pos) {
                Some(next) => {
                    state.node = next;
                    state.pos = pos;
                    if let Some(id) = layer.key_id(next) {
                        key.clear();
                        key.extend_from_slice(&query[..pos]);
                        *key_id = id;
                        return Ok(true);
                    }
                }
                None => {
                    state.status = Status::Exhausted(SearchKind::CommonPrefix);
                    return Ok(false);
                }
            }
        }
    }

    /// Collects every common prefix match of `query`, shortest first.
    pub fn common_prefixes(&self, query: &[u8]) -> Vec<PrefixMatch> {
        let layer = &self.layers[0];
        let mut out = Vec::new();
        let mut node = ROOT;
        let mut pos = 0;
        loop {
            if let Some(key_id) = layer.key_id(node) {
                out.push(PrefixMatch { len: pos, key_id });
            }
            match self.step(node, query, &mut pos) {
                Some(next) => node = next,
                None => return out,
            }
        }
    }

    /// Yields the next stored key starting with `agent.query()`, in
    /// ascending key ID order.
    ///
    /// Call repeatedly; returns `Ok(false)` once every match was reported,
    /// and keeps returning `Ok(false)` until a new query is set. Switching
    /// to [`common_prefix_search`](Trie::common_prefix_search) and back
    /// restarts.
    ///
    /// # Errors
    ///
    /// [`QueryError::QueryNotSet`] if the agent has no byte-string query.
    pub fn predictive_search(&self, agent: &mut Agent) -> Result<bool, QueryError> {
        agent.require_bytes()?;
        let (query, state, key, key_id) = agent.parts();
        let layer = &self.layers[0];

        match state.status {
            Status::Running(SearchKind::Predictive) => {}
            Status::Exhausted(SearchKind::Predictive) => return Ok(false),
            _ => {
                state.reset_to(Status::Running(SearchKind::Predictive));
                match self.descend(query, &mut state.key_buf) {
                    Some(node) => {
                        let depth = state.key_buf.len() as u32;
                        state.stack.push((node, depth, false));
                    }
                    None => {
                        state.status = Status::Exhausted(SearchKind::Predictive);
                        return Ok(false);
                    }
                }
            }
        }

        while let Some((node, parent_depth, append_edge)) = state.stack.pop() {
            // Restore key_buf to the parent's depth, then append this node's edge.
            if append_edge {
                state.key_buf.truncate(parent_depth as usize);
                state.key_buf.push(layer.label(node));
                if let Some(link) = layer.link(node) {
                    self.restore_link(0, link, &mut state.key_buf);
                }
            }
            let depth = state.key_buf.len() as u32;

            state.children_buf.clear();
            let mut child = layer.first_child(node);
            while let Some(c) = child {
                state.children_buf.push(c);
                child = layer.next_sibling(c);
            }
            for &c in state.children_buf.iter().rev() {
                state.stack.push((c, depth, true));
            }

            if let Some(id) = layer.key_id(node) {
                key.clear();
                key.extend_from_slice(&state.key_buf);
                *key_id = id;
                return Ok(true);
            }
        }
        state.status = Status::Exhausted(SearchKind::Predictive);
        Ok(false)
    }

    /// Collects every key starting with `prefix`, in ascending key ID order.
    pub fn predictions(&self, prefix: &[u8]) -> Vec<SearchMatch> {
        let mut agent = Agent::new();
        agent.set_query(prefix);
        let mut out = Vec::new();
        while let Ok(true) = self.predictive_search(&mut agent) {
            out.push(SearchMatch {
                key: agent.key().to_vec(),
                key_id: agent.key_id(),
            });
        }
        out
    }

    /// Walks the whole query through the first layer.
    fn find(&self, query: &[u8]) -> Option<KeyId> {
        let mut node = ROOT;
        let mut pos = 0;
        while pos < query.len() {
            node = self.step(node, query, &mut pos)?;
        }
        self.layers[0].key_id(node)
    }

    /// Follows one edge of the first layer, consuming `query[*pos]` and the
    /// edge's link if it has one. `pos` only moves on success.
    #[inline]
    fn step(&self, node: u32, query: &[u8], pos: &mut usize) -> Option<u32> {
        let layer = &self.layers[0];
        let label = *query.get(*pos)?;
        let child = layer.child(node, label)?;
        let mut next_pos = *pos + 1;
        if let Some(link) = layer.link(child) {
            if !self.match_link(0, link, query, &mut next_pos) {
                return None;
            }
        }
        *pos = next_pos;
        Some(child)
    }

    /// Walks toward the node whose path has `query` as a prefix, writing that
    /// path into `key_buf`. The query may end inside an edge.
    fn descend(&self, query: &[u8], key_buf: &mut Vec<u8>) -> Option<u32> {
        let layer = &self.layers[0];
        key_buf.clear();
        let mut node = ROOT;
        while key_buf.len() < query.len() {
            let start = key_buf.len();
            node = layer.child(node, query[start])?;
            key_buf.push(query[start]);
            if let Some(link) = layer.link(node) {
                self.restore_link(0, link, key_buf);
                let end = key_buf.len().min(query.len());
                if key_buf[start + 1..end] != query[start + 1..end] {
                    return None;
                }
            }
        }
        Some(node)
    }

    /// Writes key `id` into `out`, replacing its contents.
    fn restore_key(&self, id: KeyId, out: &mut Vec<u8>) -> Result<(), QueryError> {
        let layer = &self.layers[0];
        let mut node = layer
            .terminal_node(id)
            .ok_or(QueryError::KeyIdOutOfRange {
                id,
                num_keys: self.num_keys(),
            })?;
        out.clear();
        // Collect edges back to front, then flip the whole buffer.
        while node != ROOT {
            if let Some(link) = layer.link(node) {
                let start = out.len();
                self.restore_link(0, link, out);
                out[start..].reverse();
            }
            out.push(layer.label(node));
            node = layer.parent(node);
        }
        out.reverse();
        Ok(())
    }

    /// Appends the link of a `layer` node to `out`, in reading order.
    fn restore_link(&self, layer: usize, link: u32, out: &mut Vec<u8>) {
        if layer + 1 < self.layers.len() {
            self.restore_upward(layer + 1, link, out);
        } else {
            self.tail.restore(link, out);
        }
    }

    /// Matches the link of a `layer` node against `query[*pos..]`.
    fn match_link(&self, layer: usize, link: u32, query: &[u8], pos: &mut usize) -> bool {
        if layer + 1 < self.layers.len() {
            self.match_upward(layer + 1, link, query, pos)
        } else {
            self.tail.match_at(link, query, pos)
        }
    }

    /// Emits key `id` of an inner layer by walking from its terminal node to
    /// the root. Inner layers store their strings reversed, so this yields
    /// the string the link stands for.
    fn restore_upward(&self, layer_idx: usize, id: KeyId, out: &mut Vec<u8>) {
        let layer = &self.layers[layer_idx];
        let Some(mut node) = layer.terminal_node(id) else {
            return;
        };
        while node != ROOT {
            if let Some(link) = layer.link(node) {
                self.restore_link(layer_idx, link, out);
            }
            out.push(layer.label(node));
            node = layer.parent(node);
        }
    }

    /// Same walk as [`Self::restore_upward`], comparing instead of copying.
    fn match_upward(&self, layer_idx: usize, id: KeyId, query: &[u8], pos: &mut usize) -> bool {
        let layer = &self.layers[layer_idx];
        let Some(mut node) = layer.terminal_node(id) else {
            return false;
        };
        let mut p = *pos;
        while node != ROOT {
            if let Some(link) = layer.link(node) {
                if !self.match_link(layer_idx, link, query, &mut p) {
                    return false;
                }
            }
            if query.get(p) != Some(&layer.label(node)) {
                return false;
            }
            p += 1;
            node = layer.parent(node);
        }
        *pos = p;
        true
    }
}
