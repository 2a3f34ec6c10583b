use crate::{KeyId, QueryError, INVALID_KEY_ID};

/// What the agent was last asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Query {
    Unset,
    Bytes,
    Id(KeyId),
}

/// The two resumable searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SearchKind {
    CommonPrefix,
    Predictive,
}

/// Progress of a resumable search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Status {
    /// No search has run since the query was set.
    Ready,
    /// A search of this kind is under way.
    Running(SearchKind),
    /// A search of this kind yielded everything it had.
    Exhausted(SearchKind),
}

/// Cursor of a resumable search, kept inside the agent between calls.
#[derive(Clone, Debug)]
pub(crate) struct SearchState {
    pub(crate) status: Status,
    /// Common prefix search: current node and consumed query length.
    pub(crate) node: u32,
    pub(crate) pos: usize,
    /// Predictive search DFS stack: `(node, parent key length, append edge)`.
    /// The subtree root is pushed with `append edge = false` because the
    /// key buffer already spells the path to it.
    pub(crate) stack: Vec<(u32, u32, bool)>,
    /// Key under construction during predictive search.
    pub(crate) key_buf: Vec<u8>,
    /// Scratch space for collecting the children of one node.
    pub(crate) children_buf: Vec<u32>,
}

impl SearchState {
    fn new() -> Self {
        Self {
            status: Status::Ready,
            node: 0,
            pos: 0,
            stack: Vec::new(),
            key_buf: Vec::new(),
            children_buf: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.reset_to(Status::Ready);
    }

    /// Rewinds to the start of the query and enters `status`.
    pub(crate) fn reset_to(&mut self, status: Status) {
        self.status = status;
        self.node = 0;
        self.pos = 0;
        self.stack.clear();
        self.key_buf.clear();
        self.children_buf.clear();
    }
}

/// Reusable query state.
///
/// An agent carries a query (bytes or a key ID), the last result, and the
/// cursor of an iterative search. It is independent of any trie and keeps
/// its buffers between queries, so repeated queries do not allocate once the
/// buffers have grown.
///
/// Searches are resumable: every call of
/// [`Trie::common_prefix_search`](crate::Trie::common_prefix_search) or
/// [`Trie::predictive_search`](crate::Trie::predictive_search) yields the next
/// match and returns `Ok(false)` once exhausted, until a new query is set.
/// Starting a different kind of search on the same query restarts from the
/// beginning of that query.
///
/// ```
/// use cascade_trie::{Agent, Trie};
///
/// let trie = Trie::from_keys(["ice", "ice-cream", "cake"]).unwrap();
/// let mut agent = Agent::new();
/// agent.set_query("ic");
/// let mut keys = Vec::new();
/// while trie.predictive_search(&mut agent).unwrap() {
///     keys.push(String::from_utf8(agent.key().to_vec()).unwrap());
/// }
/// assert_eq!(keys, ["ice", "ice-cream"]);
/// ```
#[derive(Clone, Debug)]
pub struct Agent {
    query: Query,
    query_bytes: Vec<u8>,
    key: Vec<u8>,
    key_id: KeyId,
    pub(crate) state: SearchState,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent {
    /// Creates an agent with no query.
    pub fn new() -> Self {
        Self {
            query: Query::Unset,
            query_bytes: Vec::new(),
            key: Vec::new(),
            key_id: INVALID_KEY_ID,
            state: SearchState::new(),
        }
    }

    /// Sets a byte-string query and resets any search in progress.
    pub fn set_query(&mut self, query: impl AsRef<[u8]>) {
        self.query_bytes.clear();
        self.query_bytes.extend_from_slice(query.as_ref());
        self.query = Query::Bytes;
        self.reset_result();
    }

    /// Sets a key-ID query for reverse lookup and resets any search in progress.
    pub fn set_query_id(&mut self, id: KeyId) {
        self.query_bytes.clear();
        self.query = Query::Id(id);
        self.reset_result();
    }

    /// Forgets the query and the last result.
    pub fn clear(&mut self) {
        self.query_bytes.clear();
        self.query = Query::Unset;
        self.reset_result();
    }

    /// The current byte-string query (empty for ID queries).
    pub fn query(&self) -> &[u8] {
        &self.query_bytes
    }

    /// The current key-ID query, if one is set.
    pub fn query_id(&self) -> Option<KeyId> {
        match self.query {
            Query::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Bytes of the last matched key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// ID of the last matched key, or [`INVALID_KEY_ID`] after a miss.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    fn reset_result(&mut self) {
        self.key.clear();
        self.key_id = INVALID_KEY_ID;
        self.state.reset();
    }

    /// Fails unless a byte-string query is set.
    pub(crate) fn require_bytes(&self) -> Result<(), QueryError> {
        match self.query {
            Query::Bytes => Ok(()),
            _ => Err(QueryError::QueryNotSet),
        }
    }

    /// Fails unless a key-ID query is set.
    pub(crate) fn require_id(&self) -> Result<KeyId, QueryError> {
        match self.query {
            Query::Id(id) => Ok(id),
            _ => Err(QueryError::QueryIdNotSet),
        }
    }

    /// Splits the agent into the query and the mutable parts searches update.
    pub(crate) fn parts(&mut self) -> (&[u8], &mut SearchState, &mut Vec<u8>, &mut KeyId) {
        (
            &self.query_bytes,
            &mut self.state,
            &mut self.key,
            &mut self.key_id,
        )
    }
}
