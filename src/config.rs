use crate::BuildError;

/// Smallest number of cascaded trie layers.
pub const MIN_NUM_TRIES: usize = 1;
/// Largest number of cascaded trie layers.
pub const MAX_NUM_TRIES: usize = 127;
/// Number of layers used when none is configured.
pub const DEFAULT_NUM_TRIES: usize = 3;
/// Key length bound used when none is configured.
pub const DEFAULT_MAX_KEY_LENGTH: usize = 1 << 20;

/// How the last layer stores its edge remainders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TailMode {
    /// Entries are terminated by a NUL byte. Falls back to [`TailMode::Binary`]
    /// when an entry contains NUL.
    #[default]
    Text,
    /// Entry ends are marked in a separate bit vector.
    Binary,
}

/// How siblings are ordered, which fixes key IDs and predictive search order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeOrder {
    /// Heavier subtrees first, ties broken by label.
    #[default]
    Weight,
    /// Ascending label order: key IDs are lexicographic ranks.
    Label,
}

impl TailMode {
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            TailMode::Text => 0,
            TailMode::Binary => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(TailMode::Text),
            1 => Some(TailMode::Binary),
            _ => None,
        }
    }
}

impl NodeOrder {
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            NodeOrder::Weight => 0,
            NodeOrder::Label => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(NodeOrder::Weight),
            1 => Some(NodeOrder::Label),
            _ => None,
        }
    }
}

/// Build-time configuration.
///
/// ```
/// use cascade_trie::{BuildConfig, NodeOrder, TailMode};
///
/// let config = BuildConfig::new()
///     .num_tries(2)
///     .tail_mode(TailMode::Binary)
///     .node_order(NodeOrder::Label);
/// assert_eq!(config.get_num_tries(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BuildConfig {
    num_tries: usize,
    tail_mode: TailMode,
    node_order: NodeOrder,
    max_key_length: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            num_tries: DEFAULT_NUM_TRIES,
            tail_mode: TailMode::default(),
            node_order: NodeOrder::default(),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
        }
    }
}

impl BuildConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of cascaded layers.
    ///
    /// The builder stops earlier when a further layer would not come out
    /// smaller than the tail it replaces.
    pub fn num_tries(mut self, num_tries: usize) -> Self {
        self.num_tries = num_tries;
        self
    }

    /// Sets the tail store mode.
    pub fn tail_mode(mut self, tail_mode: TailMode) -> Self {
        self.tail_mode = tail_mode;
        self
    }

    /// Sets the sibling order.
    pub fn node_order(mut self, node_order: NodeOrder) -> Self {
        self.node_order = node_order;
        self
    }

    /// Sets the longest accepted key, in bytes.
    pub fn max_key_length(mut self, max_key_length: usize) -> Self {
        self.max_key_length = max_key_length;
        self
    }

    /// Configured maximum number of layers.
    pub fn get_num_tries(&self) -> usize {
        self.num_tries
    }

    /// Configured tail mode.
    pub fn get_tail_mode(&self) -> TailMode {
        self.tail_mode
    }

    /// Configured sibling order.
    pub fn get_node_order(&self) -> NodeOrder {
        self.node_order
    }

    /// Configured key length bound.
    pub fn get_max_key_length(&self) -> usize {
        self.max_key_length
    }

    pub(crate) fn validate(&self) -> Result<(), BuildError> {
        if !(MIN_NUM_TRIES..=MAX_NUM_TRIES).contains(&self.num_tries) {
            return Err(BuildError::InvalidNumTries {
                got: self.num_tries,
                min: MIN_NUM_TRIES,
                max: MAX_NUM_TRIES,
            });
        }
        Ok(())
    }
}
