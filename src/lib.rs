//! A static, cascading double-array trie used as a key-to-ID dictionary.
//!
//! This crate provides [`Trie`], an immutable set of byte strings where every
//! key gets a dense ID in `[0, num_keys)`. It supports exact lookup, reverse
//! lookup (ID → key), common prefix search and predictive search through a
//! reusable [`Agent`], and a flat serialized form that can be loaded by copy
//! or mapped zero-copy.
//!
//! Multi-byte edges are stored once: the remainder of each edge goes into a
//! further trie layer (up to [`BuildConfig::num_tries`] layers) or, in the
//! last layer, into a suffix-merged tail store.
//!
//! # Quick start
//!
//! ```
//! use cascade_trie::{Agent, Trie, INVALID_KEY_ID};
//!
//! let trie = Trie::from_keys(["cake", "cookie", "ice", "ice-cream"]).unwrap();
//! let id = trie.lookup_key(b"cake");
//! assert_ne!(id, INVALID_KEY_ID);
//! assert_eq!(trie.lookup_key(b"cockoo"), INVALID_KEY_ID);
//! assert_eq!(trie.reverse_lookup_id(id).unwrap(), b"cake");
//!
//! let mut agent = Agent::new();
//! agent.set_query("ice-cream soda");
//! let mut found = Vec::new();
//! while trie.common_prefix_search(&mut agent).unwrap() {
//!     found.push(agent.key().to_vec());
//! }
//! assert_eq!(found, vec![b"ice".to_vec(), b"ice-cream".to_vec()]);
//! ```
//!
//! # Concurrency
//!
//! A built or loaded [`Trie`] is never mutated and is `Send + Sync`. Share it
//! freely between threads; give each thread its own [`Agent`].

#![warn(missing_docs)]

mod agent;
mod bit_vec;
mod build;
mod code_map;
mod config;
mod error;
mod keyset;
mod layer;
mod node;
mod search;
mod serial;
mod tail;

pub use agent::Agent;
pub use config::{
    BuildConfig, NodeOrder, TailMode, DEFAULT_MAX_KEY_LENGTH, DEFAULT_NUM_TRIES, MAX_NUM_TRIES,
    MIN_NUM_TRIES,
};
pub use error::{BuildError, Error, FormatError, QueryError, Result};
pub use keyset::Keyset;
pub use search::{PrefixMatch, SearchMatch};

use layer::Layer;
use tail::Tail;

/// Dense identifier of a stored key.
pub type KeyId = u32;

/// Reserved ID that never names a key: returned by lookups that miss.
pub const INVALID_KEY_ID: KeyId = KeyId::MAX;

/// An immutable cascading trie.
///
/// `Trie<'static>` owns its data (built or [loaded](Trie::load)); a
/// [mapped](Trie::map) trie borrows its tables from the caller's buffer for
/// `'a`.
#[derive(Clone, Debug)]
pub struct Trie<'a> {
    pub(crate) layers: Vec<Layer<'a>>,
    pub(crate) tail: Tail<'a>,
    pub(crate) node_order: NodeOrder,
}

impl<'a> Trie<'a> {
    pub(crate) fn from_layers(layers: Vec<Layer<'a>>, tail: Tail<'a>, node_order: NodeOrder) -> Self {
        debug_assert!(!layers.is_empty(), "a trie has at least one layer");
        Self {
            layers,
            tail,
            node_order,
        }
    }

    /// Number of distinct keys.
    pub fn num_keys(&self) -> usize {
        self.layers[0].num_keys()
    }

    /// Returns true if the trie stores no key.
    pub fn is_empty(&self) -> bool {
        self.num_keys() == 0
    }

    /// Number of cascaded layers actually built.
    pub fn num_tries(&self) -> usize {
        self.layers.len()
    }

    /// Number of trie nodes over all layers.
    pub fn num_nodes(&self) -> usize {
        self.layers.iter().map(Layer::num_nodes).sum()
    }

    /// Tail mode in effect (text mode falls back to binary for NUL bytes).
    pub fn tail_mode(&self) -> TailMode {
        self.tail.mode()
    }

    /// Sibling order the trie was built with.
    pub fn node_order(&self) -> NodeOrder {
        self.node_order
    }

    /// Detaches a mapped trie from its buffer by copying every table.
    pub fn into_owned(self) -> Trie<'static> {
        Trie {
            layers: self.layers.into_iter().map(Layer::into_owned).collect(),
            tail: self.tail.into_owned(),
            node_order: self.node_order,
        }
    }
}

/// Keys whose edge remainders share a long ending, so a second layer comes
/// out smaller than a tail holding every remainder.
#[cfg(test)]
pub(crate) fn suffix_sharing_keys() -> Vec<Vec<u8>> {
    const ENDING: &[u8] = b"-a-long-ending-shared-by-every-key-in-this-set";
    let mut keys = Vec::with_capacity(26 * 26);
    for a in b'a'..=b'z' {
        for b in b'a'..=b'z' {
            let mut key = vec![a, b, b, a];
            key.extend_from_slice(ENDING);
            keys.push(key);
        }
    }
    keys
}
