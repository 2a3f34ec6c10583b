//! Error types for cascade-trie.

use thiserror::Error;

use crate::KeyId;

/// Result type alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a trie. No partial trie is produced.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum BuildError {
    /// The key set holds no keys.
    #[error("key set is empty")]
    EmptyKeyset,

    /// A key is longer than the configured maximum.
    #[error("key of length {len} exceeds the maximum key length {max}")]
    KeyTooLong {
        /// Length of the offending key.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A weight is negative, NaN or infinite.
    #[error("invalid key weight: {0}")]
    InvalidWeight(f32),

    /// `num_tries` is outside the supported range.
    #[error("number of tries must be in [{min}, {max}], got {got}")]
    InvalidNumTries {
        /// Requested value.
        got: usize,
        /// Smallest supported value.
        min: usize,
        /// Largest supported value.
        max: usize,
    },

    /// More distinct keys than a [`KeyId`] can address.
    #[error("too many keys: {0}")]
    TooManyKeys(usize),

    /// The double array outgrew the 31-bit node index space.
    #[error("too many nodes: double array needs more than {0} cells")]
    TooManyNodes(usize),

    /// The tail store outgrew its 32-bit offset space.
    #[error("tail store too large: {0} bytes")]
    TailTooLarge(usize),
}

/// Errors raised while loading or mapping a serialized trie.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum FormatError {
    /// The binary data does not start with the expected magic bytes.
    #[error("invalid magic number")]
    InvalidMagic,

    /// The binary data was written by an incompatible format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    /// The buffer ends before a section it declares.
    #[error("truncated data: needed {needed} bytes at offset {offset}")]
    Truncated {
        /// Offset of the section being read.
        offset: usize,
        /// Bytes required from that offset.
        needed: usize,
    },

    /// The header's total size disagrees with the buffer.
    #[error("size mismatch: header says {expected} bytes, buffer has {actual}")]
    SizeMismatch {
        /// Size recorded in the header.
        expected: u64,
        /// Length of the provided buffer.
        actual: usize,
    },

    /// A section is not aligned for zero-copy access.
    #[error("misaligned data at offset {0}")]
    Misaligned(usize),

    /// The data is structurally invalid.
    #[error("corrupt data: {0}")]
    Corrupt(&'static str),
}

/// Errors raised by query operations when the agent is misused.
///
/// "Not found" is never an error: it is reported as `Ok(false)` or
/// [`INVALID_KEY_ID`](crate::INVALID_KEY_ID).
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// A string query operation was called before `Agent::set_query`.
    #[error("agent has no query string; call set_query first")]
    QueryNotSet,

    /// `reverse_lookup` was called before `Agent::set_query_id`.
    #[error("agent has no query id; call set_query_id first")]
    QueryIdNotSet,

    /// `reverse_lookup` was given an ID outside `[0, num_keys)`.
    #[error("key id {id} out of range (num_keys = {num_keys})")]
    KeyIdOutOfRange {
        /// Requested ID.
        id: KeyId,
        /// Number of keys in the trie.
        num_keys: usize,
    },
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum Error {
    /// Building failed.
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Loading or mapping failed.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// A query was misused.
    #[error("query error: {0}")]
    Query(#[from] QueryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(BuildError::EmptyKeyset.to_string(), "key set is empty");
        assert_eq!(
            FormatError::UnsupportedVersion(9).to_string(),
            "unsupported format version 9"
        );
        assert_eq!(
            QueryError::KeyIdOutOfRange { id: 7, num_keys: 3 }.to_string(),
            "key id 7 out of range (num_keys = 3)"
        );
    }

    #[test]
    fn umbrella_from() {
        let e: Error = FormatError::InvalidMagic.into();
        assert_eq!(e, Error::Format(FormatError::InvalidMagic));
        assert_eq!(e.to_string(), "format error: invalid magic number");
    }
}
