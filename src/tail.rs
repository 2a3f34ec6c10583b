use std::borrow::Cow;

use tracing::{trace, warn};

use crate::bit_vec::BitVector;
use crate::{BuildError, TailMode};

/// Suffix-merged store for the edge remainders of the last layer.
///
/// An entry is addressed by its byte offset. In text mode an entry runs up to
/// the next NUL byte; in binary mode it runs up to and including the next
/// byte whose end flag is set. Entries that are suffixes of other entries
/// share their bytes, so each distinct string is written at most once.
#[derive(Clone, Debug)]
pub(crate) struct Tail<'a> {
    mode: TailMode,
    bytes: Cow<'a, [u8]>,
    end_flags: BitVector<'a>,
}

impl Default for Tail<'_> {
    fn default() -> Self {
        Self {
            mode: TailMode::Text,
            bytes: Cow::Borrowed(&[]),
            end_flags: BitVector::default(),
        }
    }
}

impl<'a> Tail<'a> {
    /// Builds a tail from non-empty `entries`, returning the store and the
    /// offset of each entry in input order.
    pub(crate) fn build(
        entries: &[Vec<u8>],
        mode: TailMode,
    ) -> Result<(Tail<'static>, Vec<u32>), BuildError> {
        let mode = match mode {
            TailMode::Text if entries.iter().any(|e| e.contains(&0)) => {
                warn!("tail entry contains a NUL byte; falling back to binary tail");
                TailMode::Binary
            }
            mode => mode,
        };

        // Sorting by reversed bytes puts every string right before the
        // strings it is a suffix of.
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| entries[a].iter().rev().cmp(entries[b].iter().rev()));

        let mut bytes: Vec<u8> = Vec::new();
        let mut ends: Vec<usize> = Vec::new();
        let mut offsets = vec![0u32; entries.len()];
        let mut prev: Option<(usize, usize)> = None; // (entry index, offset)

        for &i in order.iter().rev() {
            let entry = &entries[i];
            debug_assert!(!entry.is_empty(), "tail entries are never empty");
            let offset = match prev {
                Some((p, p_off)) if entries[p].ends_with(entry) => {
                    p_off + entries[p].len() - entry.len()
                }
                _ => {
                    let offset = bytes.len();
                    bytes.extend_from_slice(entry);
                    match mode {
                        TailMode::Text => bytes.push(0),
                        TailMode::Binary => ends.push(bytes.len() - 1),
                    }
                    offset
                }
            };
            offsets[i] = u32::try_from(offset).map_err(|_| BuildError::TailTooLarge(offset))?;
            prev = Some((i, offset));
        }
        if u32::try_from(bytes.len()).is_err() {
            return Err(BuildError::TailTooLarge(bytes.len()));
        }

        let end_flags = match mode {
            TailMode::Text => BitVector::default(),
            TailMode::Binary => {
                let mut flags = vec![false; bytes.len()];
                for e in ends {
                    flags[e] = true;
                }
                BitVector::from_fn(bytes.len(), |i| flags[i])
            }
        };

        trace!(
            ?mode,
            bytes = bytes.len(),
            entries = entries.len(),
            "built tail store"
        );

        Ok((
            Tail {
                mode,
                bytes: Cow::Owned(bytes),
                end_flags,
            },
            offsets,
        ))
    }

    pub(crate) fn from_parts(
        mode: TailMode,
        bytes: Cow<'a, [u8]>,
        end_flags: BitVector<'a>,
    ) -> Option<Self> {
        match mode {
            TailMode::Text if end_flags.len() != 0 => return None,
            TailMode::Binary if end_flags.len() != bytes.len() => return None,
            _ => {}
        }
        Some(Self {
            mode,
            bytes,
            end_flags,
        })
    }

    pub(crate) fn mode(&self) -> TailMode {
        self.mode
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn end_flags(&self) -> &BitVector<'a> {
        &self.end_flags
    }

    /// Returns the entry starting at `offset`.
    pub(crate) fn entry(&self, offset: u32) -> &[u8] {
        let start = (offset as usize).min(self.bytes.len());
        let rest = &self.bytes[start..];
        let len = match self.mode {
            TailMode::Text => rest.iter().position(|&b| b == 0).unwrap_or(rest.len()),
            TailMode::Binary => (start..self.bytes.len())
                .find(|&i| self.end_flags.get(i))
                .map_or(rest.len(), |end| end + 1 - start),
        };
        &rest[..len]
    }

    /// Appends the entry at `offset` to `out`.
    #[inline]
    pub(crate) fn restore(&self, offset: u32, out: &mut Vec<u8>) {
        out.extend_from_slice(self.entry(offset));
    }

    /// Matches the entry at `offset` against `query[*pos..]`, advancing `pos`
    /// past it on success.
    #[inline]
    pub(crate) fn match_at(&self, offset: u32, query: &[u8], pos: &mut usize) -> bool {
        let entry = self.entry(offset);
        match query.get(*pos..*pos + entry.len()) {
            Some(part) if part == entry => {
                *pos += entry.len();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn into_owned(self) -> Tail<'static> {
        Tail {
            mode: self.mode,
            bytes: Cow::Owned(self.bytes.into_owned()),
            end_flags: self.end_flags.into_owned(),
        }
    }
}
