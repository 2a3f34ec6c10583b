use std::borrow::Cow;

/// A static bit vector with constant-time rank.
///
/// `ranks[w]` holds the number of set bits in words `0..w`, so
/// `rank1(i) = ranks[i / 32] + popcount(words[i / 32] & low_mask(i % 32))`.
/// Both tables are plain `u32` slices so they can be mapped straight from a
/// serialized buffer.
#[derive(Clone, Debug, Default)]
pub(crate) struct BitVector<'a> {
    len: u32,
    words: Cow<'a, [u32]>,
    ranks: Cow<'a, [u32]>,
}

impl<'a> BitVector<'a> {
    /// Builds a bit vector of `len` bits where bit `i` is `f(i)`.
    pub(crate) fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> BitVector<'static> {
        let mut words = vec![0u32; len.div_ceil(32)];
        for i in 0..len {
            if f(i) {
                words[i / 32] |= 1 << (i % 32);
            }
        }
        let mut ranks = Vec::with_capacity(words.len());
        let mut acc = 0u32;
        for &w in &words {
            ranks.push(acc);
            acc += w.count_ones();
        }
        BitVector {
            len: len as u32,
            words: Cow::Owned(words),
            ranks: Cow::Owned(ranks),
        }
    }

    /// Reassembles a bit vector from its serialized tables.
    ///
    /// Rejects tables whose ranks do not add up or that set bits past `len`.
    pub(crate) fn from_parts(len: u32, words: Cow<'a, [u32]>, ranks: Cow<'a, [u32]>) -> Option<Self> {
        let num_words = (len as usize).div_ceil(32);
        if words.len() != num_words || ranks.len() != num_words {
            return None;
        }
        let mut acc = 0u32;
        for (&w, &r) in words.iter().zip(ranks.iter()) {
            if r != acc {
                return None;
            }
            acc = acc.checked_add(w.count_ones())?;
        }
        let tail_bits = len % 32;
        if tail_bits != 0 && words.last().is_some_and(|&w| w >> tail_bits != 0) {
            return None;
        }
        Some(Self { len, words, ranks })
    }

    /// Number of bits.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns bit `i`. Out-of-range bits read as unset.
    #[inline]
    pub(crate) fn get(&self, i: usize) -> bool {
        match self.words.get(i / 32) {
            Some(w) => w & (1 << (i % 32)) != 0,
            None => false,
        }
    }

    /// Number of set bits in `[0, i)`.
    #[inline]
    pub(crate) fn rank1(&self, i: usize) -> usize {
        let word = i / 32;
        let bit = i % 32;
        if word >= self.words.len() {
            return self.count_ones();
        }
        let mask = (1u32 << bit).wrapping_sub(1);
        self.ranks[word] as usize + (self.words[word] & mask).count_ones() as usize
    }

    /// Total number of set bits.
    pub(crate) fn count_ones(&self) -> usize {
        match (self.ranks.last(), self.words.last()) {
            (Some(&r), Some(&w)) => r as usize + w.count_ones() as usize,
            _ => 0,
        }
    }

    pub(crate) fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn ranks(&self) -> &[u32] {
        &self.ranks
    }

    pub(crate) fn into_owned(self) -> BitVector<'static> {
        BitVector {
            len: self.len,
            words: Cow::Owned(self.words.into_owned()),
            ranks: Cow::Owned(self.ranks.into_owned()),
        }
    }
}
