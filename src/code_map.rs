use std::borrow::Cow;

/// Number of distinct byte labels.
pub(crate) const NUM_LABELS: usize = 256;

/// Maps bytes to dense, frequency-ordered codes.
///
/// Code 0 means "unmapped": no edge of the layer starts with that byte.
/// Higher-frequency labels receive smaller codes so that children of busy
/// nodes cluster in the double array.
#[derive(Clone, Debug)]
pub(crate) struct CodeMapper<'a> {
    /// byte → code. Always `NUM_LABELS` entries.
    table: Cow<'a, [u32]>,
    /// code → byte. Index 0 is unused.
    reverse_table: Cow<'a, [u32]>,
}

impl<'a> CodeMapper<'a> {
    /// Builds a CodeMapper from per-byte frequencies.
    ///
    /// Bytes with zero frequency stay unmapped. Codes are assigned in
    /// descending frequency order, ties broken by byte value.
    pub(crate) fn from_frequencies(freq: &[u64; NUM_LABELS]) -> CodeMapper<'static> {
        let mut labels: Vec<(u32, u64)> = freq
            .iter()
            .enumerate()
            .filter(|(_, &f)| f > 0)
            .map(|(i, &f)| (i as u32, f))
            .collect();

        // Sort by frequency descending, then by label ascending for stability
        labels.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut table = vec![0u32; NUM_LABELS];
        let mut reverse_table = vec![0u32; labels.len() + 1];

        for (i, &(label, _)) in labels.iter().enumerate() {
            let code = (i as u32) + 1;
            table[label as usize] = code;
            reverse_table[code as usize] = label;
        }

        CodeMapper {
            table: Cow::Owned(table),
            reverse_table: Cow::Owned(reverse_table),
        }
    }

    /// Reassembles a CodeMapper from serialized tables, validating that the
    /// two tables are inverse to each other.
    pub(crate) fn from_parts(table: Cow<'a, [u32]>, reverse_table: Cow<'a, [u32]>) -> Option<Self> {
        if table.len() != NUM_LABELS
            || reverse_table.is_empty()
            || reverse_table.len() > NUM_LABELS + 1
        {
            return None;
        }
        for (label, &code) in table.iter().enumerate() {
            if code as usize >= reverse_table.len() {
                return None;
            }
            if code != 0 && reverse_table[code as usize] as usize != label {
                return None;
            }
        }
        for &label in reverse_table.iter().skip(1) {
            if label as usize >= NUM_LABELS {
                return None;
            }
        }
        let mapped = table.iter().filter(|&&code| code != 0).count();
        if mapped + 1 != reverse_table.len() {
            return None;
        }
        Some(Self {
            table,
            reverse_table,
        })
    }

    /// Returns the code for a byte. Returns 0 if the byte is unmapped.
    #[inline]
    pub(crate) fn get(&self, label: u8) -> u32 {
        self.table[label as usize]
    }

    /// Returns the byte for a non-zero code.
    #[inline]
    pub(crate) fn reverse(&self, code: u32) -> u8 {
        debug_assert!(
            code != 0 && (code as usize) < self.reverse_table.len(),
            "code {code} out of bounds (alphabet_size {})",
            self.alphabet_size()
        );
        self.reverse_table[code as usize] as u8
    }

    /// The number of distinct codes including the unmapped code 0.
    #[inline]
    pub(crate) fn alphabet_size(&self) -> u32 {
        self.reverse_table.len() as u32
    }

    pub(crate) fn table(&self) -> &[u32] {
        &self.table
    }

    pub(crate) fn reverse_table(&self) -> &[u32] {
        &self.reverse_table
    }

    pub(crate) fn into_owned(self) -> CodeMapper<'static> {
        CodeMapper {
            table: Cow::Owned(self.table.into_owned()),
            reverse_table: Cow::Owned(self.reverse_table.into_owned()),
        }
    }
}
