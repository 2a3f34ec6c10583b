/// An unordered collection of keys fed to the builder.
///
/// Keys may repeat and need not be sorted. Each key carries a weight
/// (default `1.0`) used by [`NodeOrder::Weight`](crate::NodeOrder::Weight);
/// weights of duplicate keys are summed.
#[derive(Clone, Debug, Default)]
pub struct Keyset {
    keys: Vec<Vec<u8>>,
    weights: Vec<f32>,
}

impl Keyset {
    /// Creates an empty key set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key with weight `1.0`.
    pub fn push(&mut self, key: impl AsRef<[u8]>) {
        self.push_weighted(key, 1.0);
    }

    /// Appends a key with an explicit weight.
    pub fn push_weighted(&mut self, key: impl AsRef<[u8]>, weight: f32) {
        self.keys.push(key.as_ref().to_vec());
        self.weights.push(weight);
    }

    /// Number of keys pushed, duplicates included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key was pushed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the `i`-th pushed key and its weight.
    pub fn get(&self, i: usize) -> Option<(&[u8], f32)> {
        Some((self.keys.get(i)?.as_slice(), self.weights[i]))
    }

    /// Iterates over `(key, weight)` in push order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], f32)> + '_ {
        self.keys
            .iter()
            .map(Vec::as_slice)
            .zip(self.weights.iter().copied())
    }

    /// Sorts, merges duplicates and returns `(key, summed weight)` pairs.
    ///
    /// Sums saturate at `f32::MAX`.
    pub(crate) fn to_sorted_unique(&self) -> Vec<(&[u8], f32)> {
        let mut entries: Vec<(&[u8], f32)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut out: Vec<(&[u8], f32)> = Vec::with_capacity(entries.len());
        for (key, weight) in entries {
            match out.last_mut() {
                Some(last) if last.0 == key => last.1 = (last.1 + weight).min(f32::MAX),
                _ => out.push((key, weight)),
            }
        }
        out
    }
}

impl<K: AsRef<[u8]>> FromIterator<K> for Keyset {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut keyset = Keyset::new();
        keyset.extend(iter);
        keyset
    }
}

impl<K: AsRef<[u8]>> Extend<K> for Keyset {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get() {
        let mut ks = Keyset::new();
        ks.push("apple");
        ks.push_weighted(b"pear", 2.5);
        assert_eq!(ks.len(), 2);
        assert_eq!(ks.get(0), Some((&b"apple"[..], 1.0)));
        assert_eq!(ks.get(1), Some((&b"pear"[..], 2.5)));
        assert_eq!(ks.get(2), None);
    }

    #[test]
    fn sorted_unique_merges_weights() {
        let mut ks = Keyset::new();
        ks.push_weighted("b", 1.0);
        ks.push_weighted("a", 2.0);
        ks.push_weighted("b", 3.0);
        ks.push_weighted("", 0.5);
        let entries = ks.to_sorted_unique();
        assert_eq!(
            entries,
            vec![(&b""[..], 0.5), (&b"a"[..], 2.0), (&b"b"[..], 4.0)]
        );
    }

    #[test]
    fn merged_weights_saturate() {
        let mut ks = Keyset::new();
        ks.push_weighted("a", f32::MAX);
        ks.push_weighted("a", f32::MAX);
        assert_eq!(ks.to_sorted_unique(), vec![(&b"a"[..], f32::MAX)]);
    }

    #[test]
    fn from_iter_defaults_weight() {
        let ks: Keyset = ["x", "y"].into_iter().collect();
        assert!(ks.iter().all(|(_, w)| w == 1.0));
        assert!(!ks.is_empty());
    }
}
