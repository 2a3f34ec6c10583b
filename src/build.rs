use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, trace};

use crate::bit_vec::BitVector;
use crate::code_map::{CodeMapper, NUM_LABELS};
use crate::layer::{Layer, ROOT};
use crate::node::{Node, MAX_CELLS};
use crate::serial;
use crate::tail::Tail;
use crate::{BuildConfig, BuildError, KeyId, Keyset, NodeOrder, Trie, INVALID_KEY_ID};

/// How many free cells are tried before a base is searched past the end.
const MAX_FREE_TRIES: usize = 512;

/// A node of the logical (pointer-free) trie, before placement.
struct Draft {
    label: u8,
    /// Edge remainder as `(entry, start, end)`: bytes after the first label.
    link: Option<(usize, usize, usize)>,
    /// Entry index if a key ends here.
    terminal: Option<usize>,
    weight: f64,
    children: Vec<usize>,
}

/// Output of building one layer.
struct LayerOutput {
    layer: Layer<'static>,
    /// Edge remainders in link-rank order, in reading order for this layer.
    links: Vec<Vec<u8>>,
    /// Subtree weight behind each remainder.
    link_weights: Vec<f32>,
    /// Key ID of each input entry.
    entry_ids: Vec<KeyId>,
}

impl Trie<'static> {
    /// Builds a trie from `keyset` with the given configuration.
    ///
    /// Keys are sorted and de-duplicated internally; duplicate keys share one
    /// ID and their weights are summed.
    ///
    /// # Errors
    ///
    /// See [`BuildError`]. No partial trie is produced on failure.
    pub fn build(keyset: &Keyset, config: &BuildConfig) -> Result<Self, BuildError> {
        config.validate()?;
        if let Some((_, weight)) = keyset.iter().find(|&(_, w)| !w.is_finite() || w < 0.0) {
            return Err(BuildError::InvalidWeight(weight));
        }
        let entries = keyset.to_sorted_unique();
        if entries.is_empty() {
            return Err(BuildError::EmptyKeyset);
        }
        if entries.len() >= INVALID_KEY_ID as usize {
            return Err(BuildError::TooManyKeys(entries.len()));
        }
        for &(key, _) in &entries {
            if key.len() > config.get_max_key_length() {
                return Err(BuildError::KeyTooLong {
                    len: key.len(),
                    max: config.get_max_key_length(),
                });
            }
        }

        let order = config.get_node_order();
        let mode = config.get_tail_mode();
        let mut layers: Vec<Layer<'static>> = Vec::new();
        let mut out = build_layer(&entries, false, order)?;
        let mut flat = Tail::build(&out.links, mode)?;
        trace_layer(0, &out.layer);

        let tail = loop {
            let depth = layers.len();
            let next = if out.links.is_empty() || depth + 1 == config.get_num_tries() {
                None
            } else {
                let (next, values) = cascade(&out, order)?;
                let next_flat = Tail::build(&next.links, mode)?;
                // A further layer must beat the tail it replaces, counting the
                // tail of its own remainders.
                let cascaded =
                    serial::layer_io_size(&next.layer) + serial::tail_io_size(&next_flat.0);
                let flat_size = serial::tail_io_size(&flat.0);
                if cascaded < flat_size {
                    Some((next, values, next_flat))
                } else {
                    trace!(layer = depth + 1, cascaded, flat_size, "stopped cascading");
                    None
                }
            };

            let Some((next, values, next_flat)) = next else {
                out.layer.link_values = Cow::Owned(flat.1);
                layers.push(out.layer);
                break flat.0;
            };
            trace_layer(depth + 1, &next.layer);
            out.layer.link_values = Cow::Owned(values);
            layers.push(out.layer);
            out = next;
            flat = next_flat;
        };

        let trie = Trie::from_layers(layers, tail, order);
        debug!(
            num_keys = trie.num_keys(),
            num_tries = trie.num_tries(),
            num_nodes = trie.num_nodes(),
            io_size = trie.io_size(),
            "built trie"
        );
        Ok(trie)
    }

    /// Builds a trie from plain keys using [`BuildConfig::default`].
    ///
    /// ```
    /// use cascade_trie::Trie;
    ///
    /// let trie = Trie::from_keys(["cake", "cookie", "ice", "ice-cream"]).unwrap();
    /// assert_eq!(trie.num_keys(), 4);
    /// ```
    pub fn from_keys<K: AsRef<[u8]>>(keys: impl IntoIterator<Item = K>) -> Result<Self, BuildError> {
        let keyset: Keyset = keys.into_iter().collect();
        Self::build(&keyset, &BuildConfig::default())
    }
}

fn trace_layer(index: usize, layer: &Layer<'_>) {
    trace!(
        layer = index,
        keys = layer.num_keys(),
        nodes = layer.num_nodes(),
        cells = layer.num_cells(),
        links = layer.links.count_ones(),
        "built trie layer"
    );
}

/// Builds the layer holding the edge remainders of `out`, and the link value
/// (key ID in that layer) of each of `out`'s links.
///
/// The next layer stores each remainder reversed, so walking it from a
/// terminal toward the root yields the remainder in order.
fn cascade(out: &LayerOutput, order: NodeOrder) -> Result<(LayerOutput, Vec<u32>), BuildError> {
    let reversed: Vec<Vec<u8>> = out
        .links
        .iter()
        .map(|s| s.iter().rev().copied().collect())
        .collect();
    let mut by_key: Vec<usize> = (0..reversed.len()).collect();
    by_key.sort_by(|&a, &b| reversed[a].cmp(&reversed[b]));
    let mut next_entries: Vec<(&[u8], f32)> = Vec::new();
    let mut slot = vec![0usize; reversed.len()];
    for &i in &by_key {
        let weight = out.link_weights[i];
        match next_entries.last_mut() {
            Some(last) if last.0 == reversed[i].as_slice() => {
                last.1 = (last.1 + weight).min(f32::MAX);
            }
            _ => next_entries.push((reversed[i].as_slice(), weight)),
        }
        slot[i] = next_entries.len() - 1;
    }
    let next = build_layer(&next_entries, true, order)?;
    let values = slot.iter().map(|&s| next.entry_ids[s]).collect();
    Ok((next, values))
}

/// Builds one layer from sorted, unique entries.
///
/// An `inner` layer (past the first) is only read from a terminal toward the
/// root. Its edge remainders are handed out reversed so they come out back to
/// front, and it gets no sibling, key ID or terminal-flag tables.
fn build_layer(
    entries: &[(&[u8], f32)],
    inner: bool,
    order: NodeOrder,
) -> Result<LayerOutput, BuildError> {
    let drafts = partition(entries, order);

    // Key IDs: depth-first pre-order over the ordered children.
    let mut entry_ids = vec![INVALID_KEY_ID; entries.len()];
    let mut next_id: KeyId = 0;
    let mut stack = vec![0usize];
    while let Some(d) = stack.pop() {
        if let Some(e) = drafts[d].terminal {
            entry_ids[e] = next_id;
            next_id += 1;
        }
        stack.extend(drafts[d].children.iter().rev());
    }

    let mut freq = [0u64; NUM_LABELS];
    for d in &drafts[1..] {
        freq[d.label as usize] += 1;
    }
    let code_map = CodeMapper::from_frequencies(&freq);

    let cells = place(&drafts, &code_map)?;
    let num_cells = cells.nodes.len();

    let sibling_cells = if inner { 0 } else { num_cells };
    let mut first_child = vec![0u32; sibling_cells];
    let mut next_sibling = vec![0u32; sibling_cells];
    if !inner {
        for (d, draft) in drafts.iter().enumerate() {
            if let Some(&c) = draft.children.first() {
                first_child[cells.cell_of[d] as usize] = cells.cell_of[c];
            }
            for pair in draft.children.windows(2) {
                next_sibling[cells.cell_of[pair[0]] as usize] = cells.cell_of[pair[1]];
            }
        }
    }

    let mut nodes = cells.nodes;
    let mut terminal_flags = vec![false; num_cells];
    let mut link_flags = vec![false; num_cells];
    for (d, draft) in drafts.iter().enumerate() {
        let cell = cells.cell_of[d] as usize;
        if draft.terminal.is_some() {
            nodes[cell].set_terminal();
            terminal_flags[cell] = true;
        }
        if draft.link.is_some() {
            nodes[cell].set_link();
            link_flags[cell] = true;
        }
    }

    // Side tables are indexed by rank, i.e. in cell order.
    let mut key_ids = Vec::with_capacity(if inner { 0 } else { entries.len() });
    let mut terminal_nodes = vec![0u32; entries.len()];
    let mut links = Vec::new();
    let mut link_weights = Vec::new();
    let mut draft_of = vec![usize::MAX; num_cells];
    for (d, &cell) in cells.cell_of.iter().enumerate() {
        draft_of[cell as usize] = d;
    }
    for (cell, &d) in draft_of.iter().enumerate() {
        if d == usize::MAX {
            continue;
        }
        let draft = &drafts[d];
        if let Some(e) = draft.terminal {
            let id = entry_ids[e];
            if !inner {
                key_ids.push(id);
            }
            terminal_nodes[id as usize] = cell as u32;
        }
        if let Some((e, start, end)) = draft.link {
            let bytes = &entries[e].0[start..end];
            let remainder: Vec<u8> = if inner {
                bytes.iter().rev().copied().collect()
            } else {
                bytes.to_vec()
            };
            links.push(remainder);
            link_weights.push((draft.weight as f32).min(f32::MAX));
        }
    }

    let layer = Layer {
        code_map,
        nodes: Cow::Owned(nodes),
        first_child: Cow::Owned(first_child),
        next_sibling: Cow::Owned(next_sibling),
        terminals: BitVector::from_fn(sibling_cells, |i| terminal_flags[i]),
        links: BitVector::from_fn(num_cells, |i| link_flags[i]),
        key_ids: Cow::Owned(key_ids),
        terminal_nodes: Cow::Owned(terminal_nodes),
        link_values: Cow::Owned(Vec::new()),
        num_nodes: drafts.len() as u32,
    };
    Ok(LayerOutput {
        layer,
        links,
        link_weights,
        entry_ids,
    })
}

/// Splits sorted entries into a Patricia-style trie.
///
/// A node at depth `d` owns a range of entries sharing their first `d` bytes.
/// An entry of length `d` ends at the node; the rest are grouped by their byte
/// at `d`, and each group hangs off an edge spelling the group's longest
/// common prefix from `d`. A group of one entry takes its whole suffix as
/// the edge, which removes single-child chains.
fn partition(entries: &[(&[u8], f32)], order: NodeOrder) -> Vec<Draft> {
    let mut prefix_weight = Vec::with_capacity(entries.len() + 1);
    prefix_weight.push(0f64);
    for &(_, w) in entries {
        let last = prefix_weight[prefix_weight.len() - 1];
        prefix_weight.push(last + w as f64);
    }
    let range_weight = |b: usize, e: usize| prefix_weight[e] - prefix_weight[b];

    let mut drafts = vec![Draft {
        label: 0,
        link: None,
        terminal: None,
        weight: range_weight(0, entries.len()),
        children: Vec::new(),
    }];
    let mut queue = VecDeque::new();
    queue.push_back((0usize, 0usize, entries.len(), 0usize));

    while let Some((d, mut begin, end, depth)) = queue.pop_front() {
        if begin < end && entries[begin].0.len() == depth {
            drafts[d].terminal = Some(begin);
            begin += 1;
        }

        let mut children = Vec::new();
        let mut i = begin;
        while i < end {
            let label = entries[i].0[depth];
            let mut j = i + 1;
            while j < end && entries[j].0[depth] == label {
                j += 1;
            }
            let first = entries[i].0;
            let edge_len = if j == i + 1 {
                first.len() - depth
            } else {
                let last = entries[j - 1].0;
                first[depth..]
                    .iter()
                    .zip(&last[depth..])
                    .take_while(|(a, b)| a == b)
                    .count()
            };
            let child = drafts.len();
            drafts.push(Draft {
                label,
                link: (edge_len > 1).then_some((i, depth + 1, depth + edge_len)),
                terminal: None,
                weight: range_weight(i, j),
                children: Vec::new(),
            });
            children.push(child);
            queue.push_back((child, i, j, depth + edge_len));
            i = j;
        }

        if order == NodeOrder::Weight {
            // Stable: equal weights keep label order.
            children.sort_by(|&a, &b| drafts[b].weight.total_cmp(&drafts[a].weight));
        }
        drafts[d].children = children;
    }
    drafts
}

/// Result of placing drafts into a double array.
struct Cells {
    nodes: Vec<Node>,
    cell_of: Vec<u32>,
}

/// Assigns every draft a cell so that each child sits at
/// `base(parent) ^ code(label)`.
fn place(drafts: &[Draft], code_map: &CodeMapper<'_>) -> Result<Cells, BuildError> {
    let mut placer = Placer {
        nodes: vec![Node::default()],
        free: BTreeSet::new(),
    };
    let mut cell_of = vec![0u32; drafts.len()];
    cell_of[0] = ROOT;

    let mut queue = VecDeque::from([0usize]);
    let mut codes = Vec::new();
    while let Some(d) = queue.pop_front() {
        let children = &drafts[d].children;
        if children.is_empty() {
            continue;
        }
        codes.clear();
        codes.extend(children.iter().map(|&c| code_map.get(drafts[c].label)));
        let base = placer.find_base(&codes)?;
        let parent = cell_of[d];
        placer.nodes[parent as usize].set_base(base);
        for (&c, &code) in children.iter().zip(&codes) {
            let cell = base ^ code;
            placer.occupy(cell, parent);
            cell_of[c] = cell;
            queue.push_back(c);
        }
    }
    Ok(Cells {
        nodes: placer.nodes,
        cell_of,
    })
}

struct Placer {
    nodes: Vec<Node>,
    /// Free cells below `nodes.len()`.
    free: BTreeSet<u32>,
}

impl Placer {
    fn is_free(&self, idx: u32) -> bool {
        idx != ROOT && (idx as usize >= self.nodes.len() || self.free.contains(&idx))
    }

    fn fits(&self, base: u32, codes: &[u32]) -> bool {
        codes.iter().all(|&c| self.is_free(base ^ c))
    }

    fn find_base(&self, codes: &[u32]) -> Result<u32, BuildError> {
        let first = codes[0];
        for &f in self.free.iter().take(MAX_FREE_TRIES) {
            let base = f ^ first;
            if self.fits(base, codes) {
                return Ok(base);
            }
        }
        let mut f = self.nodes.len() as u32;
        loop {
            let base = f ^ first;
            if self.fits(base, codes) {
                let top = codes.iter().map(|&c| base ^ c).max().unwrap_or(base);
                if top as usize >= MAX_CELLS || base as usize >= MAX_CELLS {
                    return Err(BuildError::TooManyNodes(MAX_CELLS));
                }
                return Ok(base);
            }
            f += 1;
        }
    }

    fn occupy(&mut self, cell: u32, parent: u32) {
        let idx = cell as usize;
        if idx >= self.nodes.len() {
            let old = self.nodes.len() as u32;
            self.nodes.resize(idx + 1, Node::default());
            self.free.extend(old..cell);
        } else {
            self.free.remove(&cell);
        }
        self.nodes[idx].set_check(parent);
    }
}
