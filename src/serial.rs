#[cfg(not(target_endian = "little"))]
compile_error!("cascade-trie zero-copy mapping requires a little-endian platform");

use std::borrow::Cow;
use std::mem;

use tracing::debug;

use crate::bit_vec::BitVector;
use crate::code_map::{CodeMapper, NUM_LABELS};
use crate::layer::Layer;
use crate::node::Node;
use crate::tail::Tail;
use crate::{FormatError, NodeOrder, TailMode, Trie, MAX_NUM_TRIES};

const MAGIC: &[u8; 4] = b"CSTR";
const VERSION: u8 = 1;

/// File header: magic, version, tail mode, node order, reserved byte,
/// num_keys, num_tries, num_nodes, reserved u32, io_size u64.
const HEADER_SIZE: usize = 32;
/// Layer header: num_cells, num_nodes, num_keys, num_links, alphabet_size,
/// terminal bits, link bits, reserved.
///
/// The first layer is followed by code tables, nodes, next_sibling,
/// first_child, terminals, links, key_ids, terminal_nodes and link_values.
/// Inner layers drop next_sibling, first_child, terminals and key_ids.
const LAYER_HEADER_SIZE: usize = 32;
/// Tail header: mode, byte length.
const TAIL_HEADER_SIZE: usize = 8;

/// Fixed-size little-endian records that can be viewed in place.
///
/// # Safety
///
/// Implementors must be primitive or `#[repr(C)]` without padding, valid for
/// every bit pattern, and laid out in memory exactly as `write_le` encodes
/// them on a little-endian target.
unsafe trait Plain: Copy {
    const SIZE: usize;

    /// Decodes one record from exactly `SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut Vec<u8>);
}

unsafe impl Plain for u8 {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

unsafe impl Plain for u32 {
    const SIZE: usize = 4;

    fn read_le(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

// SAFETY: `Node` is `#[repr(C)]` with two `u32` fields, size 8, align 4, no
// padding, and every bit pattern is a valid (if meaningless) cell.
unsafe impl Plain for Node {
    const SIZE: usize = 8;

    fn read_le(bytes: &[u8]) -> Self {
        Node::from_raw(u32::read_le(&bytes[..4]), u32::read_le(&bytes[4..8]))
    }

    fn write_le(self, out: &mut Vec<u8>) {
        let (base, check) = self.to_raw();
        base.write_le(out);
        check.write_le(out);
    }
}

fn write_slice<T: Plain>(items: &[T], out: &mut Vec<u8>) {
    out.reserve(items.len() * T::SIZE);
    for &item in items {
        item.write_le(out);
    }
}

fn write_bit_vector(bv: &BitVector<'_>, out: &mut Vec<u8>) {
    write_slice(bv.words(), out);
    write_slice(bv.ranks(), out);
}

/// Serialized size of a bit vector of `len` bits (words and ranks).
fn bit_vector_size(len: usize) -> usize {
    len.div_ceil(32) * 4 * 2
}

/// Serialized size of one layer. Empty tables cost nothing, so this covers
/// both the first layer and the compact inner ones.
pub(crate) fn layer_io_size(layer: &Layer<'_>) -> usize {
    LAYER_HEADER_SIZE
        + (NUM_LABELS + layer.code_map.alphabet_size() as usize) * 4
        + layer.num_cells() * Node::SIZE
        + (layer.next_sibling.len() + layer.first_child.len()) * 4
        + bit_vector_size(layer.terminals.len())
        + bit_vector_size(layer.links.len())
        + (layer.key_ids.len() + layer.terminal_nodes.len() + layer.link_values.len()) * 4
}

/// Serialized size of a tail store.
pub(crate) fn tail_io_size(tail: &Tail<'_>) -> usize {
    let flags = match tail.mode() {
        TailMode::Text => 0,
        TailMode::Binary => bit_vector_size(tail.bytes().len()),
    };
    TAIL_HEADER_SIZE + flags + tail.bytes().len().next_multiple_of(4)
}

/// Sequential reader over a serialized trie.
///
/// In mapped mode slices borrow from the buffer; otherwise they are decoded
/// into owned vectors.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    mapped: bool,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let raw = self
            .offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(self.offset..end))
            .ok_or(FormatError::Truncated {
                offset: self.offset,
                needed: len,
            })?;
        self.offset += len;
        Ok(raw)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::read_le(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64, FormatError> {
        let raw = self.take(8)?;
        Ok(u64::from(u32::read_le(&raw[..4])) | (u64::from(u32::read_le(&raw[4..])) << 32))
    }

    fn count(&mut self) -> Result<usize, FormatError> {
        Ok(self.u32()? as usize)
    }

    fn slice<T: Plain>(&mut self, count: usize) -> Result<Cow<'a, [T]>, FormatError> {
        let start = self.offset;
        let size = count.checked_mul(T::SIZE).ok_or(FormatError::Truncated {
            offset: start,
            needed: usize::MAX,
        })?;
        let raw = self.take(size)?;
        if !self.mapped {
            return Ok(Cow::Owned(raw.chunks_exact(T::SIZE).map(T::read_le).collect()));
        }
        if !(raw.as_ptr() as usize).is_multiple_of(mem::align_of::<T>()) {
            return Err(FormatError::Misaligned(start));
        }
        // SAFETY:
        // - `T: Plain` is valid for every bit pattern and has size `T::SIZE`
        // - alignment and bounds were verified above
        // - the crate only builds on little-endian targets, where the in-memory
        //   layout matches the serialized one
        // - the lifetime `'a` ties the slice to the input buffer
        let items = unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<T>(), count) };
        Ok(Cow::Borrowed(items))
    }

    fn bit_vector(&mut self, len: usize) -> Result<BitVector<'a>, FormatError> {
        let len = u32::try_from(len).map_err(|_| FormatError::Corrupt("bit vector too long"))?;
        let num_words = (len as usize).div_ceil(32);
        let words = self.slice::<u32>(num_words)?;
        let ranks = self.slice::<u32>(num_words)?;
        BitVector::from_parts(len, words, ranks).ok_or(FormatError::Corrupt("bit vector ranks"))
    }

    fn skip_padding(&mut self) -> Result<(), FormatError> {
        let pad = self.offset.next_multiple_of(4) - self.offset;
        self.take(pad).map(|_| ())
    }
}

struct Header {
    tail_mode: TailMode,
    node_order: NodeOrder,
    num_keys: usize,
    num_tries: usize,
    num_nodes: usize,
    io_size: u64,
}

fn read_header(r: &mut Reader<'_>) -> Result<Header, FormatError> {
    if r.take(4)? != MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let version = r.u8()?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let tail_mode = TailMode::from_tag(r.u8()?).ok_or(FormatError::Corrupt("tail mode"))?;
    let node_order = NodeOrder::from_tag(r.u8()?).ok_or(FormatError::Corrupt("node order"))?;
    let _reserved = r.u8()?;
    let num_keys = r.count()?;
    let num_tries = r.count()?;
    let num_nodes = r.count()?;
    let _reserved = r.u32()?;
    let io_size = r.u64()?;
    Ok(Header {
        tail_mode,
        node_order,
        num_keys,
        num_tries,
        num_nodes,
        io_size,
    })
}

fn read_layer<'a>(r: &mut Reader<'a>, first: bool) -> Result<Layer<'a>, FormatError> {
    let num_cells = r.count()?;
    let num_nodes = r.u32()?;
    let num_keys = r.count()?;
    let num_links = r.count()?;
    let alphabet_size = r.count()?;
    let terminal_bits = r.count()?;
    let link_bits = r.count()?;
    let _reserved = r.u32()?;

    let table = r.slice::<u32>(NUM_LABELS)?;
    let reverse_table = r.slice::<u32>(alphabet_size)?;
    let code_map =
        CodeMapper::from_parts(table, reverse_table).ok_or(FormatError::Corrupt("code map"))?;
    let nodes = r.slice::<Node>(num_cells)?;
    let (sibling_cells, ranked_keys) = if first { (num_cells, num_keys) } else { (0, 0) };
    let next_sibling = r.slice::<u32>(sibling_cells)?;
    let first_child = r.slice::<u32>(sibling_cells)?;
    let terminals = r.bit_vector(terminal_bits)?;
    let links = r.bit_vector(link_bits)?;
    let key_ids = r.slice::<u32>(ranked_keys)?;
    let terminal_nodes = r.slice::<u32>(num_keys)?;
    let link_values = r.slice::<u32>(num_links)?;

    Ok(Layer {
        code_map,
        nodes,
        first_child,
        next_sibling,
        terminals,
        links,
        key_ids,
        terminal_nodes,
        link_values,
        num_nodes,
    })
}

fn read_tail<'a>(r: &mut Reader<'a>) -> Result<Tail<'a>, FormatError> {
    let tag = u8::try_from(r.u32()?).map_err(|_| FormatError::Corrupt("tail mode"))?;
    let mode = TailMode::from_tag(tag).ok_or(FormatError::Corrupt("tail mode"))?;
    let len = r.count()?;
    let end_flags = match mode {
        TailMode::Text => BitVector::default(),
        TailMode::Binary => r.bit_vector(len)?,
    };
    let bytes = r.slice::<u8>(len)?;
    r.skip_padding()?;
    Tail::from_parts(mode, bytes, end_flags).ok_or(FormatError::Corrupt("tail end flags"))
}

fn parse<'a>(bytes: &'a [u8], mapped: bool) -> Result<Trie<'a>, FormatError> {
    let mut r = Reader {
        bytes,
        offset: 0,
        mapped,
    };
    let header = read_header(&mut r)?;
    if (bytes.len() as u64) < header.io_size {
        return Err(FormatError::SizeMismatch {
            expected: header.io_size,
            actual: bytes.len(),
        });
    }
    if header.num_tries == 0 || header.num_tries > MAX_NUM_TRIES {
        return Err(FormatError::Corrupt("number of tries"));
    }
    // Trailing bytes past io_size belong to the caller.
    r.bytes = &bytes[..header.io_size as usize];

    let mut layers = Vec::with_capacity(header.num_tries);
    for i in 0..header.num_tries {
        layers.push(read_layer(&mut r, i == 0)?);
    }
    let tail = read_tail(&mut r)?;
    if r.offset as u64 != header.io_size {
        return Err(FormatError::SizeMismatch {
            expected: header.io_size,
            actual: r.offset,
        });
    }
    if tail.mode() != header.tail_mode {
        return Err(FormatError::Corrupt("tail mode disagrees with header"));
    }

    for (i, layer) in layers.iter().enumerate() {
        let link_bound = match layers.get(i + 1) {
            Some(next) => next.num_keys(),
            None => tail.bytes().len(),
        };
        layer.validate(link_bound, i == 0).map_err(FormatError::Corrupt)?;
    }

    let trie = Trie::from_layers(layers, tail, header.node_order);
    if trie.num_keys() != header.num_keys || trie.num_nodes() != header.num_nodes {
        return Err(FormatError::Corrupt("header counts disagree with layers"));
    }
    debug!(num_keys = trie.num_keys(), mapped, "loaded trie");
    Ok(trie)
}

impl<'a> Trie<'a> {
    /// Serializes the trie into a new byte vector.
    pub fn save(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.io_size());
        self.write_to(&mut out);
        out
    }

    /// Appends the serialized trie to `out`.
    ///
    /// To [`map`](Trie::map) the result later, the appended bytes must start
    /// at a 4-byte aligned address.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let start = out.len();
        let io_size = self.io_size();

        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(self.tail.mode().to_tag());
        out.push(self.node_order.to_tag());
        out.push(0);
        (self.num_keys() as u32).write_le(out);
        (self.num_tries() as u32).write_le(out);
        (self.num_nodes() as u32).write_le(out);
        0u32.write_le(out);
        out.extend_from_slice(&(io_size as u64).to_le_bytes());

        for layer in &self.layers {
            let cells = layer.num_cells() as u32;
            cells.write_le(out);
            layer.num_nodes.write_le(out);
            (layer.num_keys() as u32).write_le(out);
            (layer.num_links() as u32).write_le(out);
            layer.code_map.alphabet_size().write_le(out);
            (layer.terminals.len() as u32).write_le(out);
            (layer.links.len() as u32).write_le(out);
            0u32.write_le(out);

            write_slice(layer.code_map.table(), out);
            write_slice(layer.code_map.reverse_table(), out);
            write_slice(&layer.nodes, out);
            write_slice(&layer.next_sibling, out);
            write_slice(&layer.first_child, out);
            write_bit_vector(&layer.terminals, out);
            write_bit_vector(&layer.links, out);
            write_slice(&layer.key_ids, out);
            write_slice(&layer.terminal_nodes, out);
            write_slice(&layer.link_values, out);
        }

        (self.tail.mode().to_tag() as u32).write_le(out);
        (self.tail.bytes().len() as u32).write_le(out);
        if self.tail.mode() == TailMode::Binary {
            write_bit_vector(self.tail.end_flags(), out);
        }
        out.extend_from_slice(self.tail.bytes());
        out.resize(out.len().next_multiple_of(4), 0);

        debug_assert_eq!(out.len() - start, io_size, "io_size disagrees with writer");
    }

    /// Exact size in bytes of [`save`](Trie::save)'s output.
    pub fn io_size(&self) -> usize {
        let layers: usize = self.layers.iter().map(layer_io_size).sum();
        HEADER_SIZE + layers + tail_io_size(&self.tail)
    }

    /// Maps a serialized trie without copying its tables.
    ///
    /// Node arrays, side tables and tail bytes are borrowed from `bytes` for
    /// `'a`. The buffer must be 4-byte aligned, and must not be modified
    /// through other aliases (such as a writable memory map) while the trie
    /// is alive. Bytes past the recorded size are ignored.
    ///
    /// # Errors
    ///
    /// [`FormatError::Misaligned`] for an unaligned buffer, and the same
    /// errors as [`load`](Trie::load) otherwise.
    pub fn map(bytes: &'a [u8]) -> Result<Trie<'a>, FormatError> {
        if !(bytes.as_ptr() as usize).is_multiple_of(mem::align_of::<u32>()) {
            return Err(FormatError::Misaligned(0));
        }
        parse(bytes, true)
    }
}

impl Trie<'static> {
    /// Deserializes a trie, copying every table.
    ///
    /// # Errors
    ///
    /// - [`FormatError::InvalidMagic`] / [`FormatError::UnsupportedVersion`]
    ///   if the header is not ours.
    /// - [`FormatError::Truncated`] if a section runs past the buffer.
    /// - [`FormatError::SizeMismatch`] if the buffer is shorter than the
    ///   recorded size or the sections do not fill it.
    /// - [`FormatError::Corrupt`] if any table is structurally invalid.
    pub fn load(bytes: &[u8]) -> Result<Trie<'static>, FormatError> {
        parse(bytes, false).map(Trie::into_owned)
    }
}
