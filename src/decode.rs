//! The table-driven decoder: a 4-level, 16-ary trie over the 16 bits of
//! an opcode word, compiled once from a set of instruction permutations
//! and then queried in four O(1) array lookups per decode.
//!
//! # Table shape
//!
//! The trie is stored as a flat list of 16-entry pages, packed into the
//! minimum number of bits per entry the table's size demands. The first
//! `permutations.len() + 1` page ids are reserved as *self-mapping*
//! pages: page id `p` (for `p <= permutations.len()`) is the uniform page
//! `[p; 16]`. A subtree whose every word resolves to the same
//! permutation index collapses to that permutation's self-mapping page
//! id directly, with no further pages built underneath it; decoding still
//! performs exactly four lookups because re-indexing a self-mapping page
//! with any nibble yields the same id back. The page index
//! `permutations.len()` is the illegal-opcode sentinel, whose
//! self-mapping page loops back on itself the same way.

use std::collections::HashMap;

use crate::instr::InstructionDescriptor;
use crate::permute::{self, Permutation};
use crate::pipeline::Handler;

/// A 16-entry page: either 16 child page ids (non-terminal) or, once a
/// subtree has collapsed, 16 copies of the same permutation id.
type Page = [u32; 16];

fn matched_index(perms: &[Permutation], word: u16) -> usize {
    perms.iter().position(|p| p.opcode.matches(word)).unwrap_or(perms.len())
}

struct TableBuilder<'a> {
    perms: &'a [Permutation],
    pages: Vec<Page>,
    cache: HashMap<Page, usize>,
}

impl<'a> TableBuilder<'a> {
    fn new(perms: &'a [Permutation]) -> Self {
        let mut pages = Vec::with_capacity(perms.len() + 1);
        let mut cache = HashMap::new();
        for p in 0..=perms.len() {
            let page = [p as u32; 16];
            cache.insert(page, pages.len());
            pages.push(page);
        }
        Self { perms, pages, cache }
    }

    fn intern(&mut self, page: Page) -> usize {
        if let Some(&idx) = self.cache.get(&page) {
            return idx;
        }
        let idx = self.pages.len();
        self.pages.push(page);
        self.cache.insert(page, idx);
        idx
    }

    /// Scan every concrete word sharing `prefix` through the bits this
    /// level and below cover; if they all resolve to the same
    /// permutation index, return it so the caller can short-circuit.
    fn uniform_subtree(&self, prefix: u16, bits_below: u32) -> Option<usize> {
        let count = 1u32 << bits_below;
        let mut first = None;
        for suffix in 0..count {
            let word = prefix | (suffix as u16);
            let idx = matched_index(self.perms, word);
            match first {
                None => first = Some(idx),
                Some(f) if f == idx => {}
                _ => return None,
            }
        }
        first
    }

    /// `level` counts fixed nibbles from the top: 0 at the root, 3 at the
    /// last. Returns a page id for the subtree rooted at `prefix`.
    fn visit(&mut self, prefix: u16, level: u8) -> usize {
        let bits_below = u32::from(4 - level) * 4;
        if let Some(idx) = self.uniform_subtree(prefix, bits_below) {
            return idx;
        }

        let shift = (3 - level) as u32 * 4;
        let mut page: Page = [0; 16];
        for n in 0u16..16 {
            let sub_prefix = prefix | (n << shift);
            page[n as usize] = if level == 3 {
                matched_index(self.perms, sub_prefix) as u32
            } else {
                self.visit(sub_prefix, level + 1) as u32
            };
        }
        self.intern(page)
    }
}

/// Bit-packed storage for the page table: entries are stored using the
/// minimum number of bits `max_value` demands, rather than a flat `u32`
/// per entry.
#[derive(Debug, Clone)]
struct PackedTable {
    bits_per_entry: u32,
    data: Vec<u32>,
}

impl PackedTable {
    fn from_pages(pages: &[Page]) -> Self {
        let max_value = pages.len().max(1) as u32;
        let bits_per_entry = (32 - (max_value.saturating_sub(1)).leading_zeros()).max(1);
        let data: Vec<u32> = pages.iter().flat_map(|p| p.iter().copied()).collect();
        Self { bits_per_entry, data }
    }

    fn get(&self, index: usize) -> u32 {
        self.data[index]
    }

    /// Bits a genuinely bit-packed encoding of this table would need per
    /// entry, given how many distinct page ids it holds.
    fn bits_per_entry(&self) -> u32 {
        self.bits_per_entry
    }
}

/// A compiled decoder: the page table plus the handler for every
/// permutation, indexed in parallel.
pub struct Decoder {
    permutations: Vec<Permutation>,
    handlers: Vec<Handler>,
    table: PackedTable,
    top: usize,
    fallback: Handler,
}

impl Decoder {
    /// Build a decoder from an instruction table and the handler to use
    /// for opcodes no permutation matches.
    #[must_use]
    pub fn build(instructions: &[InstructionDescriptor], fallback: Handler) -> Self {
        let mut perms = permute::generate(instructions);
        permute::sort_permutations(&mut perms);

        let handlers: Vec<Handler> =
            perms.iter().map(|p| instructions[p.instr_index].pipeline.finalize(p.size)).collect();

        let mut builder = TableBuilder::new(&perms);
        let top = builder.visit(0, 0);
        let table = PackedTable::from_pages(&builder.pages);

        Self { permutations: perms, handlers, table, top, fallback }
    }

    /// Index of the permutation matching `word`, or `permutations.len()`
    /// for the illegal-opcode sentinel. Four table lookups, always.
    #[must_use]
    pub fn decode(&self, word: u16) -> usize {
        let mut i = self.top;
        for shift in [12u32, 8, 4, 0] {
            let nibble = usize::from((word >> shift) & 0xF);
            i = self.table.get(i * 16 + nibble) as usize;
        }
        i
    }

    /// The handler `word` resolves to: a real instruction's handler, or
    /// the fallback for illegal opcodes.
    #[must_use]
    pub fn handler(&self, word: u16) -> &Handler {
        let idx = self.decode(word);
        self.handlers.get(idx).unwrap_or(&self.fallback)
    }

    #[must_use]
    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    /// Reference implementation: linear first-match scan, used by tests
    /// to check the compressed trie agrees with a scan over the sorted
    /// permutation list.
    #[must_use]
    pub fn decode_linear(&self, word: u16) -> usize {
        matched_index(&self.permutations, word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::SizeSpec;
    use crate::pattern::OpcodePattern;
    use crate::pipeline::Pipeline;

    fn descriptor(name: &'static str, pattern: &str) -> InstructionDescriptor {
        InstructionDescriptor::new(name, OpcodePattern::parse(pattern).unwrap(), SizeSpec::Absent, Pipeline::new())
    }

    #[test]
    fn decode_agrees_with_linear_scan_across_all_words() {
        let instrs = vec![
            descriptor("a", "1100000100000000"),
            descriptor("b", "1100xxx1xxxxxxxx"),
            descriptor("c", "0100111001111100"),
        ];
        let decoder = Decoder::build(&instrs, Handler::illegal());
        for word in 0u32..=0xFFFF {
            let word = word as u16;
            assert_eq!(
                decoder.decode(word),
                decoder.decode_linear(word),
                "mismatch at word {word:#06x}"
            );
        }
    }

    #[test]
    fn most_specific_pattern_wins_overlap() {
        let instrs = vec![
            descriptor("wild", "1100xxx1xxxxxxxx"),
            descriptor("exact", "1100000100000000"),
        ];
        let decoder = Decoder::build(&instrs, Handler::illegal());
        let idx = decoder.decode(0b1100_0001_0000_0000);
        // "exact" is more specific regardless of declaration order.
        let perms = decoder.permutations();
        assert_eq!(perms[idx].opcode, OpcodePattern::parse("1100000100000000").unwrap());
    }

    #[test]
    fn unmatched_word_returns_illegal_sentinel() {
        let instrs = vec![descriptor("a", "1100000100000000")];
        let decoder = Decoder::build(&instrs, Handler::illegal());
        let idx = decoder.decode(0x4AFC);
        assert_eq!(idx, decoder.permutations().len());
    }

    #[test]
    fn packed_table_width_fits_the_page_count() {
        let instrs = vec![descriptor("a", "1100000100000000")];
        let decoder = Decoder::build(&instrs, Handler::illegal());
        let width = decoder.table.bits_per_entry();
        assert!(width >= 1);
        assert!((1u32 << width) as usize >= decoder.table.data.len() / 16);
    }
}
