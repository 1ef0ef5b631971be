//! Expands instruction descriptors with a dynamic size field into the
//! concrete, size-refined permutations the decoder is actually built
//! from.

use crate::instr::{InstructionDescriptor, SizeSpec};
use crate::pattern::OpcodePattern;
use crate::size::Size;

/// One concrete, fully size-refined opcode pattern, tracing back to the
/// instruction descriptor it was generated from.
#[derive(Debug, Clone, Copy)]
pub struct Permutation {
    pub opcode: OpcodePattern,
    pub size: Option<Size>,
    pub instr_index: usize,
}

/// Expand every descriptor into its concrete permutations. An
/// [`SizeSpec::Absent`] or [`SizeSpec::Fixed`] descriptor yields exactly
/// one permutation; a [`SizeSpec::Dynamic`] descriptor yields one
/// permutation per size its field encodes (1-3 in practice).
#[must_use]
pub fn generate(instructions: &[InstructionDescriptor]) -> Vec<Permutation> {
    let mut out = Vec::new();
    for (instr_index, instr) in instructions.iter().enumerate() {
        match &instr.size {
            SizeSpec::Absent => {
                out.push(Permutation { opcode: instr.opcode, size: None, instr_index });
            }
            SizeSpec::Fixed(size) => {
                out.push(Permutation { opcode: instr.opcode, size: Some(*size), instr_index });
            }
            SizeSpec::Dynamic(enc) => {
                for (code, size) in enc.entries() {
                    let opcode = instr.opcode.refine_field(enc.pos, enc.width, code);
                    out.push(Permutation { opcode, size: Some(size), instr_index });
                }
            }
        }
    }
    out
}

/// Sort permutations by ascending `popcount(any)` — fewest wildcard bits
/// (most specific) first — so that first-match-wins resolves overlapping
/// patterns to the intended handler.
pub fn sort_permutations(perms: &mut [Permutation]) {
    perms.sort_by_key(|p| p.opcode.specificity());
}
