//! Instruction descriptors: the declarative, author-facing unit the
//! decoder is built from. Each descriptor names an instruction, the
//! opcode pattern(s) it matches, how (if at all) its size is encoded in
//! the opcode, and the microcode pipeline that implements it.

use crate::pattern::OpcodePattern;
use crate::pipeline::Pipeline;
use crate::size::SizeEncoding;

/// How an instruction's operand size is determined.
#[derive(Debug, Clone, Copy)]
pub enum SizeSpec {
    /// The instruction has no operand size (e.g. a branch).
    Absent,
    /// The size is fixed at the instruction's definition.
    Fixed(crate::size::Size),
    /// The size is read out of the opcode itself at the given bit-field,
    /// producing one concrete permutation per size the field encodes.
    Dynamic(SizeEncoding),
}

/// One instruction, as the author of the instruction table writes it.
#[derive(Debug, Clone)]
pub struct InstructionDescriptor {
    pub name: &'static str,
    pub opcode: OpcodePattern,
    pub size: SizeSpec,
    pub pipeline: Pipeline,
}

impl InstructionDescriptor {
    #[must_use]
    pub fn new(name: &'static str, opcode: OpcodePattern, size: SizeSpec, pipeline: Pipeline) -> Self {
        Self { name, opcode, size, pipeline }
    }
}
