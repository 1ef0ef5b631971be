//! A small demonstration instruction table (ABCD/SBCD in both their
//! register and predecrement-memory forms) used across the integration
//! tests. A full 68000 instruction set is out of scope for this crate;
//! this table exists only to exercise the decoder and microcode pipeline
//! end to end against a real, documented pair of instructions.

use motorola_68000::addressing::AddrModeEncoding;
use motorola_68000::context::Side;
use motorola_68000::instr::{InstructionDescriptor, SizeSpec};
use motorola_68000::pattern::OpcodePattern;
use motorola_68000::pipeline::{BcdOp, Pipeline, RegClass};
use motorola_68000::size::Size;
use motorola_68000::{Decoder, Handler};

fn pattern(s: &str) -> OpcodePattern {
    OpcodePattern::parse(s).unwrap()
}

/// Build a decoder over ABCD and SBCD's register-direct and
/// predecrement-memory forms.
pub fn build_decoder() -> Decoder {
    let enc_src = AddrModeEncoding::reg_mem(3, 0);
    let enc_dst = AddrModeEncoding::reg_mem(3, 9);

    let reg_form = |op: BcdOp| {
        Pipeline::new()
            .ldreg(Side::Src, RegClass::Data, 0)
            .ldreg(Side::Dst, RegClass::Data, 9)
            .bcd(op)
            .streg(Side::Dst, RegClass::Data, 9)
            .fetch()
    };
    let mem_form = |op: BcdOp| {
        Pipeline::new()
            .ea(Side::Src, true, true, motorola_68000::pipeline::EaOp::Load, enc_src)
            .ea(Side::Dst, true, true, motorola_68000::pipeline::EaOp::Load, enc_dst)
            .bcd(op)
            .ea(Side::Dst, false, false, motorola_68000::pipeline::EaOp::Store, enc_dst)
    };

    let instructions = vec![
        InstructionDescriptor::new(
            "abcd_reg",
            pattern("1100xxx100000xxx"),
            SizeSpec::Fixed(Size::Byte),
            reg_form(BcdOp::Add),
        ),
        InstructionDescriptor::new(
            "abcd_mem",
            pattern("1100xxx100001xxx"),
            SizeSpec::Fixed(Size::Byte),
            mem_form(BcdOp::Add),
        ),
        InstructionDescriptor::new(
            "sbcd_reg",
            pattern("1000xxx100000xxx"),
            SizeSpec::Fixed(Size::Byte),
            reg_form(BcdOp::Sub),
        ),
        InstructionDescriptor::new(
            "sbcd_mem",
            pattern("1000xxx100001xxx"),
            SizeSpec::Fixed(Size::Byte),
            mem_form(BcdOp::Sub),
        ),
    ];

    Decoder::build(&instructions, Handler::illegal())
}

/// Encode an ABCD/SBCD-shaped opcode: `rx`/`ry` are 3-bit register
/// numbers, `mem` selects the predecrement-memory form.
pub fn bcd_opcode(base: u16, rx: u8, mem: bool, ry: u8) -> u16 {
    let mem_bit: u16 = if mem { 1 } else { 0 };
    base | (u16::from(rx) << 9) | (mem_bit << 3) | u16::from(ry)
}

pub const ABCD_BASE: u16 = 0b1100_000_1_0000_0000;
pub const SBCD_BASE: u16 = 0b1000_000_1_0000_0000;
