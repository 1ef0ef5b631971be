//! Declarative microcode: instruction descriptors build up a pipeline of
//! tagged steps via a small builder DSL, which is then finalized into a
//! fixed-size, allocation-free [`Handler`] — a plain step list plus the
//! operand width it closed over, executed by direct `match` dispatch with
//! no boxed closures and no vtables on the hot path.

use crate::addressing::{AddrMode, AddrModeEncoding};
use crate::bits;
use crate::context::{ExecutionContext, Side};
use crate::cpu::Cpu;
use crate::size::Size;

/// Which register file an `ldreg`/`streg` step reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegClass {
    Data,
    Addr,
}

/// Whether an `ea` step performs a bus transfer, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaOp {
    Load,
    Store,
    None,
}

/// Which BCD operation a `bcd` step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdOp {
    Add,
    Sub,
}

/// One step of a compiled microcode pipeline.
#[derive(Debug, Clone, Copy)]
pub enum PipelineStep {
    /// Resolve the effective address encoded by `enc` at the opcode's
    /// `(m, n)` field, optionally computing the address (with any
    /// register side effects), optionally charging the mode's cycle
    /// penalty, and optionally performing a load or store.
    Ea { side: Side, calc: bool, clk: bool, op: EaOp, enc: AddrModeEncoding },
    /// Copy a register's value (by `class`, register number from the
    /// opcode bits at `pos`) into a side's data slot.
    LdReg { side: Side, class: RegClass, pos: u32 },
    /// Write a side's data slot back into a register.
    StReg { side: Side, class: RegClass, pos: u32 },
    /// Fetch the next instruction word into `cpu.ir`, advancing `pc`.
    /// Ends most (not all) pipelines.
    Fetch,
    /// Apply a BCD add/sub across the src and dst data slots plus the
    /// extend flag, writing the result back into the dst slot and
    /// updating condition codes.
    Bcd { op: BcdOp },
    /// Charge a fixed number of extra cycles not otherwise accounted for.
    Cycles(u32),
}

/// Disassembler-facing description of what a side transfers, independent
/// of the concrete execution steps above.
#[derive(Debug, Clone, Copy)]
pub enum Transfer {
    None,
    AddrMode(AddrModeEncoding),
    DataReg(u32),
    AddrReg(u32),
}

#[derive(Debug, Clone, Copy)]
pub struct TransferInfo {
    pub src: Transfer,
    pub dst: Transfer,
}

/// Maximum steps any one instruction's pipeline may compile to. Generous
/// for anything in the 68000's instruction set; chosen so `Handler` can be
/// a fixed-size, stack-resident value with no heap allocation.
pub const MAX_STEPS: usize = 8;

/// A compiled, runnable instruction handler: a fixed step list plus the
/// operand width (if any) the instruction closed over at decoder-build
/// time.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    steps: [Option<PipelineStep>; MAX_STEPS],
    len: usize,
    width: Option<Size>,
    pub info: TransferInfo,
}

impl Handler {
    /// An empty handler: no steps, no cycles, no register or memory
    /// effects. Used as the illegal-opcode fallback, since trap/exception
    /// processing is out of scope — an illegal opcode simply does
    /// nothing rather than advancing `pc` or faulting.
    #[must_use]
    pub fn illegal() -> Self {
        Pipeline::new().finalize(None)
    }

    /// Run this handler's steps in order against `cpu` and `ctx`.
    pub fn execute(&self, cpu: &mut Cpu, ctx: &mut ExecutionContext) {
        for step in self.steps.iter().take(self.len).flatten() {
            execute_step(*step, self.width, cpu, ctx);
        }
    }
}

fn execute_step(step: PipelineStep, width: Option<Size>, cpu: &mut Cpu, ctx: &mut ExecutionContext) {
    match step {
        PipelineStep::Ea { side, calc, clk, op, enc } => {
            execute_ea(side, calc, clk, op, &enc, width.unwrap_or(Size::Word), cpu, ctx);
        }
        PipelineStep::LdReg { side, class, pos } => {
            let n = extract_reg(cpu.ir, pos);
            let w = width.unwrap_or(Size::Long);
            let value = match class {
                RegClass::Data => bits::truncate(cpu.regs.data(n), w.bits()),
                RegClass::Addr => sign_extend_addr(cpu.regs.addr(n), w),
            };
            ctx.slot_mut(side).data = value;
        }
        PipelineStep::StReg { side, class, pos } => {
            let n = extract_reg(cpu.ir, pos);
            let w = width.unwrap_or(Size::Long);
            let value = ctx.slot(side).data;
            match class {
                RegClass::Data => {
                    let merged = bits::overwrite(cpu.regs.data(n), value, w.bits());
                    cpu.regs.set_data(n, merged);
                }
                RegClass::Addr => {
                    cpu.regs.set_addr(n, sign_extend_addr(value, w));
                }
            }
        }
        PipelineStep::Fetch => {
            cpu.ir = ctx.fetch_word(&mut cpu.regs);
        }
        PipelineStep::Bcd { op } => execute_bcd(op, cpu, ctx),
        PipelineStep::Cycles(n) => ctx.clk += n,
    }
}

const fn extract_reg(ir: u16, pos: u32) -> u8 {
    bits::extract(ir as u32, pos, 3) as u8
}

fn sign_extend_addr(value: u32, width: Size) -> u32 {
    match width {
        Size::Long => value,
        _ => bits::sign_extend(value, 16),
    }
}

/// Decoded brief-format extension word: register select, size, and the
/// 8-bit base displacement.
struct ExtWord {
    is_addr: bool,
    reg: u8,
    long: bool,
    disp8: i8,
}

fn decode_extword(ext: u16) -> ExtWord {
    ExtWord {
        is_addr: ext & 0x8000 != 0,
        reg: ((ext >> 12) & 7) as u8,
        long: ext & 0x0800 != 0,
        disp8: (ext & 0xFF) as i8,
    }
}

fn index_value(cpu: &Cpu, ext: &ExtWord) -> u32 {
    let raw = if ext.is_addr { cpu.regs.addr(ext.reg) } else { cpu.regs.data(ext.reg) };
    if ext.long { raw } else { bits::sign_extend(raw & 0xFFFF, 16) }
}

#[allow(clippy::too_many_arguments)]
fn execute_ea(
    side: Side,
    calc: bool,
    clk: bool,
    op: EaOp,
    enc: &AddrModeEncoding,
    width: Size,
    cpu: &mut Cpu,
    ctx: &mut ExecutionContext,
) {
    let Some(mode) = enc.decode(cpu.ir) else { return };
    match mode {
        AddrMode::DataReg(n) => {
            if matches!(op, EaOp::Load) {
                ctx.slot_mut(side).data = bits::truncate(cpu.regs.data(n), width.bits());
            }
            if matches!(op, EaOp::Store) {
                let merged = bits::overwrite(cpu.regs.data(n), ctx.slot(side).data, width.bits());
                cpu.regs.set_data(n, merged);
            }
        }
        AddrMode::AddrReg(n) => {
            if matches!(op, EaOp::Load) {
                ctx.slot_mut(side).data = sign_extend_addr(cpu.regs.addr(n), width);
            }
            if matches!(op, EaOp::Store) {
                cpu.regs.set_addr(n, sign_extend_addr(ctx.slot(side).data, width));
            }
        }
        AddrMode::Addr(n) => {
            if calc {
                ctx.slot_mut(side).addr = cpu.regs.addr(n);
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AddrInc(n) => {
            let step = if n == 7 { width.bytes().max(2) } else { width.bytes() };
            let addr = cpu.regs.addr(n);
            if calc {
                ctx.slot_mut(side).addr = addr;
                cpu.regs.set_addr(n, addr.wrapping_add(step));
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AddrDec(n) => {
            let step = if n == 7 { width.bytes().max(2) } else { width.bytes() };
            if calc {
                let addr = cpu.regs.addr(n).wrapping_sub(step);
                cpu.regs.set_addr(n, addr);
                ctx.slot_mut(side).addr = addr;
            }
            if clk {
                ctx.clk += 2;
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AddrDisp(n) => {
            if calc {
                let disp = bits::sign_extend(u32::from(ctx.fetch_word(&mut cpu.regs)), 16);
                ctx.slot_mut(side).addr = cpu.regs.addr(n).wrapping_add(disp);
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AddrIdx(n) => {
            if calc {
                let ext = decode_extword(ctx.fetch_word(&mut cpu.regs));
                let base = cpu.regs.addr(n);
                let idx = index_value(cpu, &ext);
                let disp = i32::from(ext.disp8) as u32;
                ctx.slot_mut(side).addr = base.wrapping_add(idx).wrapping_add(disp);
            }
            if clk {
                ctx.clk += 2;
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::PcDisp => {
            if calc {
                let base = cpu.regs.pc;
                let disp = bits::sign_extend(u32::from(ctx.fetch_word(&mut cpu.regs)), 16);
                ctx.slot_mut(side).addr = base.wrapping_add(disp);
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::PcIdx => {
            if calc {
                let base = cpu.regs.pc;
                let ext = decode_extword(ctx.fetch_word(&mut cpu.regs));
                let idx = index_value(cpu, &ext);
                let disp = i32::from(ext.disp8) as u32;
                ctx.slot_mut(side).addr = base.wrapping_add(idx).wrapping_add(disp);
            }
            if clk {
                ctx.clk += 2;
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AbsShort => {
            if calc {
                let w = ctx.fetch_word(&mut cpu.regs);
                ctx.slot_mut(side).addr = bits::sign_extend(u32::from(w), 16);
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::AbsLong => {
            if calc {
                ctx.slot_mut(side).addr = ctx.fetch_immediate(&mut cpu.regs, Size::Long);
            }
            bus_transfer(op, side, width, ctx);
        }
        AddrMode::Imm => {
            if matches!(op, EaOp::Load) {
                ctx.slot_mut(side).data = ctx.fetch_immediate(&mut cpu.regs, width);
            }
        }
    }
}

fn bus_transfer(op: EaOp, side: Side, width: Size, ctx: &mut ExecutionContext) {
    match op {
        EaOp::Load => {
            let addr = ctx.slot(side).addr;
            let data = ctx.read(addr, width);
            ctx.slot_mut(side).data = data;
        }
        EaOp::Store => {
            let addr = ctx.slot(side).addr;
            let data = ctx.slot(side).data;
            ctx.write(addr, width, data);
        }
        EaOp::None => {}
    }
}

fn execute_bcd(op: BcdOp, cpu: &mut Cpu, ctx: &mut ExecutionContext) {
    let src = bits::from_bcd(ctx.slot(Side::Src).data as u8);
    let dst = bits::from_bcd(ctx.slot(Side::Dst).data as u8);
    let x = u32::from(cpu.regs.sr.extend());

    let (result, carry) = match op {
        BcdOp::Add => {
            let total = u32::from(dst) + u32::from(src) + x;
            let (bcd, overflow) = bits::to_bcd(total as u8);
            (bcd, overflow)
        }
        BcdOp::Sub => {
            let total = i32::from(dst) - i32::from(src) - x as i32;
            let borrow = total < 0;
            let normalized = if borrow { total + 100 } else { total } as u8;
            let (bcd, _) = bits::to_bcd(normalized);
            (bcd, borrow)
        }
    };

    ctx.slot_mut(Side::Dst).data = u32::from(result);
    let sr = cpu.regs.sr;
    cpu.regs.sr = sr
        .with_carry(carry)
        .with_extend(carry)
        .and_zero(result == 0)
        .with_negative(result & 0x80 != 0);
    ctx.clk += 2;
}

/// Builds a [`Handler`] via a small step-by-step DSL, mirroring the order
/// operations occur in at runtime.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    src_info: Option<Transfer>,
    dst_info: Option<Transfer>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn remember_info(&mut self, side: Side, info: Transfer) {
        match side {
            Side::Src => self.src_info = Some(info),
            Side::Dst => self.dst_info = Some(info),
        }
    }

    #[must_use]
    pub fn ea(mut self, side: Side, calc: bool, clk: bool, op: EaOp, enc: AddrModeEncoding) -> Self {
        self.remember_info(side, Transfer::AddrMode(enc));
        self.steps.push(PipelineStep::Ea { side, calc, clk, op, enc });
        self
    }

    #[must_use]
    pub fn ldreg(mut self, side: Side, class: RegClass, pos: u32) -> Self {
        let info = match class {
            RegClass::Data => Transfer::DataReg(pos),
            RegClass::Addr => Transfer::AddrReg(pos),
        };
        self.remember_info(side, info);
        self.steps.push(PipelineStep::LdReg { side, class, pos });
        self
    }

    #[must_use]
    pub fn streg(mut self, side: Side, class: RegClass, pos: u32) -> Self {
        let info = match class {
            RegClass::Data => Transfer::DataReg(pos),
            RegClass::Addr => Transfer::AddrReg(pos),
        };
        self.remember_info(side, info);
        self.steps.push(PipelineStep::StReg { side, class, pos });
        self
    }

    #[must_use]
    pub fn fetch(mut self) -> Self {
        self.steps.push(PipelineStep::Fetch);
        self
    }

    #[must_use]
    pub fn bcd(mut self, op: BcdOp) -> Self {
        self.steps.push(PipelineStep::Bcd { op });
        self
    }

    #[must_use]
    pub fn cycles(mut self, n: u32) -> Self {
        self.steps.push(PipelineStep::Cycles(n));
        self
    }

    /// Compile this pipeline into a fixed-size [`Handler`], closing over
    /// the concrete operand width a permutation was generated for (`None`
    /// for size-less instructions).
    #[must_use]
    pub fn finalize(&self, width: Option<Size>) -> Handler {
        assert!(
            self.steps.len() <= MAX_STEPS,
            "pipeline has {} steps, exceeding MAX_STEPS ({MAX_STEPS})",
            self.steps.len()
        );
        let mut steps = [None; MAX_STEPS];
        for (i, step) in self.steps.iter().enumerate() {
            steps[i] = Some(*step);
        }
        Handler {
            steps,
            len: self.steps.len(),
            width,
            info: TransferInfo {
                src: self.src_info.unwrap_or(Transfer::None),
                dst: self.dst_info.unwrap_or(Transfer::None),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Bus, BusConfig, OpenBus};
    use crate::flags::StatusRegister;

    fn fresh_ctx(bus: &mut Bus) -> ExecutionContext<'_> {
        ExecutionContext::new(bus)
    }

    #[test]
    fn abcd_register_form_adds_bcd_digits_and_charges_six_cycles() {
        let config = BusConfig::genesis_sub();
        let mut bus = Bus::init(config, vec![], Some(Box::new(OpenBus))).unwrap();
        let mut ctx = fresh_ctx(&mut bus);
        let mut cpu = Cpu::new();
        cpu.regs.sr = StatusRegister::new().with_zero(true);
        cpu.regs.set_data(0, 0x05);
        cpu.regs.set_data(1, 0x06);
        cpu.ir = 0b1100_001_1_0000_0000; // Rx=1 (dst), Ry=0 (src), M=0 (reg/reg)

        let handler = Pipeline::new()
            .ldreg(Side::Src, RegClass::Data, 0)
            .ldreg(Side::Dst, RegClass::Data, 9)
            .bcd(BcdOp::Add)
            .streg(Side::Dst, RegClass::Data, 9)
            .fetch()
            .finalize(Some(Size::Byte));

        handler.execute(&mut cpu, &mut ctx);
        assert_eq!(cpu.regs.data(1), 0x11);
        assert!(!cpu.regs.sr.zero());
        assert_eq!(ctx.clk, 6); // 2 charged by the bcd step itself + 4 for the trailing fetch
    }

    #[test]
    fn abcd_memory_form_predecrements_both_pointers() {
        let config = BusConfig::genesis_sub();
        let mut bus = Bus::init(config, vec![], Some(Box::new(OpenBus))).unwrap();
        {
            let mut ctx = fresh_ctx(&mut bus);
            let mut cpu = Cpu::new();
            cpu.regs.set_addr(0, 0x100);
            cpu.regs.set_addr(1, 0x200);
            cpu.ir = 0b1100_001_1_0000_1_000; // M=1 (predecrement), Ry=0 (src=A0), Rx=1 (dst=A1)

            let enc_src = AddrModeEncoding::reg_mem(3, 0);
            let enc_dst = AddrModeEncoding::reg_mem(3, 9);
            let handler = Pipeline::new()
                .ea(Side::Src, true, true, EaOp::Load, enc_src)
                .ea(Side::Dst, true, true, EaOp::Load, enc_dst)
                .bcd(BcdOp::Add)
                .ea(Side::Dst, false, false, EaOp::Store, enc_dst)
                .finalize(Some(Size::Byte));

            handler.execute(&mut cpu, &mut ctx);
            assert_eq!(cpu.regs.addr(0), 0x0FF);
            assert_eq!(cpu.regs.addr(1), 0x1FF);
        }
    }
}
