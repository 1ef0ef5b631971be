//! The CPU proper: the register file plus the currently-loaded
//! instruction word, driven one instruction at a time by a [`Decoder`].

use crate::bus::Bus;
use crate::context::ExecutionContext;
use crate::decode::Decoder;
use crate::registers::Registers;

/// CPU state: the register file and the instruction register.
///
/// `ir` holds the opcode word the *next* `step()` call will execute. A
/// freshly constructed `Cpu` has `ir == 0`, which most instruction tables
/// will map to an illegal-opcode handler; callers that want to start
/// execution at a real reset vector should fetch the first opcode
/// themselves (via [`Cpu::prefetch`]) before calling `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    pub regs: Registers,
    pub ir: u16,
}

impl Cpu {
    #[must_use]
    pub const fn new() -> Self {
        Self { regs: Registers::new(), ir: 0 }
    }

    /// Load the word at `pc` into `ir` and advance `pc`, without running
    /// any instruction. Used to prime execution before the first
    /// `step()` call.
    pub fn prefetch(&mut self, bus: &mut Bus) {
        let mut ctx = ExecutionContext::new(bus);
        self.ir = ctx.fetch_word(&mut self.regs);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Execute the instruction currently loaded in `cpu.ir` against
    /// `bus`, returning the number of cycles it took. Most handlers end
    /// with a `fetch` step that loads the next opcode into `cpu.ir`,
    /// leaving the CPU ready for the next `step()` call.
    pub fn step(&self, cpu: &mut Cpu, bus: &mut Bus) -> u32 {
        let mut ctx = ExecutionContext::new(bus);
        let handler = self.handler(cpu.ir);
        handler.execute(cpu, &mut ctx);
        ctx.clk
    }
}
