//! Per-instruction execution state: the bus handle and the two
//! effective-address slots a microcode pipeline threads state through.
//!
//! Built fresh on the stack for every instruction and dropped at the end
//! of `step()` — nothing here survives across instructions, so there is
//! no heap allocation on the hot path.

use crate::bus::Bus;
use crate::registers::Registers;
use crate::size::Size;

/// Which operand a pipeline step is operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Src,
    Dst,
}

/// One effective-address slot: the computed address (meaningful for
/// memory-resident modes) and the most recently loaded/about-to-be-stored
/// data value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EaSlot {
    pub addr: u32,
    pub data: u32,
}

/// State threaded through a single instruction's microcode steps.
pub struct ExecutionContext<'a> {
    bus: &'a mut Bus,
    pub ea: [EaSlot; 2],
    pub clk: u32,
}

impl<'a> ExecutionContext<'a> {
    #[must_use]
    pub fn new(bus: &'a mut Bus) -> Self {
        Self { bus, ea: [EaSlot::default(); 2], clk: 0 }
    }

    #[must_use]
    pub fn slot(&self, side: Side) -> &EaSlot {
        match side {
            Side::Src => &self.ea[0],
            Side::Dst => &self.ea[1],
        }
    }

    pub fn slot_mut(&mut self, side: Side) -> &mut EaSlot {
        match side {
            Side::Src => &mut self.ea[0],
            Side::Dst => &mut self.ea[1],
        }
    }

    /// Read `size` bits from the bus at `addr`, charging the standard
    /// per-access cycle cost. A long-word read is two word accesses (high
    /// word at `addr`, low word at `addr+2`), matching the 68000's 16-bit
    /// data bus, so it costs 8 cycles rather than 4. A byte read synthesizes
    /// a half-word mask from `addr`'s low bit, since a byte lives in one
    /// half or the other of the 16-bit bus.
    pub fn read(&mut self, addr: u32, size: Size) -> u32 {
        match size {
            Size::Long => {
                let hi = self.read_once(addr, Size::Word);
                let lo = self.read_once(addr.wrapping_add(2), Size::Word);
                (hi << 16) | lo
            }
            Size::Byte | Size::Word => self.read_once(addr, size),
        }
    }

    fn read_once(&mut self, addr: u32, size: Size) -> u32 {
        self.clk += 4;
        let mask = Self::lane_mask(addr, size);
        self.bus.read(addr, mask)
    }

    /// Write `size` bits of `data` to the bus at `addr`, charging the
    /// standard per-access cycle cost. A long-word write splits the same
    /// way a long-word read does.
    pub fn write(&mut self, addr: u32, size: Size, data: u32) {
        match size {
            Size::Long => {
                self.write_once(addr, Size::Word, data >> 16);
                self.write_once(addr.wrapping_add(2), Size::Word, data);
            }
            Size::Byte | Size::Word => self.write_once(addr, size, data),
        }
    }

    fn write_once(&mut self, addr: u32, size: Size, data: u32) {
        self.clk += 4;
        let mask = Self::lane_mask(addr, size);
        let content = crate::bits::mask(size.bits());
        self.bus.write(addr, mask, data & content);
    }

    /// The bus-wire mask for a byte/word access: which half of a 16-bit
    /// data-bus word this access lands on. A byte access at an odd address
    /// lands on the low half (`0x00FF`); at an even address, the high half
    /// (`0xFF00`). Word and long accesses always span the whole bus width.
    fn lane_mask(addr: u32, size: Size) -> u32 {
        match size {
            Size::Byte if addr & 1 == 1 => 0x00FF,
            Size::Byte => 0xFF00,
            Size::Word | Size::Long => crate::bits::mask(size.bits()),
        }
    }

    /// Fetch one instruction-stream word (immediate operand or extension
    /// word), advancing `pc` by exactly 2 bytes and charging the standard
    /// word-access cost.
    pub fn fetch_word(&mut self, regs: &mut Registers) -> u16 {
        let word = self.read(regs.pc, Size::Word) as u16;
        regs.pc = regs.pc.wrapping_add(2);
        word
    }

    /// Fetch an immediate operand of the given size. Byte immediates
    /// still occupy a full instruction-stream word (the 68000 never
    /// shrinks the prefetch below 16 bits), so `pc` always advances by at
    /// least 2 bytes.
    pub fn fetch_immediate(&mut self, regs: &mut Registers, size: Size) -> u32 {
        match size {
            Size::Long => {
                let hi = u32::from(self.fetch_word(regs));
                let lo = u32::from(self.fetch_word(regs));
                (hi << 16) | lo
            }
            Size::Word => u32::from(self.fetch_word(regs)),
            Size::Byte => u32::from(self.fetch_word(regs) as u8),
        }
    }
}
