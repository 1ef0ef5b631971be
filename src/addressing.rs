//! Effective-address modes and the opcode bit-field conventions used to
//! encode them.

use std::fmt;

/// One of the twelve effective-addressing modes. Register-bearing variants
/// carry the 3-bit register number extracted from the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    DataReg(u8),
    AddrReg(u8),
    Addr(u8),
    AddrInc(u8),
    AddrDec(u8),
    AddrDisp(u8),
    AddrIdx(u8),
    PcDisp,
    PcIdx,
    AbsShort,
    AbsLong,
    Imm,
}

impl fmt::Display for AddrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataReg(n) => write!(f, "D{n}"),
            Self::AddrReg(n) => write!(f, "A{n}"),
            Self::Addr(n) => write!(f, "(A{n})"),
            Self::AddrInc(n) => write!(f, "(A{n})+"),
            Self::AddrDec(n) => write!(f, "-(A{n})"),
            Self::AddrDisp(n) => write!(f, "(d16,A{n})"),
            Self::AddrIdx(n) => write!(f, "(d8,A{n},Xn)"),
            Self::PcDisp => write!(f, "(d16,PC)"),
            Self::PcIdx => write!(f, "(d8,PC,Xn)"),
            Self::AbsShort => write!(f, "xxx.W"),
            Self::AbsLong => write!(f, "xxx.L"),
            Self::Imm => write!(f, "#imm"),
        }
    }
}

/// The addressing-mode "kind" stored in an [`AddrModeEncoding`]'s dense
/// table: the variant shape without the register number, since the
/// register comes from the opcode's `n` field at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeKind {
    DataReg,
    AddrReg,
    Addr,
    AddrInc,
    AddrDec,
    AddrDisp,
    AddrIdx,
    PcDisp,
    PcIdx,
    AbsShort,
    AbsLong,
    Imm,
}

impl ModeKind {
    const fn with_reg(self, n: u8) -> AddrMode {
        match self {
            Self::DataReg => AddrMode::DataReg(n),
            Self::AddrReg => AddrMode::AddrReg(n),
            Self::Addr => AddrMode::Addr(n),
            Self::AddrInc => AddrMode::AddrInc(n),
            Self::AddrDec => AddrMode::AddrDec(n),
            Self::AddrDisp => AddrMode::AddrDisp(n),
            Self::AddrIdx => AddrMode::AddrIdx(n),
            Self::PcDisp => AddrMode::PcDisp,
            Self::PcIdx => AddrMode::PcIdx,
            Self::AbsShort => AddrMode::AbsShort,
            Self::AbsLong => AddrMode::AbsLong,
            Self::Imm => AddrMode::Imm,
        }
    }
}

/// Table depth is bounded by `m_width + n_width <= 6`: 64 entries covers
/// every (m, n) combination any real 68000 encoding uses.
const TABLE_SIZE: usize = 64;

/// A bit-field convention for decoding an addressing mode out of an
/// opcode word: the `(m, n)` field positions/widths, plus a dense lookup
/// table from `(m, n)` to mode kind.
#[derive(Debug, Clone, Copy)]
pub struct AddrModeEncoding {
    m_pos: u32,
    m_width: u32,
    n_pos: u32,
    n_width: u32,
    table: [Option<ModeKind>; TABLE_SIZE],
}

impl AddrModeEncoding {
    /// The standard 3-bit/3-bit `(mode, register)` encoding used by the
    /// great majority of instructions: `m` in `0..=6` selects the
    /// register-relative modes directly (register = `n`); `m == 7`
    /// subdivides on `n` into the register-less modes.
    #[must_use]
    pub fn standard(m_pos: u32, n_pos: u32) -> Self {
        let mut table = [None; TABLE_SIZE];
        let by_m: [Option<ModeKind>; 7] = [
            Some(ModeKind::DataReg),
            Some(ModeKind::AddrReg),
            Some(ModeKind::Addr),
            Some(ModeKind::AddrInc),
            Some(ModeKind::AddrDec),
            Some(ModeKind::AddrDisp),
            Some(ModeKind::AddrIdx),
        ];
        for (m, kind) in by_m.into_iter().enumerate() {
            for n in 0..8usize {
                table[(m << 3) | n] = kind;
            }
        }
        let by_n_at_m7: [Option<ModeKind>; 8] = [
            Some(ModeKind::AbsShort),
            Some(ModeKind::AbsLong),
            Some(ModeKind::PcDisp),
            Some(ModeKind::PcIdx),
            Some(ModeKind::Imm),
            None,
            None,
            None,
        ];
        for (n, kind) in by_n_at_m7.into_iter().enumerate() {
            table[(7 << 3) | n] = kind;
        }
        Self { m_pos, m_width: 3, n_pos, n_width: 3, table }
    }

    /// The alternate "reg/reg" encoding used by the BCD family (`ABCD`,
    /// `SBCD`): a single bit at `m_pos` selects between data-register
    /// direct (`0`) and address-register predecrement (`1`); the register
    /// number is `n` either way.
    #[must_use]
    pub fn reg_mem(m_pos: u32, n_pos: u32) -> Self {
        let mut table = [None; TABLE_SIZE];
        for n in 0..8usize {
            table[(0 << 3) | n] = Some(ModeKind::DataReg);
            table[(1 << 3) | n] = Some(ModeKind::AddrDec);
        }
        Self { m_pos, m_width: 1, n_pos, n_width: 3, table }
    }

    /// Decode the addressing mode encoded in `word`, or `None` if the
    /// `(m, n)` combination is unassigned.
    #[must_use]
    pub fn decode(&self, word: u16) -> Option<AddrMode> {
        let m = crate::bits::extract(u32::from(word), self.m_pos, self.m_width);
        let n = crate::bits::extract(u32::from(word), self.n_pos, self.n_width);
        let index = ((m << self.n_width) | n) as usize;
        self.table.get(index).copied().flatten().map(|kind| kind.with_reg(n as u8))
    }
}

/// Is this mode one the 68000 allows as a destination (i.e. not an
/// immediate, and not a PC-relative mode)?
#[must_use]
pub const fn is_data_alterable(mode: &AddrMode) -> bool {
    !matches!(mode, AddrMode::PcDisp | AddrMode::PcIdx | AddrMode::Imm)
}

/// Is this mode a memory-resident alterable destination (excludes the two
/// register-direct modes in addition to [`is_data_alterable`]'s
/// exclusions)?
#[must_use]
pub const fn is_memory_alterable(mode: &AddrMode) -> bool {
    is_data_alterable(mode) && !matches!(mode, AddrMode::DataReg(_) | AddrMode::AddrReg(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_decodes_register_direct_modes() {
        let enc = AddrModeEncoding::standard(3, 0);
        let word = (0b010u16 << 3) | 0b101;
        assert_eq!(enc.decode(word), Some(AddrMode::Addr(5)));
    }

    #[test]
    fn standard_decodes_m7_subvariants() {
        let enc = AddrModeEncoding::standard(3, 0);
        assert_eq!(enc.decode((0b111 << 3) | 0b000), Some(AddrMode::AbsShort));
        assert_eq!(enc.decode((0b111 << 3) | 0b001), Some(AddrMode::AbsLong));
        assert_eq!(enc.decode((0b111 << 3) | 0b100), Some(AddrMode::Imm));
        assert_eq!(enc.decode((0b111 << 3) | 0b111), None);
    }

    #[test]
    fn reg_mem_selects_bcd_variant() {
        let enc = AddrModeEncoding::reg_mem(3, 0);
        assert_eq!(enc.decode((0 << 3) | 2), Some(AddrMode::DataReg(2)));
        assert_eq!(enc.decode((1 << 3) | 2), Some(AddrMode::AddrDec(2)));
    }

    #[test]
    fn alterable_predicates() {
        assert!(!is_data_alterable(&AddrMode::PcDisp));
        assert!(!is_memory_alterable(&AddrMode::DataReg(0)));
        assert!(is_memory_alterable(&AddrMode::AddrDec(3)));
    }
}
