//! The instruction set as a tagged union.
//!
//! This is a sum type, not a vtable: decoding is one `match` producing an
//! `Opcode` carrying its already-typed operand. The *only* source of truth
//! for operand width is the opcode byte's top two bits (`operand_class`);
//! nothing here keeps a parallel per-mnemonic size table.

/// Raw opcode byte values, grouped by operand-width class; gaps within a
/// class are unassigned and decode to `VmFault::InvalidOpcode`.
pub mod op {
    // 0x00-0x3F: no operand.
    pub const NOP: u8 = 0x00;
    pub const HALT: u8 = 0x01;
    pub const BREAK: u8 = 0x02;
    pub const GET_TICKS: u8 = 0x03;
    pub const DUP: u8 = 0x04;
    pub const DROP: u8 = 0x05;
    pub const SWAP: u8 = 0x06;
    pub const OVER: u8 = 0x07;
    pub const ROT: u8 = 0x08;
    pub const LOADI8: u8 = 0x09;
    pub const LOADI16: u8 = 0x0A;
    pub const LOADI32: u8 = 0x0B;
    pub const STOREI8: u8 = 0x0C;
    pub const STOREI16: u8 = 0x0D;
    pub const STOREI32: u8 = 0x0E;
    pub const STRLEN: u8 = 0x0F;
    pub const STRCPY: u8 = 0x10;
    pub const STRCAT: u8 = 0x11;
    pub const STRCMP: u8 = 0x12;
    pub const STRCLR: u8 = 0x13;
    pub const ADD: u8 = 0x14;
    pub const SUB: u8 = 0x15;
    pub const MUL: u8 = 0x16;
    pub const DIV: u8 = 0x17;
    pub const MOD: u8 = 0x18;
    pub const NEG: u8 = 0x19;
    pub const ABS: u8 = 0x1A;
    pub const ADDF: u8 = 0x1B;
    pub const SUBF: u8 = 0x1C;
    pub const MULF: u8 = 0x1D;
    pub const DIVF: u8 = 0x1E;
    pub const NEGF: u8 = 0x1F;
    pub const ABSF: u8 = 0x20;
    pub const AND: u8 = 0x21;
    pub const OR: u8 = 0x22;
    pub const XOR: u8 = 0x23;
    pub const NOT: u8 = 0x24;
    pub const SHL: u8 = 0x25;
    pub const SHR: u8 = 0x26;
    pub const SAR: u8 = 0x27;
    pub const EQ: u8 = 0x28;
    pub const NE: u8 = 0x29;
    pub const LT: u8 = 0x2A;
    pub const LE: u8 = 0x2B;
    pub const GT: u8 = 0x2C;
    pub const GE: u8 = 0x2D;
    pub const LTU: u8 = 0x2E;
    pub const GTU: u8 = 0x2F;
    pub const I2F: u8 = 0x30;
    pub const F2I: u8 = 0x31;
    pub const I2B: u8 = 0x32;
    pub const EXT8: u8 = 0x33;
    pub const EXT16: u8 = 0x34;
    pub const ZEXT8: u8 = 0x35;
    pub const ZEXT16: u8 = 0x36;
    pub const RET: u8 = 0x37;

    // 0x40-0x7F: 8-bit operand.
    pub const PICK: u8 = 0x40;
    pub const PUSH8: u8 = 0x41;
    pub const JR: u8 = 0x42;
    pub const JRZ: u8 = 0x43;
    pub const JRNZ: u8 = 0x44;

    // 0x80-0xBF: 16-bit little-endian operand.
    pub const PUSH16: u8 = 0x80;
    pub const LOAD8: u8 = 0x81;
    pub const LOAD16: u8 = 0x82;
    pub const LOAD32: u8 = 0x83;
    pub const LOAD64: u8 = 0x84;
    pub const STORE8: u8 = 0x85;
    pub const STORE16: u8 = 0x86;
    pub const STORE32: u8 = 0x87;
    pub const STORE64: u8 = 0x88;
    pub const JMP: u8 = 0x89;
    pub const JZ: u8 = 0x8A;
    pub const JNZ: u8 = 0x8B;
    pub const CALL: u8 = 0x8C;

    // 0xC0-0xFF: 32-bit little-endian operand.
    pub const PUSH32: u8 = 0xC0;
}

/// Number of bytes the operand occupies, derived solely from the top two
/// bits of the opcode byte. The instruction length is this plus one (the
/// opcode byte itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    None,
    U8,
    U16,
    U32,
}

impl OperandClass {
    pub fn of(opcode_byte: u8) -> OperandClass {
        match opcode_byte >> 6 {
            0b00 => OperandClass::None,
            0b01 => OperandClass::U8,
            0b10 => OperandClass::U16,
            _ => OperandClass::U32,
        }
    }

    /// Bytes occupied by the operand (0, 1, 2 or 4).
    pub fn operand_len(self) -> u16 {
        match self {
            OperandClass::None => 0,
            OperandClass::U8 => 1,
            OperandClass::U16 => 2,
            OperandClass::U32 => 4,
        }
    }

    /// Total instruction length including the opcode byte (1, 2, 3 or 5).
    pub fn instruction_len(self) -> u16 {
        self.operand_len() + 1
    }
}

/// A decoded operand, already the width its class implies. Each `Opcode`
/// variant interprets the raw bits itself (sign-extend, zero-extend, or use
/// as an unsigned address/count) — the decoder never guesses the meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    U8(u8),
    U16(u16),
    U32(u32),
}

/// The full instruction set, one variant per opcode, carrying its operand
/// pre-interpreted to the type its semantics need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Nop,
    Halt,
    Break,
    GetTicks,
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Pick(u8),
    Push8(i32),
    Push16(i32),
    Push32(i32),
    Load8(u16),
    Load16(u16),
    Load32(u16),
    Load64(u16),
    Store8(u16),
    Store16(u16),
    Store32(u16),
    Store64(u16),
    LoadI8,
    LoadI16,
    LoadI32,
    StoreI8,
    StoreI16,
    StoreI32,
    StrLen,
    StrCpy,
    StrCat,
    StrCmp,
    StrClr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Abs,
    AddF,
    SubF,
    MulF,
    DivF,
    NegF,
    AbsF,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Sar,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Ltu,
    Gtu,
    I2F,
    F2I,
    I2B,
    Ext8,
    Ext16,
    Zext8,
    Zext16,
    Jmp(u16),
    Jz(u16),
    Jnz(u16),
    Call(u16),
    Ret,
    Jr(i8),
    Jrz(i8),
    Jrnz(i8),
}

impl Opcode {
    /// Builds the typed instruction from a raw opcode byte and its already
    /// width-decoded operand. Returns `None` for a byte with no assigned
    /// mnemonic in its class — the caller turns that into `InvalidOpcode`.
    pub fn from_parts(byte: u8, operand: Operand) -> Option<Opcode> {
        use op::*;
        Some(match (byte, operand) {
            (NOP, Operand::None) => Opcode::Nop,
            (HALT, Operand::None) => Opcode::Halt,
            (BREAK, Operand::None) => Opcode::Break,
            (GET_TICKS, Operand::None) => Opcode::GetTicks,
            (DUP, Operand::None) => Opcode::Dup,
            (DROP, Operand::None) => Opcode::Drop,
            (SWAP, Operand::None) => Opcode::Swap,
            (OVER, Operand::None) => Opcode::Over,
            (ROT, Operand::None) => Opcode::Rot,
            (LOADI8, Operand::None) => Opcode::LoadI8,
            (LOADI16, Operand::None) => Opcode::LoadI16,
            (LOADI32, Operand::None) => Opcode::LoadI32,
            (STOREI8, Operand::None) => Opcode::StoreI8,
            (STOREI16, Operand::None) => Opcode::StoreI16,
            (STOREI32, Operand::None) => Opcode::StoreI32,
            (STRLEN, Operand::None) => Opcode::StrLen,
            (STRCPY, Operand::None) => Opcode::StrCpy,
            (STRCAT, Operand::None) => Opcode::StrCat,
            (STRCMP, Operand::None) => Opcode::StrCmp,
            (STRCLR, Operand::None) => Opcode::StrClr,
            (ADD, Operand::None) => Opcode::Add,
            (SUB, Operand::None) => Opcode::Sub,
            (MUL, Operand::None) => Opcode::Mul,
            (DIV, Operand::None) => Opcode::Div,
            (MOD, Operand::None) => Opcode::Mod,
            (NEG, Operand::None) => Opcode::Neg,
            (ABS, Operand::None) => Opcode::Abs,
            (ADDF, Operand::None) => Opcode::AddF,
            (SUBF, Operand::None) => Opcode::SubF,
            (MULF, Operand::None) => Opcode::MulF,
            (DIVF, Operand::None) => Opcode::DivF,
            (NEGF, Operand::None) => Opcode::NegF,
            (ABSF, Operand::None) => Opcode::AbsF,
            (AND, Operand::None) => Opcode::And,
            (OR, Operand::None) => Opcode::Or,
            (XOR, Operand::None) => Opcode::Xor,
            (NOT, Operand::None) => Opcode::Not,
            (SHL, Operand::None) => Opcode::Shl,
            (SHR, Operand::None) => Opcode::Shr,
            (SAR, Operand::None) => Opcode::Sar,
            (EQ, Operand::None) => Opcode::Eq,
            (NE, Operand::None) => Opcode::Ne,
            (LT, Operand::None) => Opcode::Lt,
            (LE, Operand::None) => Opcode::Le,
            (GT, Operand::None) => Opcode::Gt,
            (GE, Operand::None) => Opcode::Ge,
            (LTU, Operand::None) => Opcode::Ltu,
            (GTU, Operand::None) => Opcode::Gtu,
            (I2F, Operand::None) => Opcode::I2F,
            (F2I, Operand::None) => Opcode::F2I,
            (I2B, Operand::None) => Opcode::I2B,
            (EXT8, Operand::None) => Opcode::Ext8,
            (EXT16, Operand::None) => Opcode::Ext16,
            (ZEXT8, Operand::None) => Opcode::Zext8,
            (ZEXT16, Operand::None) => Opcode::Zext16,
            (RET, Operand::None) => Opcode::Ret,

            (PICK, Operand::U8(n)) => Opcode::Pick(n),
            (PUSH8, Operand::U8(b)) => Opcode::Push8((b as i8) as i32),
            (JR, Operand::U8(b)) => Opcode::Jr(b as i8),
            (JRZ, Operand::U8(b)) => Opcode::Jrz(b as i8),
            (JRNZ, Operand::U8(b)) => Opcode::Jrnz(b as i8),

            (PUSH16, Operand::U16(w)) => Opcode::Push16((w as i16) as i32),
            (LOAD8, Operand::U16(a)) => Opcode::Load8(a),
            (LOAD16, Operand::U16(a)) => Opcode::Load16(a),
            (LOAD32, Operand::U16(a)) => Opcode::Load32(a),
            (LOAD64, Operand::U16(a)) => Opcode::Load64(a),
            (STORE8, Operand::U16(a)) => Opcode::Store8(a),
            (STORE16, Operand::U16(a)) => Opcode::Store16(a),
            (STORE32, Operand::U16(a)) => Opcode::Store32(a),
            (STORE64, Operand::U16(a)) => Opcode::Store64(a),
            (JMP, Operand::U16(a)) => Opcode::Jmp(a),
            (JZ, Operand::U16(a)) => Opcode::Jz(a),
            (JNZ, Operand::U16(a)) => Opcode::Jnz(a),
            (CALL, Operand::U16(a)) => Opcode::Call(a),

            (PUSH32, Operand::U32(v)) => Opcode::Push32(v as i32),

            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_boundaries_match_spec() {
        assert_eq!(OperandClass::of(0x3F), OperandClass::None);
        assert_eq!(OperandClass::of(0x40), OperandClass::U8);
        assert_eq!(OperandClass::of(0x7F), OperandClass::U8);
        assert_eq!(OperandClass::of(0x80), OperandClass::U16);
        assert_eq!(OperandClass::of(0xBF), OperandClass::U16);
        assert_eq!(OperandClass::of(0xC0), OperandClass::U32);
        assert_eq!(OperandClass::of(0xFF), OperandClass::U32);
    }

    #[test]
    fn instruction_lengths() {
        assert_eq!(OperandClass::None.instruction_len(), 1);
        assert_eq!(OperandClass::U8.instruction_len(), 2);
        assert_eq!(OperandClass::U16.instruction_len(), 3);
        assert_eq!(OperandClass::U32.instruction_len(), 5);
    }

    #[test]
    fn unassigned_byte_in_class_is_none() {
        // 0x38 falls in the no-operand class but has no assigned mnemonic.
        assert_eq!(Opcode::from_parts(0x38, Operand::None), None);
    }

    #[test]
    fn push8_sign_extends() {
        assert_eq!(Opcode::from_parts(op::PUSH8, Operand::U8(0xF6)), Some(Opcode::Push8(-10)));
    }
}
