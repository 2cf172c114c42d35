/// Bytecode opcodes for the Mica VM.
///
/// Stack-based: operands are pushed/popped from the value stack. Most
/// instructions are a single byte; `Constant`, the global/property ops,
/// `Call`, and `Array` carry a one-byte operand, and the jump family carries
/// a big-endian u16 offset.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Constant, // u8 const_index → push constants[i]
    Nil,      // push nil
    True,     // push true
    False,    // push false
    Pop,      // discard TOS

    // Globals (the VM's only variable namespace; names live in the pool)
    GetGlobal,    // u8 name_index → push globals[name]
    DefineGlobal, // u8 name_index → globals[name] = pop (always rebinds)
    SetGlobal,    // u8 name_index → globals[name] = peek (must exist)

    // Instance properties
    GetProperty, // u8 name_index → pop instance, push field or bound method
    SetProperty, // u8 name_index → pop value, pop instance, push value

    // Comparison (>= and <= are compiled as the inverse op plus NOT)
    Equal,
    Greater,
    Less,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Not,
    Negate,

    Print, // pop and print TOS

    // Control flow; offsets are u16 big-endian, patched after emission
    Jump,        // ip += offset
    JumpIfFalse, // ip += offset when TOS is falsy (condition stays on stack)
    Loop,        // ip -= offset (backward jump)

    Call,   // u8 argc → TOS is the callee, argc values below it
    Return, // halt the dispatch loop

    // Arrays
    Array,    // u8 n → pop n values, push array
    IndexGet, // pop index, pop object, push element
    IndexSet, // pop value, pop index, pop object, push value
}

impl Op {
    /// Convert a raw byte to an Op. Valid because the enum is `#[repr(u8)]`
    /// with dense variants from 0 through `IndexSet`. If new variants are
    /// added with gaps, this must be updated.
    pub fn from_u8(byte: u8) -> Option<Op> {
        if byte <= Op::IndexSet as u8 {
            // SAFETY: Op is #[repr(u8)] with dense, contiguous variants 0..=IndexSet.
            Some(unsafe { std::mem::transmute::<u8, Op>(byte) })
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Constant => "CONSTANT",
            Op::Nil => "NIL",
            Op::True => "TRUE",
            Op::False => "FALSE",
            Op::Pop => "POP",
            Op::GetGlobal => "GET_GLOBAL",
            Op::DefineGlobal => "DEFINE_GLOBAL",
            Op::SetGlobal => "SET_GLOBAL",
            Op::GetProperty => "GET_PROPERTY",
            Op::SetProperty => "SET_PROPERTY",
            Op::Equal => "EQUAL",
            Op::Greater => "GREATER",
            Op::Less => "LESS",
            Op::Add => "ADD",
            Op::Subtract => "SUBTRACT",
            Op::Multiply => "MULTIPLY",
            Op::Divide => "DIVIDE",
            Op::Modulo => "MODULO",
            Op::Not => "NOT",
            Op::Negate => "NEGATE",
            Op::Print => "PRINT",
            Op::Jump => "JUMP",
            Op::JumpIfFalse => "JUMP_IF_FALSE",
            Op::Loop => "LOOP",
            Op::Call => "CALL",
            Op::Return => "RETURN",
            Op::Array => "ARRAY",
            Op::IndexGet => "INDEX_GET",
            Op::IndexSet => "INDEX_SET",
        }
    }
}

/// Opcode constants for use in match patterns in the dispatch loop.
pub mod op {
    use super::Op;
    pub const CONSTANT: u8 = Op::Constant as u8;
    pub const NIL: u8 = Op::Nil as u8;
    pub const TRUE: u8 = Op::True as u8;
    pub const FALSE: u8 = Op::False as u8;
    pub const POP: u8 = Op::Pop as u8;
    pub const GET_GLOBAL: u8 = Op::GetGlobal as u8;
    pub const DEFINE_GLOBAL: u8 = Op::DefineGlobal as u8;
    pub const SET_GLOBAL: u8 = Op::SetGlobal as u8;
    pub const GET_PROPERTY: u8 = Op::GetProperty as u8;
    pub const SET_PROPERTY: u8 = Op::SetProperty as u8;
    pub const EQUAL: u8 = Op::Equal as u8;
    pub const GREATER: u8 = Op::Greater as u8;
    pub const LESS: u8 = Op::Less as u8;
    pub const ADD: u8 = Op::Add as u8;
    pub const SUBTRACT: u8 = Op::Subtract as u8;
    pub const MULTIPLY: u8 = Op::Multiply as u8;
    pub const DIVIDE: u8 = Op::Divide as u8;
    pub const MODULO: u8 = Op::Modulo as u8;
    pub const NOT: u8 = Op::Not as u8;
    pub const NEGATE: u8 = Op::Negate as u8;
    pub const PRINT: u8 = Op::Print as u8;
    pub const JUMP: u8 = Op::Jump as u8;
    pub const JUMP_IF_FALSE: u8 = Op::JumpIfFalse as u8;
    pub const LOOP: u8 = Op::Loop as u8;
    pub const CALL: u8 = Op::Call as u8;
    pub const RETURN: u8 = Op::Return as u8;
    pub const ARRAY: u8 = Op::Array as u8;
    pub const INDEX_GET: u8 = Op::IndexGet as u8;
    pub const INDEX_SET: u8 = Op::IndexSet as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u8() {
        for byte in 0..=Op::IndexSet as u8 {
            let op = Op::from_u8(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(Op::from_u8(Op::IndexSet as u8 + 1), None);
        assert_eq!(Op::from_u8(0xff), None);
    }
}
