//! The instruction set shared by the compiler's emitter and the VM's
//! decoder. A dense enum with explicit discriminants, matched over on both
//! sides of the wire format described in the binary emitter / VM loader.

use std::fmt;

/// How many operand slots an [`Opcode`] consumes, both as source values in
/// the compiler and as encoded operands in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Zero,
    One,
    Two,
}

macro_rules! opcodes {
    ($($variant:ident = $value:expr, $mnemonic:expr, $arity:ident;)+) => {
        /// One of the 32 instruction mnemonics recognised by the assembler
        /// and decoded by the VM.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum Opcode {
            $($variant = $value,)+
        }

        impl Opcode {
            /// Look up an opcode by its case-insensitive source mnemonic.
            pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
                match mnemonic.to_ascii_lowercase().as_str() {
                    $($mnemonic => Some(Opcode::$variant),)+
                    _ => None,
                }
            }

            /// Decode an opcode from the numeric value stored in a binary
            /// instruction record. Returns `None` for unknown opcodes.
            pub fn from_u16(value: u16) -> Option<Opcode> {
                match value {
                    $($value => Some(Opcode::$variant),)+
                    _ => None,
                }
            }

            /// The mnemonic this opcode lexes from.
            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)+
                }
            }

            /// The number of source values / encoded operands this opcode
            /// takes, per the arity table in the spec.
            pub fn arity(&self) -> Arity {
                match self {
                    $(Opcode::$variant => Arity::$arity,)+
                }
            }
        }
    };
}

opcodes! {
    Store        = 0,  "store",       Two;
    Copy         = 1,  "copy",        Two;
    CopyIndirect = 2,  "copy_indirect", Two;
    Add          = 3,  "add",         Two;
    Mul          = 4,  "mul",         Two;
    Sub          = 5,  "sub",         Two;
    Div          = 6,  "div",         Two;
    Mod          = 7,  "mod",         Two;
    Neq          = 8,  "neq",         Two;
    Eq           = 9,  "eq",          Two;
    Lt           = 10, "lt",          Two;
    Gt           = 11, "gt",          Two;
    Lte          = 12, "lte",         Two;
    Gte          = 13, "gte",         Two;
    Jmp          = 14, "jmp",         Two;
    Xor          = 15, "xor",         Two;
    Or           = 16, "or",          Two;
    And          = 17, "and",         Two;
    Fill         = 18, "fill",        Two;
    Draw         = 19, "draw",        Two;
    PlayMusic    = 20, "play_music",  Two;
    PlaySound    = 21, "play_sound",  Two;
    Not          = 22, "not",         One;
    Clear        = 23, "clear",       One;
    Nop          = 24, "nop",         Zero;
    Wait         = 25, "wait",        Zero;
    Exit         = 26, "exit",        Zero;
    StopMusic    = 27, "stop_music",  Zero;
    GetEvent     = 28, "get_event",   Zero;
    Random       = 29, "random",      Zero;
    GetMouse     = 30, "get_mouse",   Zero;
    GetTicks     = 31, "get_ticks",   Zero;
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// Special memory cells addressed with negative indices, per the VM memory
/// model.
pub mod special {
    pub const IP: i64 = -1;
    pub const RETURN: i64 = -2;
    pub const SCREEN_DEFAULT_COLOUR: i64 = -3;
    pub const FPS: i64 = -4;
    pub const FRAME_DELTA_MICROS: i64 = -5;
    /// The smallest memory size that leaves room for all special cells.
    pub const MIN_MEMORY_SIZE: i64 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip() {
        for value in 0..32u16 {
            let op = Opcode::from_u16(value).expect("all 32 discriminants decode");
            let back = Opcode::from_mnemonic(op.mnemonic()).expect("mnemonic re-parses");
            assert_eq!(op, back);
        }
    }

    #[test]
    fn mnemonic_lookup_is_case_insensitive() {
        assert_eq!(Opcode::from_mnemonic("STORE"), Some(Opcode::Store));
        assert_eq!(Opcode::from_mnemonic("Jmp"), Some(Opcode::Jmp));
    }

    #[test]
    fn unknown_opcode_value_is_none() {
        assert_eq!(Opcode::from_u16(32), None);
        assert_eq!(Opcode::from_u16(9999), None);
    }

    #[test]
    fn arity_partition_matches_spec() {
        let two = [
            Opcode::Store, Opcode::Copy, Opcode::CopyIndirect, Opcode::Add, Opcode::Mul,
            Opcode::Sub, Opcode::Div, Opcode::Mod, Opcode::Neq, Opcode::Eq, Opcode::Lt,
            Opcode::Gt, Opcode::Lte, Opcode::Gte, Opcode::Jmp, Opcode::Xor, Opcode::Or,
            Opcode::And, Opcode::Fill, Opcode::Draw, Opcode::PlayMusic, Opcode::PlaySound,
        ];
        let one = [Opcode::Not, Opcode::Clear];
        let zero = [
            Opcode::Nop, Opcode::Wait, Opcode::Exit, Opcode::StopMusic, Opcode::GetEvent,
            Opcode::Random, Opcode::GetMouse, Opcode::GetTicks,
        ];
        assert_eq!(two.len(), 22);
        assert_eq!(one.len(), 2);
        assert_eq!(zero.len(), 8);
        for op in two {
            assert_eq!(op.arity(), Arity::Two);
        }
        for op in one {
            assert_eq!(op.arity(), Arity::One);
        }
        for op in zero {
            assert_eq!(op.arity(), Arity::Zero);
        }
    }
}
