mod common;

use common::{compile_source, nth_instruction};
use simpleos::isa::Opcode;

#[test]
fn constant_folded_colour_is_embedded_as_the_stored_value() {
    let source = "#constant YELLOW colour(255,255,0,255)\nstore 0x10 YELLOW\n";
    let binary = compile_source(source, "");

    let (opcode, arg1, arg2) = nth_instruction(&binary, 0);
    assert_eq!(Opcode::from_u16(opcode), Some(Opcode::Store));
    assert_eq!(arg1, 0x10);
    assert_eq!(arg2, 0xFFFF00FFu32 as i64);
}
