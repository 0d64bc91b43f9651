mod common;

use common::{compile_source, nth_instruction};
use simpleos::isa::Opcode;

#[test]
fn backward_reference_resolves_to_the_label_preceding_the_jump() {
    let source = "loop:\njmp 0 loop:b\n";
    let binary = compile_source(source, r#""code_address": 4096, "memory": 8192"#);

    let (opcode, arg1, arg2) = nth_instruction(&binary, 0);
    assert_eq!(Opcode::from_u16(opcode), Some(Opcode::Jmp));
    assert_eq!(arg1, 0);
    assert_eq!(arg2, 4096);
}
