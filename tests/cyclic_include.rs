mod common;

use common::compile_project;

#[test]
fn a_cycle_between_two_included_files_fails_compilation_without_recursing_forever() {
    let result = compile_project(
        "a.sos",
        &[("a.sos", "#include \"b.sos\"\n"), ("b.sos", "#include \"a.sos\"\n")],
        "",
    );
    assert!(result.is_err(), "a cyclic include must fail compilation and emit no binary");
}
