//! trybuild compile-time tests for component_macros

#[test]
fn trybuild_intercepted() {
    let t = trybuild::TestCases::new();
    t.pass("tests/trybuild/intercepted_ok.rs");
    t.pass("tests/trybuild/intercepted_custom_name.rs");
}
