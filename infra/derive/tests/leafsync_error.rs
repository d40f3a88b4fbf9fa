#[test]
fn leafsync_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/leafsync_error_pass.rs");
}
