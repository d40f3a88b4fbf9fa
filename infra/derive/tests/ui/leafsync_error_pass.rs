use leafsync_derive::leafsync_error;
use std::borrow::Cow;

#[leafsync_error]
pub enum DemoError {
    #[error("Ledger I/O failure{}: {source}", format_context(.context))]
    LedgerIo {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read(path: &str) -> Result<String, DemoError> {
    std::fs::read_to_string(path).context("reading ledger")
}

fn main() {
    let err = read("/definitely/not/here").unwrap_err();
    assert_eq!(err.kind(), "ledger_io");
    assert!(err.to_string().contains("(reading ledger)"));

    let internal: DemoError = "boom".into();
    assert_eq!(internal.kind(), "internal");
}
