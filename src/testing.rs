use std::io::IsTerminal;

pub fn trace_init() {
    let color = std::io::stdout().is_terminal();
    let levels = std::env::var("TEST_LOG").unwrap_or_else(|_| "warn".into());

    // every test calls this, only the first one wins
    let _ = crate::trace::init(color, false, &levels);
}
