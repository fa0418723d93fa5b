mod app;
mod cli;

use tracing_subscriber::EnvFilter;

fn main() {
    // Default to warnings only so status lines stay readable; RUST_LOG
    // overrides for debugging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    app::run(cli::parse());
}
