//! servicetree - inspect and exercise a configured service tree

use clap::Parser;

use servicetree::cli::App;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let app = App::parse();

    // Initialize logging
    let filter = if app.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    app.run()
}
