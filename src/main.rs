use flvjoin::{Config, run};
use tracing::Level;

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    let level = if config.quiet { Level::WARN } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    run(config)?;
    Ok(())
}
