/// Whether `name` can be used as a parameter or keyword binding.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }

    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Installs a global `tracing` subscriber printing to stderr, filtered by
/// `RUST_LOG` (defaults to `info`).
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    Ok(())
}
