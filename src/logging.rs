use anyhow::Context as _;

/// Default directives when `RUST_LOG` is unset: our own events at info, HTTP
/// client internals kept quiet.
const DEFAULT_FILTER: &str = "info,hyper_util=warn,reqwest=warn";

/// Installs the stderr fmt subscriber. Call once, first thing in `main`.
pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}
