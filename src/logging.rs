use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DIARY_STUDIO_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

fn filter_from(raw: Option<String>) -> EnvFilter {
    raw.map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the stderr subscriber; stdout stays reserved for command output.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from(std::env::var(LOG_ENV).ok()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
