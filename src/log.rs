use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, EnvFilter};

use crate::env::{get_env_var, ENV_CONFIG};

/// Progress is logged at info, so that is the floor when RUST_LOG says nothing else.
fn make_env_filter(rust_log: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(rust_log.unwrap_or_default())
}

pub fn init() {
    let env_filter = make_env_filter(get_env_var("RUST_LOG").as_deref());
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    let builder = if ENV_CONFIG.log_perf {
        builder.with_span_events(FmtSpan::CLOSE)
    } else {
        builder
    };

    if ENV_CONFIG.log_json {
        builder.json().init();
    } else {
        builder.init();
    };
}
