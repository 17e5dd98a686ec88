//! Tracing setup for MCP servers
//!
//! Logs always go to stderr: on the stdio transport stdout carries the
//! protocol itself.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format (`json` or text)
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Initialize tracing for an MCP server
///
/// `RUST_LOG` is honoured as usual; on top of it `<crate_name>=info` is added
/// so the server's own events show up without any configuration.
/// Set `LOG_FORMAT=json` for JSON lines instead of plain text.
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(
        directive
            .parse()
            .with_context(|| format!("invalid log directive '{}'", directive))?,
    );

    let registry = tracing_subscriber::registry().with(filter);

    if use_json_format() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("tracing subscriber already installed")?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()
            .context("tracing subscriber already installed")?;
    }

    Ok(())
}

fn use_json_format() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
