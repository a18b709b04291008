use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the htmlprint binary.
#[derive(Debug, Parser)]
#[command(name = "htmlprint", version, about = "Render HTML to PDF with headless Chromium")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "HTMLPRINT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Deployment environment; the value `production` enables production mode.
    #[arg(long = "environment", env = "APP_ENV", value_name = "NAME", global = true)]
    pub environment: Option<String>,

    /// `NODE_ENV`, read only when `APP_ENV` is unset.
    #[arg(long = "node-env", env = "NODE_ENV", value_name = "NAME", global = true, hide = true)]
    pub node_environment: Option<String>,

    /// Port for the local listener.
    #[arg(long = "port", env = "PORT", value_name = "PORT", global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Convert a local HTML file to PDF and exit.
    #[command(name = "convert")]
    Convert(ConvertArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowserOverrides {
    /// Path to the Chromium executable; searched on PATH when omitted.
    #[arg(long = "browser-executable", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub executable: Option<PathBuf>,

    /// Override how long a page may take to reach network idle.
    #[arg(long = "browser-page-load-timeout-seconds", value_name = "SECONDS")]
    pub page_load_timeout_seconds: Option<u64>,

    /// Override the browser launch timeout.
    #[arg(long = "browser-launch-timeout-seconds", value_name = "SECONDS")]
    pub launch_timeout_seconds: Option<u64>,

    /// Lifecycle event treated as page-load completion (network_idle|network_almost_idle).
    #[arg(long = "browser-idle-event", value_name = "EVENT")]
    pub idle_event: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Override the local listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the maximum upload request size in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Cap the number of browser sessions rendering at once (unbounded when unset).
    #[arg(long = "render-max-concurrent-sessions", value_name = "COUNT")]
    pub render_max_concurrent_sessions: Option<u32>,

    /// Sanitizer mode (pattern|allowlist).
    #[arg(long = "sanitizer-mode", value_name = "MODE")]
    pub sanitizer_mode: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub browser: BrowserOverrides,

    /// Sanitizer mode (pattern|allowlist).
    #[arg(long = "sanitizer-mode", value_name = "MODE")]
    pub sanitizer_mode: Option<String>,

    /// HTML file to convert.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the PDF; defaults to INPUT with a `.pdf` extension.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("pdf"))
    }
}
