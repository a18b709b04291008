//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{BrowserOverrides, CliArgs, Command, ConvertArgs, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "htmlprint";
const ENV_PREFIX: &str = "HTMLPRINT";
const PRODUCTION_ENVIRONMENT: &str = "production";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3001;
pub(crate) const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_WRAPPER_ID: &str = "awesomewrap";
pub(crate) const DEFAULT_PAGE_WIDTH_MM: f64 = 210.0;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub uploads: UploadSettings,
    pub browser: BrowserSettings,
    pub render: RenderSettings,
    pub sanitizer: SanitizerSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub production: bool,
    pub addr: SocketAddr,
}

impl ServerSettings {
    /// Address for the local listener. Production deployments mount the router
    /// from their hosting runtime instead, so no listener is offered there.
    pub fn local_listener(&self) -> Option<SocketAddr> {
        (!self.production).then_some(self.addr)
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

impl UploadSettings {
    /// The request ceiling as a body-limit value. Range was checked while loading.
    pub fn limit_bytes(&self) -> usize {
        usize::try_from(self.max_request_bytes.get()).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
    pub launch_timeout: Duration,
    pub page_load_timeout: Duration,
    pub idle_event: IdleEvent,
}

/// Chromium lifecycle event that marks page load as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// No in-flight connections for 500ms.
    NetworkIdle,
    /// At most two in-flight connections for 500ms.
    NetworkAlmostIdle,
}

impl IdleEvent {
    pub fn lifecycle_name(self) -> &'static str {
        match self {
            IdleEvent::NetworkIdle => "networkIdle",
            IdleEvent::NetworkAlmostIdle => "networkAlmostIdle",
        }
    }
}

impl FromStr for IdleEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "network_idle" | "networkidle" | "networkidle0" => Ok(IdleEvent::NetworkIdle),
            "network_almost_idle" | "networkalmostidle" | "networkidle2" => {
                Ok(IdleEvent::NetworkAlmostIdle)
            }
            other => Err(format!("unknown idle event `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub wrapper_id: String,
    pub page_width_mm: f64,
    pub max_concurrent_sessions: Option<NonZeroU32>,
}

#[derive(Debug, Clone)]
pub struct SanitizerSettings {
    pub mode: SanitizerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizerMode {
    /// Lexical removal of script/iframe spans and inline handlers.
    Pattern,
    /// Parse-and-allowlist cleaning.
    Allowlist,
}

impl FromStr for SanitizerMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pattern" => Ok(SanitizerMode::Pattern),
            "allowlist" => Ok(SanitizerMode::Allowlist),
            other => Err(format!("unknown sanitizer mode `{other}`")),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("browser.extra_args"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_global_overrides(cli);

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Convert(args)) => raw.apply_convert_overrides(args),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    uploads: RawUploadSettings,
    browser: RawBrowserSettings,
    render: RawRenderSettings,
    sanitizer: RawSanitizerSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, cli: &CliArgs) {
        let environment = cli.environment.as_ref().or(cli.node_environment.as_ref());
        if let Some(environment) = environment {
            self.server.environment = Some(environment.clone());
        }
        if let Some(port) = cli.port {
            self.server.port = Some(port);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(max) = overrides.render_max_concurrent_sessions {
            self.render.max_concurrent_sessions = Some(max);
        }
        if let Some(mode) = overrides.sanitizer_mode.as_ref() {
            self.sanitizer.mode = Some(mode.clone());
        }

        self.apply_browser_overrides(&overrides.browser);
    }

    fn apply_convert_overrides(&mut self, args: &ConvertArgs) {
        if let Some(mode) = args.sanitizer_mode.as_ref() {
            self.sanitizer.mode = Some(mode.clone());
        }
        self.apply_browser_overrides(&args.browser);
    }

    fn apply_browser_overrides(&mut self, overrides: &BrowserOverrides) {
        if let Some(path) = overrides.executable.as_ref() {
            self.browser.executable = Some(path.clone());
        }
        if let Some(seconds) = overrides.page_load_timeout_seconds {
            self.browser.page_load_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.launch_timeout_seconds {
            self.browser.launch_timeout_seconds = Some(seconds);
        }
        if let Some(event) = overrides.idle_event.as_ref() {
            self.browser.idle_event = Some(event.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            uploads,
            browser,
            render,
            sanitizer,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            uploads: build_upload_settings(uploads)?,
            browser: build_browser_settings(browser)?,
            render: build_render_settings(render)?,
            sanitizer: build_sanitizer_settings(sanitizer)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let production = server
        .environment
        .as_deref()
        .is_some_and(|value| value.trim() == PRODUCTION_ENVIRONMENT);

    Ok(ServerSettings { production, addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let executable = browser
        .executable
        .filter(|path| !path.as_os_str().is_empty());

    let launch_timeout = positive_seconds(
        browser
            .launch_timeout_seconds
            .unwrap_or(DEFAULT_LAUNCH_TIMEOUT_SECS),
        "browser.launch_timeout_seconds",
    )?;
    let page_load_timeout = positive_seconds(
        browser
            .page_load_timeout_seconds
            .unwrap_or(DEFAULT_PAGE_LOAD_TIMEOUT_SECS),
        "browser.page_load_timeout_seconds",
    )?;

    let idle_event = match browser.idle_event {
        Some(value) => IdleEvent::from_str(&value)
            .map_err(|reason| LoadError::invalid("browser.idle_event", reason))?,
        None => IdleEvent::NetworkIdle,
    };

    let extra_args = browser
        .extra_args
        .into_iter()
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty())
        .collect();

    Ok(BrowserSettings {
        executable,
        extra_args,
        launch_timeout,
        page_load_timeout,
        idle_event,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let wrapper_id = render
        .wrapper_id
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_WRAPPER_ID.to_string());
    if wrapper_id.is_empty() {
        return Err(LoadError::invalid(
            "render.wrapper_id",
            "identifier must not be empty",
        ));
    }

    let page_width_mm = render.page_width_mm.unwrap_or(DEFAULT_PAGE_WIDTH_MM);
    if !page_width_mm.is_finite() || page_width_mm <= 0.0 {
        return Err(LoadError::invalid(
            "render.page_width_mm",
            "must be a positive number",
        ));
    }

    let max_concurrent_sessions = render
        .max_concurrent_sessions
        .map(|value| non_zero_u32(value.into(), "render.max_concurrent_sessions"))
        .transpose()?;

    Ok(RenderSettings {
        wrapper_id,
        page_width_mm,
        max_concurrent_sessions,
    })
}

fn build_sanitizer_settings(
    sanitizer: RawSanitizerSettings,
) -> Result<SanitizerSettings, LoadError> {
    let mode = match sanitizer.mode {
        Some(value) => SanitizerMode::from_str(&value)
            .map_err(|reason| LoadError::invalid("sanitizer.mode", reason))?,
        None => SanitizerMode::Pattern,
    };

    Ok(SanitizerSettings { mode })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    environment: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    executable: Option<PathBuf>,
    extra_args: Vec<String>,
    launch_timeout_seconds: Option<u64>,
    page_load_timeout_seconds: Option<u64>,
    idle_event: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    wrapper_id: Option<String>,
    page_width_mm: Option<f64>,
    max_concurrent_sessions: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSanitizerSettings {
    mode: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
