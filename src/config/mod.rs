//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    fmt,
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, FromArgMatches, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    CliArgs, Command, EditorOverrides, LoggingOverrides, ProcessArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "psdtext";
const ENV_PREFIX: &str = "PSDTEXT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 1024 * 1024;
const DEFAULT_PSD_DIRECTORY: &str = "documents";
const DEFAULT_EDITOR_COMMAND: &str = "psd-bridge";
const DEFAULT_KEY_PREFIX: &str = "psd-outputs";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub documents: DocumentSettings,
    pub editor: EditorSettings,
    /// `None` when no storage value was configured at all.
    pub storage: Option<StorageSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: NonZeroU64,
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
pub struct DocumentSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub command: PathBuf,
    pub args: Vec<String>,
}

#[derive(Clone)]
pub struct StorageSettings {
    /// Endpoint host without scheme, e.g. `oss-cn-hangzhou.aliyuncs.com`.
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub key_prefix: String,
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("failed to read command-line defaults: {0}")]
    Cli(#[from] clap::Error),
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

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Process(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_editor_overrides(&args.editor);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration from the process arguments.
///
/// Without a subcommand the binary serves; the serve flags are then still read
/// from their environment variables (`OSS_ENDPOINT`, `PSD_DIRECTORY`, ...).
pub fn load_with_cli() -> Result<(Command, Settings), LoadError> {
    let mut args = CliArgs::parse();
    let command = match args.command.take() {
        Some(command) => command,
        None => Command::Serve(Box::new(ServeArgs {
            overrides: serve_overrides_from_env()?,
        })),
    };
    args.command = Some(command.clone());
    let settings = load(&args)?;
    Ok((command, settings))
}

fn serve_overrides_from_env() -> Result<ServeOverrides, LoadError> {
    let command = ServeOverrides::augment_args(clap::Command::new("serve"));
    let matches = command.try_get_matches_from(["serve"])?;
    Ok(ServeOverrides::from_arg_matches(&matches)?)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    documents: RawDocumentSettings,
    editor: RawEditorSettings,
    storage: RawStorageSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_editor_overrides(&overrides.editor);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(limit) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(limit);
        }
        if let Some(directory) = overrides.psd_directory.as_ref() {
            self.documents.directory = Some(directory.clone());
        }
        if let Some(endpoint) = overrides.oss_endpoint.as_ref() {
            self.storage.endpoint = Some(endpoint.clone());
        }
        if let Some(bucket) = overrides.oss_bucket.as_ref() {
            self.storage.bucket = Some(bucket.clone());
        }
        if let Some(id) = overrides.oss_access_key_id.as_ref() {
            self.storage.access_key_id = Some(id.clone());
        }
        if let Some(secret) = overrides.oss_access_key_secret.as_ref() {
            self.storage.access_key_secret = Some(secret.clone());
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_editor_overrides(&mut self, overrides: &EditorOverrides) {
        if let Some(command) = overrides.editor_command.as_ref() {
            self.editor.command = Some(command.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            documents,
            editor,
            storage,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            documents: build_document_settings(documents)?,
            editor: build_editor_settings(editor)?,
            storage: build_storage_settings(storage)?,
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

    let max_request_bytes_value = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
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

fn build_document_settings(documents: RawDocumentSettings) -> Result<DocumentSettings, LoadError> {
    let directory = documents
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PSD_DIRECTORY));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "documents.directory",
            "path must not be empty",
        ));
    }
    Ok(DocumentSettings { directory })
}

fn build_editor_settings(editor: RawEditorSettings) -> Result<EditorSettings, LoadError> {
    let command = editor
        .command
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EDITOR_COMMAND));
    if command.as_os_str().is_empty() {
        return Err(LoadError::invalid("editor.command", "path must not be empty"));
    }
    Ok(EditorSettings {
        command,
        args: editor.args.unwrap_or_default(),
    })
}

fn build_storage_settings(
    storage: RawStorageSettings,
) -> Result<Option<StorageSettings>, LoadError> {
    let endpoint = non_empty(storage.endpoint).map(|value| normalize_endpoint(&value));
    let bucket = non_empty(storage.bucket);
    let access_key_id = non_empty(storage.access_key_id);
    let access_key_secret = non_empty(storage.access_key_secret);

    match (endpoint, bucket, access_key_id, access_key_secret) {
        (None, None, None, None) => Ok(None),
        (Some(endpoint), Some(bucket), Some(access_key_id), Some(access_key_secret)) => {
            if endpoint.is_empty() || endpoint.contains('/') {
                return Err(LoadError::invalid(
                    "storage.endpoint",
                    format!("expected a host name, got `{endpoint}`"),
                ));
            }
            let key_prefix = storage
                .key_prefix
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
            Ok(Some(StorageSettings {
                endpoint,
                bucket,
                access_key_id,
                access_key_secret,
                key_prefix,
            }))
        }
        (endpoint, bucket, access_key_id, access_key_secret) => {
            let missing = [
                ("storage.endpoint", endpoint.is_none()),
                ("storage.bucket", bucket.is_none()),
                ("storage.access_key_id", access_key_id.is_none()),
                ("storage.access_key_secret", access_key_secret.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, missing)| missing.then_some(key))
            .collect::<Vec<_>>();
            Err(LoadError::invalid(
                "storage",
                format!("missing required values: {}", missing.join(", ")),
            ))
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn normalize_endpoint(endpoint: &str) -> String {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    host.trim_end_matches('/').to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocumentSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEditorSettings {
    command: Option<PathBuf>,
    args: Option<Vec<String>>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    endpoint: Option<String>,
    bucket: Option<String>,
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
    key_prefix: Option<String>,
}

impl fmt::Debug for RawStorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStorageSettings")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "access_key_secret",
                &self.access_key_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}
