use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the psdtext binary.
#[derive(Debug, Parser)]
#[command(
    name = "psdtext",
    version,
    about = "Rewrite PSD text layers and publish JPEG renders"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PSDTEXT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply updates to one local document and print the report.
    Process(ProcessArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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
}

#[derive(Debug, Args, Default, Clone)]
pub struct EditorOverrides {
    /// Override the editor bridge helper executable.
    #[arg(long = "editor-command", value_name = "PATH")]
    pub editor_command: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub editor: EditorOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,

    /// Override the directory holding `<psd_id>.psd` documents.
    #[arg(long = "psd-directory", env = "PSD_DIRECTORY", value_name = "PATH")]
    pub psd_directory: Option<PathBuf>,

    /// Override the object store endpoint host.
    #[arg(long = "oss-endpoint", env = "OSS_ENDPOINT", value_name = "HOST")]
    pub oss_endpoint: Option<String>,

    /// Override the object store bucket.
    #[arg(long = "oss-bucket", env = "OSS_BUCKET_NAME", value_name = "NAME")]
    pub oss_bucket: Option<String>,

    /// Override the object store access key id.
    #[arg(long = "oss-access-key-id", env = "OSS_ACCESS_KEY_ID", value_name = "ID")]
    pub oss_access_key_id: Option<String>,

    /// Override the object store access key secret.
    #[arg(
        long = "oss-access-key-secret",
        env = "OSS_ACCESS_KEY_SECRET",
        value_name = "SECRET",
        hide_env_values = true
    )]
    pub oss_access_key_secret: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub editor: EditorOverrides,

    /// Document to edit.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub document: PathBuf,

    /// JSON file holding the array of `{layer_id, text}` updates.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub updates: PathBuf,

    /// Where to export the JPEG render.
    #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,

    /// Keep the exported render instead of deleting it after the run.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub keep_output: bool,
}
