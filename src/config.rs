use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use std::path::PathBuf;

/// Gateway settings, read once at startup from flags or the environment.
#[derive(Debug, Clone, Args)]
pub struct Config {
    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "SERVER_ADDRESS", default_value = "localhost")]
    pub address: String,

    /// Base URL of the presentation backend.
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    #[arg(long, env = "TLS_CERT_FILE", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "TLS_KEY_FILE", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// JSON settings for the reasoning engine.
    #[arg(long, env = "ENGINE_CONFIG_FILE")]
    pub engine_config: Option<PathBuf>,

    #[arg(long, env = "ENGINE_MODEL", default_value = "claude-haiku-4-5-20251001")]
    pub model: String,

    /// When false, `/chat` answers 500 instead of opening a stream.
    #[arg(
        long,
        env = "STREAMING_ENABLED",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub streaming: bool,

    #[arg(
        long,
        env = "QUIET_LOGGING",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub quiet: bool,

    /// Largest accepted `/chat` body; the auxiliary payload is a whole
    /// compressed presentation.
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 256 * 1024 * 1024)]
    pub max_body_bytes: usize,

    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub allowed_origins: Vec<String>,

    /// Routing flag value that sends the auxiliary payload to the backend.
    #[arg(long, env = "SIDE_CHANNEL_ROUTE", default_value_t = 1)]
    pub side_channel_route: i64,

    #[arg(long, env = "SIDE_CHANNEL_PATH", default_value = "/set/slideBase64")]
    pub side_channel_path: String,

    #[arg(long, env = "PREVIEW_PATH", default_value = "/presentation/preview")]
    pub preview_path: String,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Cert and key paths, when TLS is configured.
    pub fn tls(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.tls_cert.as_ref().zip(self.tls_key.as_ref())
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins
            .iter()
            .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin))
    }

    #[cfg(test)]
    pub(crate) fn from_args(args: &[&str]) -> Self {
        use clap::Parser;

        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            config: Config,
        }

        Cli::parse_from(std::iter::once("chat-gateway").chain(args.iter().copied())).config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ANTHROPIC_API_KEY environment variable not set")]
    MissingApiKey,
    #[error("failed to read engine settings {}: {source}", .path.display())]
    ReadEngineSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid engine settings {}: {source}", .path.display())]
    ParseEngineSettings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
