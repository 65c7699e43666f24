use clap::{ArgAction, Parser, ValueEnum, builder::BoolishValueParser};
use reqwest::Url;
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use webapi_core::services::{ENV_BASE_URL, WebApiSettings};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "webapi-mcpd", version, about = "OHDSI WebAPI MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    /// Base URL of the OHDSI WebAPI, e.g. `https://atlas.example.org/WebAPI`.
    #[arg(long, env = "WEBAPI_BASE_URL")]
    webapi_base_url: Option<String>,

    /// Default CDM source key for size estimates and the default-source view.
    #[arg(long, env = "WEBAPI_SOURCE_KEY")]
    webapi_source_key: Option<String>,

    #[arg(long, env = "WEBAPI_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    webapi_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[arg(long, env = "WEBAPI_MCP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[arg(
        long = "stdio",
        env = "WEBAPI_MCP_STDIO",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "WEBAPI_MCP_SERVE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(
        long,
        env = "WEBAPI_HTTP_SERVE",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    http_serve: bool,

    #[arg(long, env = "WEBAPI_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(long, env = "WEBAPI_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    http_addr: SocketAddr,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct McpdConfig {
    pub webapi: WebApiSettings,
    pub log_level: String,
    pub log_format: LogFormat,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub http_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub http_addr: SocketAddr,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "missing required setting: {name}"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl McpdConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn validate_base_url(value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidSetting {
        name: ENV_BASE_URL,
        value: value.to_string(),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if matches!(url.scheme(), "http" | "https") && url.has_host() {
        Ok(())
    } else {
        Err(invalid())
    }
}

impl TryFrom<CliArgs> for McpdConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if !(args.enable_stdio || args.mcp_serve || args.http_serve) {
            return Err(ConfigError::MissingSetting(
                "WEBAPI_MCP_STDIO, WEBAPI_MCP_SERVE, or WEBAPI_HTTP_SERVE",
            ));
        }
        if args.webapi_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "WEBAPI_TIMEOUT_SECS",
                value: args.webapi_timeout_secs.to_string(),
            });
        }
        let log_level = args.log_level.trim().to_string();
        if EnvFilter::try_new(&log_level).is_err() {
            return Err(ConfigError::InvalidSetting {
                name: "LOG_LEVEL",
                value: args.log_level,
            });
        }

        let mut webapi = WebApiSettings::default()
            .with_request_timeout(Duration::from_secs(args.webapi_timeout_secs));
        if let Some(base_url) = non_blank(args.webapi_base_url) {
            validate_base_url(&base_url)?;
            webapi = webapi.with_base_url(base_url);
        }
        if let Some(source_key) = non_blank(args.webapi_source_key) {
            webapi = webapi.with_source_key(source_key);
        }

        Ok(Self {
            webapi,
            log_level,
            log_format: args.log_format,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            http_serve: args.http_serve,
            mcp_http_addr: args.mcp_http_addr,
            http_addr: args.http_addr,
        })
    }
}
