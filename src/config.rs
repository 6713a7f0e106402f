//! Configuration module for tcp-primer.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values, which take
//! precedence over the built-in defaults.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tcp-primer")]
#[command(author = "tcp-primer authors")]
#[command(version = "0.1.0")]
#[command(about = "Basic TCP clients and a logging echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Number of worker threads for the server (defaults to number of CPU cores)
    #[arg(short = 'w', long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Program to run
#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Send a GET request and print the raw response
    HttpGet(HttpGetArgs),
    /// Send "<name> says: <line>" messages read from stdin
    Chat(ChatArgs),
    /// Accept connections and print everything they send
    EchoServer(EchoServerArgs),
}

#[derive(Args, Debug)]
pub struct HttpGetArgs {
    /// Remote address (e.g., www.apache.org:80)
    #[arg(short, long)]
    pub remote: Option<String>,

    /// Raw request sent after connecting
    #[arg(long)]
    pub request: Option<String>,

    /// Read buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Server address (e.g., localhost:50000)
    #[arg(short, long)]
    pub server: Option<String>,
}

#[derive(Args, Debug)]
pub struct EchoServerArgs {
    /// Address to bind to (e.g., localhost:50000)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum bytes taken per read
    #[arg(long)]
    pub read_buffer_size: Option<usize>,

    /// Listen backlog
    #[arg(long)]
    pub backlog: Option<i32>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub runtime: RuntimeSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http_get: HttpGetSection,
    #[serde(default)]
    pub chat: ChatSection,
    #[serde(default)]
    pub echo_server: EchoServerSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct RuntimeSection {
    /// Number of worker threads
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HttpGetSection {
    #[serde(default = "default_http_remote")]
    pub remote: String,
    #[serde(default = "default_http_request")]
    pub request: String,
    #[serde(default = "default_http_buffer_size")]
    pub buffer_size: usize,
}

impl Default for HttpGetSection {
    fn default() -> Self {
        Self {
            remote: default_http_remote(),
            request: default_http_request(),
            buffer_size: default_http_buffer_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_chat_server")]
    pub server: String,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            server: default_chat_server(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EchoServerSection {
    #[serde(default = "default_echo_listen")]
    pub listen: String,
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for EchoServerSection {
    fn default() -> Self {
        Self {
            listen: default_echo_listen(),
            read_buffer_size: default_read_buffer_size(),
            backlog: default_backlog(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_http_remote() -> String {
    "www.apache.org:80".to_string()
}

fn default_http_request() -> String {
    "GET / \n".to_string()
}

fn default_http_buffer_size() -> usize {
    4096
}

fn default_chat_server() -> String {
    "localhost:50000".to_string()
}

fn default_echo_listen() -> String {
    "localhost:50000".to_string()
}

fn default_read_buffer_size() -> usize {
    512
}

fn default_backlog() -> i32 {
    1024
}

/// Resolved settings for the HTTP GET client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpGetConfig {
    pub remote: String,
    pub request: String,
    pub buffer_size: usize,
}

/// Resolved settings for the chat client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub server: String,
}

/// Resolved settings for the echo server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoServerConfig {
    pub listen: String,
    pub read_buffer_size: usize,
    pub backlog: i32,
}

/// The program selected on the command line, with its settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    HttpGet(HttpGetConfig),
    Chat(ChatConfig),
    EchoServer(EchoServerConfig),
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub workers: Option<usize>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve parsed CLI arguments against the TOML file they point to.
    pub fn from_cli(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = match cli.config {
            Some(ref config_path) => {
                let contents = std::fs::read_to_string(config_path)
                    .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
                toml::from_str(&contents)
                    .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
            }
            None => TomlConfig::default(),
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    fn merge(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let mode = match cli.command {
            CliCommand::HttpGet(args) => Mode::HttpGet(HttpGetConfig {
                remote: args.remote.unwrap_or(file.http_get.remote),
                request: args.request.unwrap_or(file.http_get.request),
                buffer_size: args.buffer_size.unwrap_or(file.http_get.buffer_size),
            }),
            CliCommand::Chat(args) => Mode::Chat(ChatConfig {
                server: args.server.unwrap_or(file.chat.server),
            }),
            CliCommand::EchoServer(args) => Mode::EchoServer(EchoServerConfig {
                listen: args.listen.unwrap_or(file.echo_server.listen),
                read_buffer_size: args
                    .read_buffer_size
                    .unwrap_or(file.echo_server.read_buffer_size),
                backlog: args.backlog.unwrap_or(file.echo_server.backlog),
            }),
        };

        let config = Config {
            mode,
            workers: cli.workers.or(file.runtime.workers),
            log_level: cli.log_level.unwrap_or(file.logging.level),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1"));
        }
        match &self.mode {
            Mode::HttpGet(c) if c.buffer_size == 0 => {
                Err(ConfigError::Invalid("http_get.buffer_size must be non-zero"))
            }
            Mode::EchoServer(c) if c.read_buffer_size == 0 => Err(ConfigError::Invalid(
                "echo_server.read_buffer_size must be non-zero",
            )),
            Mode::EchoServer(c) if c.backlog <= 0 => {
                Err(ConfigError::Invalid("echo_server.backlog must be positive"))
            }
            _ => Ok(()),
        }
    }

    /// Short name of the selected program, used in log lines.
    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            Mode::HttpGet(_) => "http-get",
            Mode::Chat(_) => "chat",
            Mode::EchoServer(_) => "echo-server",
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
