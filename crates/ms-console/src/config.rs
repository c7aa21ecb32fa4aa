//! Command-line configuration and logging setup

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use ms_client_api::SessionContext;
use ms_rest_client::RestClient;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::error::{ConsoleError, ConsoleResult};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// Console command-line arguments
#[derive(Debug, Parser)]
#[command(name = "metascan")]
#[command(about = "Terminal console for the metascan metadata scanner", version)]
pub struct Args {
    /// Base URL of the metascan server
    #[arg(long, env = "METASCAN_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server_url: String,

    /// Bearer token; the console starts signed in
    #[arg(long, env = "METASCAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Write logs to this file (logs are discarded otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Log filter directive; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory for exported result tables
    #[arg(long, default_value = ".")]
    pub export_dir: PathBuf,

    /// Use built-in sample data instead of a server
    #[arg(long)]
    pub demo: bool,
}

/// Validated settings handed to the app
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub server_url: Url,
    pub token: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub export_dir: PathBuf,
    pub demo: bool,
}

impl ConsoleConfig {
    pub fn from_args(args: Args) -> ConsoleResult<Self> {
        let server_url = Url::parse(args.server_url.trim())
            .map_err(|e| ConsoleError::Config(format!("invalid server URL {:?}: {e}", args.server_url)))?;
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(ConsoleError::Config(format!(
                "server URL must use http or https, got {}",
                server_url.scheme()
            )));
        }
        if args.export_dir.exists() && !args.export_dir.is_dir() {
            return Err(ConsoleError::Config(format!(
                "export path {} is not a directory",
                args.export_dir.display()
            )));
        }

        Ok(Self {
            server_url,
            token: args
                .token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            log_file: args.log_file,
            log_level: args.log_level,
            export_dir: args.export_dir,
            demo: args.demo,
        })
    }

    /// Session to share between the client and the console
    pub fn session(&self) -> SessionContext {
        match &self.token {
            Some(token) => SessionContext::with_token(token.clone()),
            None => SessionContext::new(),
        }
    }

    /// REST client for the configured server, sharing `session`
    pub fn rest_client(&self, session: SessionContext) -> ConsoleResult<RestClient> {
        Ok(RestClient::new(self.server_url.clone(), session)?)
    }

    fn env_filter(&self) -> ConsoleResult<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.log_level))
            .map_err(|e| ConsoleError::Config(format!("invalid log level {:?}: {e}", self.log_level)))
    }
}

/// Install the global tracing subscriber.
///
/// Output never goes to the terminal the UI is drawn on.
pub fn init_logging(config: &ConsoleConfig) -> ConsoleResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false);

    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::sink).try_init(),
    };
    installed.map_err(|e| ConsoleError::Config(format!("logging already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ConsoleResult<ConsoleConfig> {
        let mut argv = vec!["metascan"];
        argv.extend_from_slice(args);
        ConsoleConfig::from_args(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_explicit_arguments() {
        let config = parse(&[
            "--server-url",
            "https://scan.example.com/",
            "--token",
            "  abc  ",
            "--log-level",
            "debug",
            "--demo",
        ])
        .unwrap();
        assert_eq!(config.server_url.as_str(), "https://scan.example.com/");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.log_level, "debug");
        assert!(config.demo);
        assert!(config.session().is_authenticated());
    }

    #[test]
    fn test_blank_token_is_anonymous() {
        let config = parse(&["--server-url", "http://localhost:9000", "--token", " "]).unwrap();
        assert!(config.token.is_none());
        assert!(!config.session().is_authenticated());
        assert!(config.rest_client(config.session()).is_ok());
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(parse(&["--server-url", "not a url"]), Err(ConsoleError::Config(_))));
        assert!(matches!(parse(&["--server-url", "ftp://host"]), Err(ConsoleError::Config(_))));
    }

    #[test]
    fn test_export_dir_must_be_a_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert!(matches!(
            parse(&["--server-url", "http://localhost:9000", "--export-dir", path]),
            Err(ConsoleError::Config(_))
        ));
    }
}
