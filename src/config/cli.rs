use std::path::PathBuf;

use clap::{Args, builder::BoolishValueParser};

/// Configuration flags shared by every command; the highest-precedence layer.
#[derive(Debug, Args, Default, Clone)]
pub struct ConfigArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CATALOG_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Override the catalog API base URL.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the request timeout.
    #[arg(long = "api-timeout-seconds", value_name = "SECONDS", global = true)]
    pub api_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the credential store file.
    #[arg(long = "credentials-path", value_name = "PATH", global = true)]
    pub credentials_path: Option<PathBuf>,

    /// Override the number of products per listing page.
    #[arg(long = "page-size", value_name = "COUNT", global = true)]
    pub page_size: Option<u32>,
}
