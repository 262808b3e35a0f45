use clap::Parser;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

/// Web server settings. Every flag can also come from the environment.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(
    name = "website",
    version,
    about = "Settlement and line-separator tools for spreadsheet uploads"
)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "SHEETDESK_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SHEETDESK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Largest accepted request body, in MiB
    #[arg(long, env = "SHEETDESK_MAX_UPLOAD_MB", default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    pub max_upload_mb: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
