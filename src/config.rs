use std::env;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "8799";
pub const DEFAULT_DATA_PATH: &str = "graph_data.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub data_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Config {
            host: lookup("NOTEGRAPH_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: lookup("NOTEGRAPH_PORT").unwrap_or_else(|| DEFAULT_PORT.to_string()),
            data_path: lookup("NOTEGRAPH_DATA_PATH")
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
                .into(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
