use std::net::SocketAddr;
use std::path::PathBuf;

use iot_domain::authorizer::StaticAuthorizer;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RepositoryConfig {
    pub state_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub authorizer: StaticAuthorizer,
}

impl Config {
    pub fn load(path: &std::path::Path) -> iot_domain::error::Result<Self> {
        iot_domain::config::load(path, "MODBUS_SVC")
    }
}
