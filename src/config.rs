use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "http://localhost:9200";
pub const ENV_HOST: &str = "KOPF_HOST";
pub const ENV_HOME: &str = "KOPF_REST_HOME";

const HOME_DIR_NAME: &str = ".kopf-rest";
const STORAGE_FILE_NAME: &str = "storage.json";
const LOG_FILE_NAME: &str = "kopf-rest.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub home: PathBuf,
}

impl Config {
    /// Resolves the state directory: explicit value first, then `~/.kopf-rest`.
    pub fn new(host: String, home: Option<PathBuf>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => dirs::home_dir()
                .map(|dir| dir.join(HOME_DIR_NAME))
                .ok_or_else(|| anyhow!("cannot determine home directory; pass --home"))?,
        };
        Ok(Self { host, home })
    }

    pub fn storage_path(&self) -> PathBuf {
        self.home.join(STORAGE_FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join(LOG_FILE_NAME)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn files_live_under_home() {
        let config = Config::new(DEFAULT_HOST.to_string(), Some(PathBuf::from("/tmp/kr")))
            .expect("config");
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/kr/storage.json"));
        assert_eq!(config.log_path(), PathBuf::from("/tmp/kr/kopf-rest.log"));
    }
}
