use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "vecprobe.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CollectionsConfig {
    pub name: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub rest: Option<EndpointConfig>,
    pub rpc: Option<EndpointConfig>,
    pub collections: Option<CollectionsConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid config {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
}

/// Load the given file, or `./vecprobe.yaml` when none is given and it exists.
/// An explicitly named file that cannot be read is an error; a missing default is not.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path: path.clone(), source })?;
    let cfg = serde_yaml::from_str(&s).map_err(|source| ConfigError::Parse { path, source })?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_sections() {
        let mut f = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(
            f,
            "rest:\n  host: https://q.example.com\n  port: 6334\n  api_key: abc\nrpc:\n  host: in03.serverless.example.com\ncollections:\n  name: docs"
        )
        .expect("write");
        let cfg = load_config(Some(f.path())).expect("parse").expect("present");
        let rest = cfg.rest.expect("rest");
        assert_eq!(rest.host.as_deref(), Some("https://q.example.com"));
        assert_eq!(rest.port, Some(6334));
        assert_eq!(rest.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.rpc.and_then(|r| r.port), None);
        assert_eq!(cfg.collections.and_then(|c| c.name).as_deref(), Some("docs"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let err = load_config(Some(&dir.path().join("nope.yaml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn typos_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().expect("tmp");
        writeln!(f, "rest:\n  hots: x").expect("write");
        assert!(matches!(load_config(Some(f.path())), Err(ConfigError::Parse { .. })));
    }
}
