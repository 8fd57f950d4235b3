use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};

/// Poll interval, in milliseconds, used by `ReplicatedFs::get`.
pub const POLL_INTERVAL_KEY: &str = "sharefs.poll.interval.ms";

/// String key/value configuration consumed by the file system.
///
/// Keys of interest:
/// - `<namespace>.sharegroups.names` - comma-separated group names to preload
/// - `<namespace>.sharegroup.<name>` - semicolon-separated location list
/// - `sharefs.poll.interval.ms` - get() poll interval (default 1000)
/// - `sharefs.remote.cp` / `sharefs.remote.rm` / `sharefs.remote.mkdir` -
///   remote transport command templates
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    /// Parse `key=value` lines. Blank lines and `#` comments are skipped;
    /// a non-blank line without `=` is a configuration error.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut config = Config::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match trimmed.split_once('=') {
                Some((key, value)) => {
                    config.set(key.trim(), value.trim());
                }
                None => {
                    return Err(Error::config(format!(
                        "line {}: expected key=value, got '{}'",
                        lineno + 1,
                        trimmed
                    )));
                }
            }
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Config::from_reader(std::io::BufReader::new(file))
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Integer value for `key`, or `default` when absent or unparseable.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Boolean value for `key`, or `default` when absent or unparseable.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}
