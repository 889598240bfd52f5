//! CLI argument definitions for the Inmo server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;

/// Inmo - conversational property search over a listings catalog.
#[derive(Parser, Debug, Default)]
#[command(name = "inmo", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Listings feed (JSON array) to load at startup.
    #[arg(short = 'f', long = "feed")]
    pub feed: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > INMO_CONFIG env var > ~/.inmo/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("INMO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > INMO_PORT env var > config file value > 8000.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        pick_port(self.port, std::env::var("INMO_PORT").ok(), config_port)
    }

    /// Data directory override, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Log level override, if given.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Feed path: --feed flag, else the configured one.
    pub fn resolve_feed(&self, config_feed: Option<&str>) -> Option<PathBuf> {
        self.feed
            .clone()
            .or_else(|| config_feed.filter(|f| !f.trim().is_empty()).map(PathBuf::from))
    }
}

fn pick_port(flag: Option<u16>, env: Option<String>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|v| v.trim().parse::<u16>().ok()) {
        return p;
    }
    if config_port != 0 {
        return config_port;
    }
    DEFAULT_PORT
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".inmo").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".inmo").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let args = CliArgs::try_parse_from([
            "inmo",
            "-c",
            "/etc/inmo.toml",
            "-p",
            "9000",
            "-d",
            "/var/inmo",
            "-l",
            "debug",
            "--feed",
            "props.json",
        ])
        .unwrap();

        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/inmo.toml"));
        assert_eq!(args.resolve_port(8000), 9000);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/var/inmo"));
        assert_eq!(args.resolve_log_level().as_deref(), Some("debug"));
        assert_eq!(args.resolve_feed(Some("other.json")), Some(PathBuf::from("props.json")));
    }

    #[test]
    fn test_pick_port_priority() {
        assert_eq!(pick_port(Some(1), Some("2".to_string()), 3), 1);
        assert_eq!(pick_port(None, Some("2".to_string()), 3), 2);
        assert_eq!(pick_port(None, Some("nope".to_string()), 3), 3);
        assert_eq!(pick_port(None, None, 0), DEFAULT_PORT);
    }

    #[test]
    fn test_resolve_feed_from_config() {
        let args = CliArgs::default();
        assert_eq!(args.resolve_feed(Some("props.json")), Some(PathBuf::from("props.json")));
        assert_eq!(args.resolve_feed(Some("  ")), None);
        assert_eq!(args.resolve_feed(None), None);
    }
}
