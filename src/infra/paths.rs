// src/infra/paths.rs — Config path resolution
//
// RESEARCH_STREAM_HOME overrides everything. Otherwise the platform config
// directory (XDG_CONFIG_HOME/research-stream on Linux) is used.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Returns the RESEARCH_STREAM_HOME override, if set.
fn home_override() -> Option<PathBuf> {
    std::env::var_os("RESEARCH_STREAM_HOME").map(PathBuf::from)
}

/// Configuration directory.
///
/// Falls back to `./.research-stream` when no home directory can be determined
/// (minimal containers, some CI runners).
pub fn config_dir() -> PathBuf {
    if let Some(home) = home_override() {
        return home;
    }
    ProjectDirs::from("", "", "research-stream")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".research-stream"))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_lives_in_config_dir() {
        let path = config_file_path();
        assert_eq!(path.file_name().unwrap(), "config.toml");
        assert_eq!(path.parent().unwrap(), config_dir());
    }
}
