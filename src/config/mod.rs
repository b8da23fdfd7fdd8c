pub mod parse;
pub mod types;

use std::path::{Path, PathBuf};

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{AlertRuleConfig, AlertType, ReadStart, WatchConfig};

/// Expands tilde (~) in paths to the user's home directory.
/// If the path starts with "~/" or is exactly "~", replaces it with the home directory.
/// Returns the path unchanged if it doesn't start with tilde or home directory cannot be determined.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/logs/app.jsonl"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("logs/app.jsonl"));
        }
    }

    #[test]
    fn test_expand_tilde_alone() {
        let expanded = expand_tilde(Path::new("~"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home);
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        assert_eq!(
            expand_tilde(Path::new("/var/log/app.jsonl")),
            Path::new("/var/log/app.jsonl")
        );
        assert_eq!(
            expand_tilde(Path::new("relative/app.jsonl")),
            Path::new("relative/app.jsonl")
        );
    }
}
