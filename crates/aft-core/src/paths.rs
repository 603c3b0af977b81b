//! Well-known locations and environment expansion

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};

/// Overrides the user configuration directory
pub const CONFIG_DIR_ENV: &str = "AFT_CONFIG_DIR";

/// Overrides the user data directory
pub const DATA_DIR_ENV: &str = "AFT_DATA_DIR";

/// File name of a package manifest
pub const PACKAGE_FILE: &str = "aft.yaml";

/// File name of the rendered compose manifest
pub const COMPOSE_FILE: &str = "compose.yaml";

/// File name of the environment file next to the compose manifest
pub const ENV_FILE: &str = ".env";

/// `$AFT_CONFIG_DIR`, else `<config dir>/aft`
pub fn user_config_dir() -> PathBuf {
    env_dir(CONFIG_DIR_ENV).unwrap_or_else(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aft")
    })
}

/// `$AFT_DATA_DIR`, else `<data dir>/aft`
pub fn user_data_dir() -> PathBuf {
    env_dir(DATA_DIR_ENV).unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aft")
    })
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Directory that receives the rendered output of a service
///
/// `<data>/etc/aft/<service>`
pub fn compose_dir(data_dir: &Path, service: &str) -> PathBuf {
    data_dir.join("etc").join("aft").join(service)
}

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("environment variable pattern is valid")
});

/// Expand `$VAR` and `${VAR}` references; unset variables expand to nothing
pub fn expand_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand variable references using a custom lookup
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ENV_VAR
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            lookup(name).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/aft".to_string()),
            "TAG" => Some("v2".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_braced_and_bare() {
        assert_eq!(expand_with("${HOME}/data", lookup), "/home/aft/data");
        assert_eq!(expand_with("$HOME/data:$TAG", lookup), "/home/aft/data:v2");
    }

    #[test]
    fn test_expand_unset_is_empty() {
        assert_eq!(expand_with("/srv/${MISSING}/x", lookup), "/srv//x");
    }

    #[test]
    fn test_expand_leaves_plain_text() {
        assert_eq!(expand_with("/srv/aft/etc", lookup), "/srv/aft/etc");
    }

    #[test]
    fn test_compose_dir_layout() {
        let dir = compose_dir(Path::new("/srv/aft"), "demo");
        assert_eq!(dir, PathBuf::from("/srv/aft/etc/aft/demo"));
    }
}
