use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::BotwireConfig,
};

/// Config file names probed in every search directory, in order.
const CONFIG_FILENAMES: &[&str] = &[
    "botwire.toml",
    "botwire.yaml",
    "botwire.yml",
    "botwire.json",
];

/// Read, env-substitute, and parse a config file. The format follows the
/// file extension; files without one are read as TOML.
pub fn load_config(path: &Path) -> Result<BotwireConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&substitute_env(&raw), path)
}

/// Load the first config file found in `./` or the user config dir.
///
/// A missing or unreadable file yields [`BotwireConfig::default()`].
pub fn discover_and_load() -> BotwireConfig {
    let mut search = vec![PathBuf::from(".")];
    search.extend(config_dir());

    let Some(path) = find_config_file(&search) else {
        debug!("no config file found, using defaults");
        return BotwireConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    load_config(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
        BotwireConfig::default()
    })
}

/// User-level config directory, e.g. `~/.config/botwire/`.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "botwire").map(|d| d.config_dir().to_path_buf())
}

fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.is_file())
}

fn parse(raw: &str, path: &Path) -> Result<BotwireConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "botwire.toml",
            "[eventhub]\nnamespace = \"yothub-ns\"\nhub_name = \"yot\"\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.eventhub.namespace.as_deref(), Some("yothub-ns"));
        assert_eq!(cfg.eventhub.hub_name.as_deref(), Some("yot"));
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(
            dir.path(),
            "botwire.yml",
            "eventhub:\n  publisher: bot\ndirectline:\n  enabled: false\n",
        );
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.eventhub.publisher.as_deref(), Some("bot"));
        assert!(!cfg.directline.enabled);

        let json = write(
            dir.path(),
            "botwire.json",
            r#"{"eventhub":{"key_name":"send","key":"k"},"metrics":{"enabled":true}}"#,
        );
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.eventhub.key_name.as_deref(), Some("send"));
        assert_eq!(cfg.eventhub.key.unwrap().expose_secret(), "k");
        assert!(cfg.metrics.enabled);
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "botwire.ini", "x=1");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { ref extension } if extension == "ini"));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "botwire.toml", "[eventhub\n");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert!(err.to_string().contains("botwire.toml"));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn earlier_search_dirs_win() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write(second.path(), "botwire.toml", "");
        let json = write(first.path(), "botwire.json", "{}");
        write(first.path(), "botwire.yaml", "{}");

        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        let found = find_config_file(&dirs).unwrap();
        assert_eq!(found, first.path().join("botwire.yaml"));
        assert_ne!(found, json);

        let empty = tempfile::tempdir().unwrap();
        assert!(find_config_file(&[empty.path().to_path_buf()]).is_none());
    }
}
