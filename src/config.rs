use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use indexmap::IndexMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "binmgr";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOCAL_CONFIG_FILE_NAME: &str = "binmgr_config.json";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/binmgr/config.json";
pub const TEMP_DIR_NAME: &str = ".binmgr_temp";
pub const VERSION_FILE_NAME: &str = "binmgr_versions.json";
pub const LOG_DIR_NAME: &str = "logs";

pub const CONFIG_ENV: &str = "BINMGR_CONFIG";
pub const BIN_DIR_ENV: &str = "BINMGR_BIN_DIR";
/// Skips `uname -m` and treats the host as this architecture.
pub const ARCH_ENV: &str = "BINMGR_ARCH";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    programs: IndexMap<String, String>,
    #[serde(default)]
    bin_dir: Option<PathBuf>,
}

/// Programs to keep installed and where everything lives on disk.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    /// Program name to `owner/repo`, in file order.
    pub programs: IndexMap<String, String>,
    pub bin_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub version_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn load(provided: Option<&Path>) -> Result<Self> {
        let path = find_config(provided)?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read config file at {}", path.display()))?;
        let env_bin_dir = env::var_os(BIN_DIR_ENV).map(PathBuf::from);
        Self::parse(&content, &path, env_bin_dir)
    }

    pub fn parse(content: &str, path: &Path, env_bin_dir: Option<PathBuf>) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(content)
            .with_context(|| format!("Could not parse config file {} as JSON", path.display()))?;

        for (program, repo) in &file.programs {
            validate_repo(repo).with_context(|| format!("Invalid entry for '{}'", program))?;
        }

        let bin_dir = match env_bin_dir.or(file.bin_dir) {
            Some(dir) => dir,
            None => default_bin_dir()?,
        };
        tracing::debug!("Bin directory: {}", bin_dir.display());

        Ok(Self {
            path: path.to_path_buf(),
            programs: file.programs,
            temp_dir: bin_dir.join(TEMP_DIR_NAME),
            version_file: bin_dir.join(VERSION_FILE_NAME),
            log_dir: bin_dir.join(LOG_DIR_NAME),
            bin_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.bin_dir)?;
        fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }

    pub fn cleanup(&self) -> Result<()> {
        if self.temp_dir.exists() {
            fs::remove_dir_all(&self.temp_dir).with_context(|| {
                format!("Could not remove temp directory {}", self.temp_dir.display())
            })?;
        }
        Ok(())
    }
}

fn validate_repo(repo: &str) -> Result<()> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => bail!("'{}' is not an owner/repo pair", repo),
    }
}

fn default_bin_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not determine home directory"))?
        .join(".local")
        .join("bin"))
}

/// Locations searched for the config file, in priority order.
pub fn candidate_locations(provided: Option<&Path>, env_path: Option<PathBuf>) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(path) = provided {
        locations.push(path.to_path_buf());
    }
    if let Some(path) = env_path {
        locations.push(path);
    }
    if let Ok(cwd) = env::current_dir() {
        locations.push(cwd.join(LOCAL_CONFIG_FILE_NAME));
    }
    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join(APP_NAME).join(CONFIG_FILE_NAME));
    }
    locations.push(PathBuf::from(SYSTEM_CONFIG_PATH));
    locations
}

pub fn find_config(provided: Option<&Path>) -> Result<PathBuf> {
    let env_path = env::var_os(CONFIG_ENV).map(PathBuf::from);
    let locations = candidate_locations(provided, env_path);

    for path in &locations {
        if path.is_file() {
            tracing::debug!("Config file path: {}", path.display());
            return Ok(path.clone());
        }
    }

    let searched: Vec<String> = locations.iter().map(|p| p.display().to_string()).collect();
    Err(anyhow!(
        "No valid configuration file found (searched: {})",
        searched.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_programs_and_derives_paths() {
        let config = Config::parse(
            r#"{"programs": {"fd": "sharkdp/fd", "rg": "BurntSushi/ripgrep"}}"#,
            Path::new("/tmp/binmgr_config.json"),
            Some(PathBuf::from("/opt/bin")),
        )
        .unwrap();

        let names: Vec<_> = config.programs.keys().cloned().collect();
        assert_eq!(names, vec!["fd", "rg"]);

        let reordered = Config::parse(
            r#"{"programs": {"rg": "BurntSushi/ripgrep", "bat": "sharkdp/bat", "fd": "sharkdp/fd"}}"#,
            Path::new("c.json"),
            Some(PathBuf::from("/opt/bin")),
        )
        .unwrap();
        let names: Vec<_> = reordered.programs.keys().cloned().collect();
        assert_eq!(names, vec!["rg", "bat", "fd"]);
        assert_eq!(config.programs["rg"], "BurntSushi/ripgrep");
        assert_eq!(config.bin_dir, PathBuf::from("/opt/bin"));
        assert_eq!(config.temp_dir, PathBuf::from("/opt/bin/.binmgr_temp"));
        assert_eq!(config.version_file, PathBuf::from("/opt/bin/binmgr_versions.json"));
        assert_eq!(config.log_dir, PathBuf::from("/opt/bin/logs"));
    }

    #[test]
    fn env_bin_dir_beats_file_setting() {
        let content = r#"{"programs": {}, "bin_dir": "/srv/tools"}"#;
        let path = Path::new("c.json");

        let from_file = Config::parse(content, path, None).unwrap();
        assert_eq!(from_file.bin_dir, PathBuf::from("/srv/tools"));

        let from_env = Config::parse(content, path, Some(PathBuf::from("/env/bin"))).unwrap();
        assert_eq!(from_env.bin_dir, PathBuf::from("/env/bin"));
    }

    #[test]
    fn missing_programs_key_means_nothing_to_do() {
        let config = Config::parse("{}", Path::new("c.json"), Some(PathBuf::from("/b"))).unwrap();
        assert!(config.programs.is_empty());
    }

    #[test]
    fn rejects_malformed_repo() {
        for repo in ["ripgrep", "/ripgrep", "BurntSushi/", "a/b/c"] {
            let content = format!(r#"{{"programs": {{"rg": "{}"}}}}"#, repo);
            let err = Config::parse(&content, Path::new("c.json"), Some(PathBuf::from("/b")))
                .unwrap_err();
            assert!(format!("{:#}", err).contains("'rg'"), "{}", repo);
        }
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(Config::parse("programs: []", Path::new("c.json"), None).is_err());
    }

    #[test]
    fn provided_path_is_searched_first() {
        let temp = TempDir::new().unwrap();
        let provided = temp.path().join("mine.json");
        fs::write(&provided, "{}").unwrap();

        let locations = candidate_locations(Some(&provided), Some(PathBuf::from("/env.json")));
        assert_eq!(locations[0], provided);
        assert_eq!(locations[1], PathBuf::from("/env.json"));
        assert_eq!(locations.last().unwrap(), &PathBuf::from(SYSTEM_CONFIG_PATH));

        assert_eq!(find_config(Some(&provided)).unwrap(), provided);
    }

    #[test]
    fn cleanup_removes_temp_dir() {
        let temp = TempDir::new().unwrap();
        let config = Config::parse("{}", Path::new("c.json"), Some(temp.path().join("bin"))).unwrap();

        config.ensure_directories().unwrap();
        assert!(config.temp_dir.is_dir());
        fs::write(config.temp_dir.join("leftover"), b"x").unwrap();

        config.cleanup().unwrap();
        assert!(!config.temp_dir.exists());
        assert!(config.bin_dir.is_dir());
    }
}
