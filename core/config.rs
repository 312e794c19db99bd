use crate::error::{AppError, Result};
use crate::gather::EncodingStrategy;
use crate::output_formats::TreeStyle;
use byte_unit::Byte;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILENAME: &str = ".ctxmd.toml";
pub const DEFAULT_IGNORE_FILE: &str = ".context.ignore";
pub const DEFAULT_OUTPUT_FILE: &str = "context.md";
pub const DEFAULT_MAX_SIZE: u64 = 102_400;

/// On-disk configuration. Every field is optional so that CLI flags, the
/// config file and the built-in defaults can be layered in that order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub ignore_file: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub max_size: Option<SizeSetting>,
    #[serde(default)]
    pub context_file: Option<PathBuf>,
    #[serde(default)]
    pub builtin_ignore: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TreeConfig {
    #[serde(default)]
    pub style: Option<TreeStyle>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub non_utf8: Option<EncodingStrategy>,
}

/// `max_size = 102400` or `max_size = "100KiB"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SizeSetting {
    Bytes(u64),
    Text(String),
}

impl SizeSetting {
    pub fn to_bytes(&self) -> Result<u64> {
        match self {
            SizeSetting::Bytes(n) => Ok(*n),
            SizeSetting::Text(s) => parse_size(s),
        }
    }
}

/// Parses a byte count with an optional unit suffix (`2048`, `100KB`, `1MiB`).
pub fn parse_size(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::SizeParse("size must not be empty".to_string()));
    }
    let byte = Byte::from_str(trimmed).map_err(|e| {
        AppError::SizeParse(format!(
            "Invalid size '{}': {}. Use a byte count or units like KB, KiB, MB.",
            trimmed, e
        ))
    })?;
    Ok(byte.as_u64())
}

/// Fully resolved settings for one run, passed explicitly to every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target_dir: PathBuf,
    pub ignore_file: PathBuf,
    pub output: PathBuf,
    pub max_size: u64,
    pub context_file: Option<PathBuf>,
    pub builtin_ignore: bool,
    pub tree_style: TreeStyle,
    pub encoding: EncodingStrategy,
}

impl Config {
    pub fn determine_target_dir(cli_target_dir: Option<&Path>) -> Result<PathBuf> {
        let path_to_resolve = match cli_target_dir {
            Some(p) => expand_path(p),
            None => PathBuf::from("."),
        };

        if !path_to_resolve.exists() {
            return Err(AppError::TargetDir {
                path: path_to_resolve,
                reason: "does not exist".to_string(),
            });
        }
        if !path_to_resolve.is_dir() {
            return Err(AppError::TargetDir {
                path: path_to_resolve,
                reason: "is not a directory".to_string(),
            });
        }

        path_to_resolve
            .canonicalize()
            .map_err(|e| AppError::TargetDir {
                path: path_to_resolve.clone(),
                reason: format!("cannot be resolved: {}", e),
            })
    }

    pub fn resolve_config_path(
        target_dir: &Path,
        cli_config_file: Option<&Path>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p) => {
                let path = expand_path(p);
                if !path.is_file() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = target_dir.join(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })?;
        if let Some(base) = config_path.parent() {
            config.rebase_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(toml_content: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_content).map_err(|e| {
            AppError::TomlParse(format!("{}. Check TOML syntax and structure.", e))
        })
    }

    /// Relative paths written in a config file are relative to that file.
    fn rebase_paths(&mut self, base: &Path) {
        let rebase = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                let expanded = expand_path(path);
                *path = if expanded.is_relative() {
                    base.join(expanded)
                } else {
                    expanded
                };
            }
        };
        rebase(&mut self.general.ignore_file);
        rebase(&mut self.general.output);
        rebase(&mut self.general.context_file);
    }

    pub fn into_run_config(self, target_dir: PathBuf) -> Result<RunConfig> {
        let max_size = match &self.general.max_size {
            Some(setting) => setting.to_bytes()?,
            None => DEFAULT_MAX_SIZE,
        };

        let ignore_file = resolve_ignore_file(
            &target_dir,
            self.general
                .ignore_file
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_IGNORE_FILE)),
        );

        let output = expand_path(
            self.general
                .output
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_FILE)),
        );
        let output = if output.is_relative() {
            env::current_dir().map_err(AppError::Io)?.join(output)
        } else {
            output
        };

        let run = RunConfig {
            target_dir,
            ignore_file,
            output,
            max_size,
            context_file: self.general.context_file.as_deref().map(expand_path),
            builtin_ignore: self.general.builtin_ignore.unwrap_or(false),
            tree_style: self.tree.style.unwrap_or_default(),
            encoding: self.source.non_utf8.unwrap_or_default(),
        };
        log::debug!("Resolved run configuration: {:?}", run);
        Ok(run)
    }
}

/// A relative ignore file is looked up in the working directory first, then
/// inside the target directory.
fn resolve_ignore_file(target_dir: &Path, configured: &Path) -> PathBuf {
    let expanded = expand_path(configured);
    if expanded.is_absolute() || expanded.exists() {
        return expanded;
    }
    let in_target = target_dir.join(&expanded);
    if in_target.exists() {
        log::debug!(
            "Ignore file '{}' not in working directory, using {}",
            expanded.display(),
            in_target.display()
        );
        return in_target;
    }
    expanded
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_size_accepts_plain_and_unit_values() {
        assert_eq!(parse_size("102400").unwrap(), 102_400);
        assert_eq!(parse_size("100KiB").unwrap(), 102_400);
        assert_eq!(parse_size(" 1MB ").unwrap(), 1_000_000);
        assert!(parse_size("").is_err());
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn toml_config_accepts_integer_or_string_size() {
        let config = Config::from_toml_str(
            "[general]\nmax_size = 2048\n[tree]\nstyle = \"ascii\"\n[source]\nnon_utf8 = \"skip\"\n",
        )
        .unwrap();
        assert_eq!(config.general.max_size, Some(SizeSetting::Bytes(2048)));
        assert_eq!(config.tree.style, Some(TreeStyle::Ascii));
        assert_eq!(config.source.non_utf8, Some(EncodingStrategy::Skip));

        let config = Config::from_toml_str("[general]\nmax_size = \"2KiB\"\n").unwrap();
        assert_eq!(config.general.max_size.unwrap().to_bytes().unwrap(), 2048);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[general]\nmax_sise = 1\n").unwrap_err();
        assert!(matches!(err, AppError::TomlParse(_)));
    }

    #[test]
    fn missing_target_dir_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");
        let err = Config::determine_target_dir(Some(&missing)).unwrap_err();
        assert!(matches!(err, AppError::TargetDir { .. }));

        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = Config::determine_target_dir(Some(&file)).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn config_file_paths_are_relative_to_the_file() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join(DEFAULT_CONFIG_FILENAME);
        fs::write(
            &config_path,
            "[general]\nignore_file = \"rules.ignore\"\ncontext_file = \"/abs/notes.md\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(
            config.general.ignore_file,
            Some(temp.path().join("rules.ignore"))
        );
        assert_eq!(
            config.general.context_file,
            Some(PathBuf::from("/abs/notes.md"))
        );
    }

    #[test]
    fn default_config_file_is_found_in_target_dir() {
        let temp = tempdir().unwrap();
        assert_eq!(
            Config::resolve_config_path(temp.path(), None, false).unwrap(),
            None
        );

        fs::write(temp.path().join(DEFAULT_CONFIG_FILENAME), "").unwrap();
        assert_eq!(
            Config::resolve_config_path(temp.path(), None, false).unwrap(),
            Some(temp.path().join(DEFAULT_CONFIG_FILENAME))
        );
        assert_eq!(
            Config::resolve_config_path(temp.path(), None, true).unwrap(),
            None
        );

        let missing = temp.path().join("other.toml");
        assert!(Config::resolve_config_path(temp.path(), Some(&missing), false).is_err());
    }

    #[test]
    fn run_config_applies_defaults() {
        let temp = tempdir().unwrap();
        let run = Config::default()
            .into_run_config(temp.path().to_path_buf())
            .unwrap();
        assert_eq!(run.max_size, DEFAULT_MAX_SIZE);
        assert!(run.output.is_absolute());
        assert!(run.output.ends_with(DEFAULT_OUTPUT_FILE));
        assert_eq!(run.context_file, None);
        assert!(!run.builtin_ignore);
        assert_eq!(run.tree_style, TreeStyle::Unicode);
        assert_eq!(run.encoding, EncodingStrategy::Lossy);
    }

    #[test]
    fn ignore_file_falls_back_to_target_dir() {
        let temp = tempdir().unwrap();
        let name = "ctxmd-test-fallback.ignore";
        fs::write(temp.path().join(name), "*.log\n").unwrap();
        let resolved = resolve_ignore_file(temp.path(), Path::new(name));
        assert_eq!(resolved, temp.path().join(name));
    }
}
