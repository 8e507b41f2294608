// Configuration loading and parsing (slatecheck.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::classify::Thresholds;
use crate::contest::{ContestInput, PayoutCurve};
use crate::sidecar::LoadOptions;

const CONFIG_FILE: &str = "slatecheck.toml";

/// The shipped `defaults/slatecheck.toml`, for installs without a defaults
/// directory.
pub const BUILTIN_CONFIG: &str = include_str!("../../../defaults/slatecheck.toml");

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to write default config {path}: {source}")]
    SeedError {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Contest used until one is restored or embedded in a pack.
    pub contest: ContestInput,
    pub thresholds: Thresholds,
    pub sidecar: SidecarConfig,
    pub db_path: String,
    /// Directory searched for `pipeline_*.json` packs.
    pub pack_dir: PathBuf,
}

impl Config {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sidecar: self.sidecar.enabled,
            timeout: Duration::from_secs(self.sidecar.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SidecarConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// slatecheck.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the whole file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    contest: ContestInput,
    #[serde(default)]
    thresholds: Thresholds,
    sidecar: SidecarConfig,
    storage: StorageSection,
    data: DataSection,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageSection {
    db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DataSection {
    pack_dir: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/slatecheck.toml` relative to `base_dir`.
/// Relative `pack_dir` values resolve against `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let pack_dir = PathBuf::from(&file.data.pack_dir);
    let config = Config {
        contest: file.contest,
        thresholds: file.thresholds,
        sidecar: file.sidecar,
        db_path: file.storage.db_path,
        pack_dir: if pack_dir.is_absolute() {
            pack_dir
        } else {
            base_dir.join(pack_dir)
        },
    };

    validate(&config)?;

    Ok(config)
}

/// Write `config/slatecheck.toml` if it is missing, taking the text from
/// `defaults/slatecheck.toml` when the base directory ships one and from
/// [`BUILTIN_CONFIG`] otherwise. Returns the path written, or `None` when a
/// config was already in place. An existing config is never touched.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.exists() {
        return Ok(None);
    }

    let shipped = base_dir.join("defaults").join(CONFIG_FILE);
    let text = match std::fs::read_to_string(&shipped) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => BUILTIN_CONFIG.to_string(),
        Err(source) => {
            return Err(ConfigError::SeedError {
                path: shipped,
                source,
            })
        }
    };

    let config_dir = base_dir.join("config");
    std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::SeedError {
        path: config_dir,
        source,
    })?;
    std::fs::write(&target, text).map_err(|source| ConfigError::SeedError {
        path: target.clone(),
        source,
    })?;
    Ok(Some(target))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_contest(&config.contest)?;

    let t = &config.thresholds;
    let ratio_fields: &[(&str, f64)] = &[
        ("thresholds.strong_rake_multiple", t.strong_rake_multiple),
        ("thresholds.ownership_baseline", t.ownership_baseline),
        ("thresholds.over_aligned_ratio", t.over_aligned_ratio),
        ("thresholds.contrarian_ratio", t.contrarian_ratio),
        ("thresholds.clean_ratio", t.clean_ratio),
        ("thresholds.mixed_ratio", t.mixed_ratio),
    ];
    for (name, val) in ratio_fields {
        if !val.is_finite() || *val <= 0.0 {
            return Err(invalid(name, format!("must be > 0, got {val}")));
        }
    }
    if !t.moderate_floor.is_finite() {
        return Err(invalid("thresholds.moderate_floor", "must be a finite number"));
    }
    if t.contrarian_ratio >= t.over_aligned_ratio {
        return Err(invalid(
            "thresholds.contrarian_ratio",
            format!(
                "must be below over_aligned_ratio ({}), got {}",
                t.over_aligned_ratio, t.contrarian_ratio
            ),
        ));
    }
    if t.mixed_ratio > t.clean_ratio {
        return Err(invalid(
            "thresholds.mixed_ratio",
            format!(
                "must not exceed clean_ratio ({}), got {}",
                t.clean_ratio, t.mixed_ratio
            ),
        ));
    }

    if config.sidecar.timeout_secs == 0 {
        return Err(invalid("sidecar.timeout_secs", "must be greater than 0"));
    }
    if config.db_path.trim().is_empty() {
        return Err(invalid("storage.db_path", "must not be empty"));
    }

    Ok(())
}

/// Range checks shared by the config file and command-line overrides.
pub fn validate_contest(contest: &ContestInput) -> Result<(), ConfigError> {
    if !contest.entry_fee.is_finite() || contest.entry_fee < 0.0 {
        return Err(invalid(
            "contest.entry_fee",
            format!("must be >= 0, got {}", contest.entry_fee),
        ));
    }
    if !contest.prize_pool.is_finite() || contest.prize_pool < 0.0 {
        return Err(invalid(
            "contest.prize_pool",
            format!("must be >= 0, got {}", contest.prize_pool),
        ));
    }
    match &contest.payout {
        PayoutCurve::TopFraction { fraction } => {
            if !(*fraction > 0.0 && *fraction <= 1.0) {
                return Err(invalid(
                    "contest.payout.fraction",
                    format!("must be in (0, 1], got {fraction}"),
                ));
            }
        }
        PayoutCurve::FlatTopN { .. } => {}
        PayoutCurve::Tiers { tiers } => {
            if let Some(t) = tiers.iter().find(|t| t.min_rank == 0 || t.min_rank > t.max_rank) {
                return Err(invalid(
                    "contest.payout.tiers",
                    format!("invalid rank range {}..={}", t.min_rank, t.max_rank),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A temp base dir whose config is the shipped default with `edit`
    /// applied.
    fn base_with(edit: impl Fn(String) -> String) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE), edit(BUILTIN_CONFIG.to_string())).unwrap();
        tmp
    }

    fn expect_invalid(edit: impl Fn(String) -> String, field: &str) {
        let tmp = base_with(edit);
        match load_config_from(tmp.path()) {
            Err(ConfigError::ValidationError { field: f, .. }) => assert_eq!(f, field),
            other => panic!("expected validation error on {field}, got {other:?}"),
        }
    }

    #[test]
    fn load_shipped_defaults() {
        let tmp = base_with(|s| s);
        let config = load_config_from(tmp.path()).expect("defaults should load");

        assert_eq!(config.contest, ContestInput::default());
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.sidecar.enabled);
        assert_eq!(config.sidecar.timeout_secs, 10);
        assert_eq!(config.db_path, "slatecheck.db");
        assert_eq!(config.pack_dir, tmp.path().join("data"));
        assert_eq!(config.load_options(), LoadOptions::default());
    }

    #[test]
    fn seeds_from_defaults_dir_once() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("defaults")).unwrap();
        let shipped = BUILTIN_CONFIG.replace("timeout_secs = 10", "timeout_secs = 4");
        fs::write(tmp.path().join("defaults").join(CONFIG_FILE), shipped).unwrap();

        let written = ensure_config_file(tmp.path()).unwrap();
        assert_eq!(written, Some(tmp.path().join("config").join(CONFIG_FILE)));
        assert_eq!(ensure_config_file(tmp.path()).unwrap(), None);
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.sidecar.timeout_secs, 4);
    }

    #[test]
    fn seeds_builtin_when_no_defaults_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ensure_config_file(tmp.path()).unwrap().is_some());
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        assert_eq!(config.sidecar.timeout_secs, 10);
    }

    #[test]
    fn existing_config_is_left_alone() {
        let tmp = base_with(|s| s.replace("entry_fee = 20.0", "entry_fee = 7.0"));
        fs::create_dir_all(tmp.path().join("defaults")).unwrap();
        fs::write(tmp.path().join("defaults").join(CONFIG_FILE), BUILTIN_CONFIG).unwrap();

        assert_eq!(ensure_config_file(tmp.path()).unwrap(), None);
        let config = load_config_from(tmp.path()).unwrap();
        assert!((config.contest.entry_fee - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn syntax_error_is_a_parse_error() {
        let tmp = base_with(|s| s.replace("[sidecar]", "[sidecar"));
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn thresholds_section_is_optional() {
        let tmp = base_with(|s| {
            let start = s.find("[thresholds]").unwrap();
            let end = s.find("[sidecar]").unwrap();
            format!("{}{}", &s[..start], &s[end..])
        });
        let config = load_config_from(tmp.path()).unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
    }

    #[test]
    fn camel_case_contest_keys_accepted() {
        let tmp = base_with(|s| s.replace("entry_fee = 20.0", "entryFee = 3.0"));
        let config = load_config_from(tmp.path()).unwrap();
        assert!((config.contest.entry_fee - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_negative_fee() {
        expect_invalid(
            |s| s.replace("entry_fee = 20.0", "entry_fee = -1.0"),
            "contest.entry_fee",
        );
    }

    #[test]
    fn rejects_zero_payout_fraction() {
        expect_invalid(
            |s| s.replace("fraction = 0.2", "fraction = 0.0"),
            "contest.payout.fraction",
        );
    }

    #[test]
    fn rejects_inverted_alignment_ratios() {
        expect_invalid(
            |s| s.replace("contrarian_ratio = 0.7", "contrarian_ratio = 1.5"),
            "thresholds.contrarian_ratio",
        );
    }

    #[test]
    fn rejects_mixed_above_clean() {
        expect_invalid(
            |s| s.replace("mixed_ratio = 1.2", "mixed_ratio = 1.4"),
            "thresholds.mixed_ratio",
        );
    }

    #[test]
    fn rejects_zero_baseline() {
        expect_invalid(
            |s| s.replace("ownership_baseline = 100.0", "ownership_baseline = 0.0"),
            "thresholds.ownership_baseline",
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        expect_invalid(
            |s| s.replace("timeout_secs = 10", "timeout_secs = 0"),
            "sidecar.timeout_secs",
        );
    }
}
