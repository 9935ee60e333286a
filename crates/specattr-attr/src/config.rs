//! Attribution settings and named presets.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AttrError;

/// How impure calls inside specifications are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurityCheck {
    Off,
    #[default]
    Warn,
    Error,
}

/// Settings controlling which checks run and which rewrites are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrConfig {
    /// Synthesize runtime forms for quantified expressions.
    pub rac: bool,
    pub non_null_by_default: bool,
    pub purity: PurityCheck,
    pub check_visibility: bool,
    pub check_secrecy: bool,
    /// Catch-all type appended to defaulted `signals_only` clauses.
    pub unchecked_exception: String,
    /// Default a missing `accessible` clause to `\everything` (otherwise to
    /// `\nothing` for pure methods).
    pub default_accessible_everything: bool,
}

impl Default for AttrConfig {
    fn default() -> Self {
        Self {
            rac: false,
            non_null_by_default: true,
            purity: PurityCheck::Warn,
            check_visibility: true,
            check_secrecy: true,
            unchecked_exception: "RuntimeException".to_string(),
            default_accessible_everything: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    attribution: Option<AttrConfig>,
}

impl AttrConfig {
    /// Impure calls in specifications are errors.
    pub fn strict() -> Self {
        Self {
            purity: PurityCheck::Error,
            default_accessible_everything: false,
            ..Self::default()
        }
    }

    /// Default checks plus runtime forms for quantifiers.
    pub fn runtime_checking() -> Self {
        Self {
            rac: true,
            ..Self::default()
        }
    }

    /// Parse the `[attribution]` table of a TOML document; a missing table
    /// yields the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, AttrError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| AttrError::ConfigParse(e.to_string()))?;
        Ok(file.attribution.unwrap_or_default())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AttrError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AttrError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn presets() {
        let d = AttrConfig::default();
        assert!(!d.rac);
        assert_eq!(d.purity, PurityCheck::Warn);
        assert_eq!(d.unchecked_exception, "RuntimeException");
        assert_eq!(AttrConfig::strict().purity, PurityCheck::Error);
        assert!(AttrConfig::runtime_checking().rac);
    }

    #[test]
    fn partial_table_fills_defaults() {
        let cfg = AttrConfig::from_toml_str(
            r#"
            [attribution]
            rac = true
            purity = "off"
            "#,
        )
        .unwrap();
        assert!(cfg.rac);
        assert_eq!(cfg.purity, PurityCheck::Off);
        assert!(cfg.check_visibility);
    }

    #[test]
    fn missing_table_is_default() {
        let cfg = AttrConfig::from_toml_str("[other]\nx = 1\n").unwrap();
        assert_eq!(cfg, AttrConfig::default());
    }

    #[test]
    fn bad_value_is_parse_error() {
        let err = AttrConfig::from_toml_str("[attribution]\npurity = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, AttrError::ConfigParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[attribution]\nnon_null_by_default = false").unwrap();
        let cfg = AttrConfig::load(file.path()).unwrap();
        assert!(!cfg.non_null_by_default);

        let missing = AttrConfig::load(file.path().with_extension("absent"));
        assert!(matches!(missing, Err(AttrError::ConfigIo { .. })));
    }
}
