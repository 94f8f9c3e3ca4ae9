use std::env;
use std::path::PathBuf;

use crate::partition::DEFAULT_OFFSET;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON series file used by the command-line tools
    pub data_path: Option<PathBuf>,
    /// Promote missing-data conditions to errors
    pub strict: bool,
    pub default_offset: usize,
    pub default_agg: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_path: None,
            strict: false,
            default_offset: DEFAULT_OFFSET,
            default_agg: "min,max,avg".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        let defaults = Config::default();
        let data_path = match env::var("INDICATORS_DATA_PATH") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(env::VarError::NotPresent) => None,
            Err(e) => return Err(e),
        };

        Ok(Config {
            data_path,
            strict: env::var("INDICATORS_STRICT")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.strict),
            default_offset: env::var("INDICATORS_OFFSET_DAYS")
                .unwrap_or_else(|_| DEFAULT_OFFSET.to_string())
                .parse()
                .unwrap_or(DEFAULT_OFFSET),
            default_agg: env::var("INDICATORS_DEFAULT_AGG").unwrap_or(defaults.default_agg),
        })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.strict);
        assert_eq!(config.default_offset, 180);
        assert_eq!(config.default_agg, "min,max,avg");
        assert!(config.strict(true).strict);
    }
}
