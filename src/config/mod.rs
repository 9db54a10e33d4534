//! Genesis configuration read from TOML.
//!
//! Supplies are written in whole tokens and scaled by `10^decimals` when the
//! configuration is turned into [`GenesisParams`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ledger::{
    Amount, GenesisParams, TokenMetadata, CREATOR_SUPPLY_TOKENS, DECIMALS, MAX_DECIMALS,
    POOL_SUPPLY_TOKENS,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenesisConfig {
    pub token: TokenSection,
    pub supply: SupplySection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenSection {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub description: String,
    /// Empty means no icon.
    pub icon_url: String,
}

impl Default for TokenSection {
    fn default() -> Self {
        let metadata = TokenMetadata::default();
        Self {
            name: metadata.name,
            symbol: metadata.symbol,
            decimals: DECIMALS,
            description: metadata.description,
            icon_url: String::new(),
        }
    }
}

/// Whole-token amounts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupplySection {
    pub creator: u64,
    pub pool: u64,
}

impl Default for SupplySection {
    fn default() -> Self {
        Self {
            creator: CREATOR_SUPPLY_TOKENS,
            pool: POOL_SUPPLY_TOKENS,
        }
    }
}

impl GenesisConfig {
    /// Load from `path`; without a path the defaults apply. A path that
    /// cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                Self::from_toml(&contents)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: GenesisConfig = toml::from_str(contents)?;
        config.to_params()?;
        Ok(config)
    }

    pub fn to_params(&self) -> Result<GenesisParams, ConfigError> {
        let token = &self.token;
        if token.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("token.symbol must not be empty".into()));
        }
        if token.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "token.decimals is {}, at most {MAX_DECIMALS} is supported",
                token.decimals
            )));
        }
        let scale = 10u64.pow(u32::from(token.decimals));
        let creator_supply = scale_tokens("supply.creator", self.supply.creator, scale)?;
        let pool_supply = scale_tokens("supply.pool", self.supply.pool, scale)?;
        if creator_supply.checked_add(pool_supply).is_none() {
            return Err(ConfigError::Invalid(
                "creator and pool supply together overflow u64".into(),
            ));
        }

        Ok(GenesisParams {
            metadata: TokenMetadata {
                name: token.name.clone(),
                symbol: token.symbol.clone(),
                decimals: token.decimals,
                description: token.description.clone(),
                icon_url: (!token.icon_url.is_empty()).then(|| token.icon_url.clone()),
            },
            creator_supply,
            pool_supply,
        })
    }
}

fn scale_tokens(field: &str, tokens: u64, scale: u64) -> Result<Amount, ConfigError> {
    tokens
        .checked_mul(scale)
        .ok_or_else(|| ConfigError::Invalid(format!("{field} overflows u64 once scaled")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::ledger::NOS_SCALE;

    #[test]
    fn defaults_match_genesis_constants() {
        let params = GenesisConfig::default().to_params().unwrap();
        assert_eq!(params, GenesisParams::default());
        assert_eq!(params.creator_supply, CREATOR_SUPPLY_TOKENS * NOS_SCALE);
        assert_eq!(params.metadata.icon_url, None);
    }

    #[test]
    fn no_path_yields_defaults() {
        assert_eq!(GenesisConfig::load(None).unwrap(), GenesisConfig::default());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GenesisConfig::load(Some(&dir.path().join("absent.toml"))),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[token]\nsymbol = \"TST\"\ndecimals = 2\nicon_url = \"https://x/icon.png\"\n\n[supply]\npool = 7"
        )
        .unwrap();
        let config = GenesisConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.token.name, "NOS");
        assert_eq!(config.supply.creator, CREATOR_SUPPLY_TOKENS);

        let params = config.to_params().unwrap();
        assert_eq!(params.pool_supply, 700);
        assert_eq!(params.metadata.symbol, "TST");
        assert_eq!(params.metadata.icon_url.as_deref(), Some("https://x/icon.png"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            GenesisConfig::from_toml("[token]\nsymbol = \"  \""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GenesisConfig::from_toml("[token]\ndecimals = 20"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GenesisConfig::from_toml("[supply]\ncreator = 100000000000000000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GenesisConfig::from_toml(
                "[token]\ndecimals = 1\n[supply]\ncreator = 1000000000000000000\npool = 900000000000000000"
            ),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GenesisConfig::from_toml("[token\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
