use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

pub const DEFAULT_CONFIG_FILE: &str = "isbn-harvest.json";
pub const DEFAULT_DATABASE: &str = "book_database.db";
pub const DEFAULT_TOKEN_FILE: &str = "dnb_key.txt";
pub const ACCESS_TOKEN_ENV: &str = "DNB_ACCESS_TOKEN";
pub const DEFAULT_SRU_URL_TEMPLATE: &str = "http://services.dnb.de/sru/dnb?version=1.1&operation=searchRetrieve&query=isbn%3D{isbn}&recordSchema=MARC21-xml&accessToken={access_token}";
pub const DEFAULT_BLURB_LINK_PATTERN: &str = r"deposit\.d-?nb\.de";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub access_token_file: Option<String>,
    #[serde(default)]
    pub sru_url_template: Option<String>,
    #[serde(default)]
    pub blurb_link_pattern: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database: Utf8PathBuf,
    pub access_token_file: Utf8PathBuf,
    pub sru_url_template: String,
    pub blurb_link_pattern: Regex,
    pub timeout: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `isbn-harvest.json` in the working directory when present.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let pattern = config
            .blurb_link_pattern
            .unwrap_or_else(|| DEFAULT_BLURB_LINK_PATTERN.to_string());
        let blurb_link_pattern =
            Regex::new(&pattern).map_err(|err| HarvestError::InvalidPattern(err.to_string()))?;

        Ok(ResolvedConfig {
            database: Utf8PathBuf::from(config.database.unwrap_or_else(|| DEFAULT_DATABASE.into())),
            access_token_file: Utf8PathBuf::from(
                config
                    .access_token_file
                    .unwrap_or_else(|| DEFAULT_TOKEN_FILE.into()),
            ),
            sru_url_template: config
                .sru_url_template
                .unwrap_or_else(|| DEFAULT_SRU_URL_TEMPLATE.to_string()),
            blurb_link_pattern,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

/// Environment first, then the token file. The token is not validated.
pub fn load_access_token(token_file: &Utf8Path) -> Result<String, HarvestError> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            return Ok(token.trim().to_string());
        }
    }
    read_token_file(token_file)
}

pub fn read_token_file(token_file: &Utf8Path) -> Result<String, HarvestError> {
    let content = fs::read_to_string(token_file.as_std_path())
        .map_err(|_| HarvestError::MissingAccessToken(token_file.to_path_buf()))?;
    let token = content.trim();
    if token.is_empty() {
        return Err(HarvestError::MissingAccessToken(token_file.to_path_buf()));
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.database.as_str(), DEFAULT_DATABASE);
        assert_eq!(resolved.access_token_file.as_str(), DEFAULT_TOKEN_FILE);
        assert_eq!(resolved.timeout, Duration::from_secs(60));
        assert!(resolved.sru_url_template.contains("{isbn}"));
    }

    #[test]
    fn default_pattern_matches_deposit_links() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        let pattern = &resolved.blurb_link_pattern;
        assert!(pattern.is_match(
            "http://deposit.dnb.de/cgi-bin/dokserv?id=4189236&prov=M&dok_var=1&dok_ext=htm"
        ));
        assert!(pattern.is_match("https://deposit.d-nb.de/cgi-bin/dokserv?id=7d1a"));
        assert!(!pattern.is_match("https://d-nb.info/1012345678/04"));
    }
}
