use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::net::SocketAddr;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yml");

/// File names searched for in the base directory when no explicit path is given, in order
const CONFIG_FILE_CANDIDATES: [&str; 4] = ["share-counts.toml", "share-counts.yml", "share-counts.yaml", "share-counts.json"];

const fn default_good_result_ttl() -> u64 {
    4 * 60
}

const fn default_bad_result_ttl() -> u64 {
    60
}

const fn default_pending_result_ttl() -> u64 {
    10
}

const fn default_unknown_count() -> i64 {
    -1
}

const fn default_request_timeout() -> u64 {
    10
}

const fn default_sweep_interval() -> u64 {
    60
}

const fn default_http_cache_max_age() -> u64 {
    4 * 60
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_twitter_base_url() -> String {
    "http://urls.api.twitter.com".to_string()
}

fn default_facebook_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_googleplus_base_url() -> String {
    "https://plusone.google.com".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seconds a successfully fetched count stays fresh
    #[serde(default = "default_good_result_ttl")]
    pub good_result_ttl: u64,

    /// Seconds the unknown count is served after a failed fetch
    #[serde(default = "default_bad_result_ttl")]
    pub bad_result_ttl: u64,

    /// Seconds an in-flight fetch is joined before a new one may be started
    #[serde(default = "default_pending_result_ttl")]
    pub pending_result_ttl: u64,

    /// Count reported for a network that could not be queried
    #[serde(default = "default_unknown_count")]
    pub unknown_count: i64,

    /// Transport timeout in seconds for a single upstream request
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Seconds between eviction sweeps, 0 disables sweeping
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: u64,

    /// `Cache-Control: max-age` of HTTP responses, in seconds
    #[serde(default = "default_http_cache_max_age")]
    pub http_cache_max_age: u64,

    /// Address the HTTP server listens on
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub providers: ProviderConfig,
}

/// Upstream endpoints of the built-in providers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[expect(clippy::struct_field_names, reason = "every field is a base URL")]
pub struct ProviderConfig {
    #[serde(default = "default_twitter_base_url")]
    pub twitter_base_url: String,

    #[serde(default = "default_facebook_base_url")]
    pub facebook_base_url: String,

    #[serde(default = "default_googleplus_base_url")]
    pub googleplus_base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            twitter_base_url: default_twitter_base_url(),
            facebook_base_url: default_facebook_base_url(),
            googleplus_base_url: default_googleplus_base_url(),
        }
    }
}

impl Config {
    /// Load configuration, returning the configuration along with any validation warnings.
    ///
    /// When `config_path` is `None`, the first of `share-counts.[toml|yml|yaml|json]` found in
    /// `base_dir` is used. When none exists, the default configuration is returned.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<(Self, Vec<String>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading share-counts configuration from {path}"))?;
            (path.clone(), text)
        } else {
            let mut found = None;
            for candidate in CONFIG_FILE_CANDIDATES {
                let path = base_dir.join(candidate);
                match fs::read_to_string(&path) {
                    Ok(text) => {
                        found = Some((path, text));
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_app_err_with(|| format!("reading share-counts configuration from {path}")),
                }
            }

            let Some(result) = found else {
                return Ok((Self::default(), Vec::new()));
            };
            result
        };

        let extension = final_path.extension().unwrap_or_default();
        let config: Self = match extension {
            "toml" => toml::from_str(&text).into_app_err_with(|| format!("parsing TOML configuration from {final_path}"))?,
            "yml" | "yaml" => serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing YAML configuration from {final_path}"))?,
            "json" => serde_json::from_str(&text).into_app_err_with(|| format!("parsing JSON configuration from {final_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        let mut warnings = Vec::new();
        config.validate(&mut warnings);
        Ok((config, warnings))
    }

    /// Save the configuration, picking the format from the file extension
    pub fn save(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();
        let text = match extension {
            "toml" => toml::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to TOML for saving to {output_path}"))?,
            "yml" | "yaml" => serde_yaml::to_string(self)
                .into_app_err_with(|| format!("serializing configuration to YAML for saving to {output_path}"))?,
            "json" => serde_json::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to JSON for saving to {output_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        fs::write(output_path, text).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
        Ok(())
    }

    /// Save the default configuration, keeping the explanatory comments when writing YAML
    pub fn save_default_with_comments(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();

        if matches!(extension, "yml" | "yaml") && *self == Self::default() {
            fs::write(output_path, DEFAULT_CONFIG_YAML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        } else {
            self.save(output_path)?;
        }

        Ok(())
    }

    /// Validate the configuration to detect settings that defeat the cache
    fn validate(&self, warnings: &mut Vec<String>) {
        if !(self.pending_result_ttl < self.bad_result_ttl && self.bad_result_ttl < self.good_result_ttl) {
            warnings.push(format!(
                "cache TTLs should satisfy pending_result_ttl < bad_result_ttl < good_result_ttl, got {} / {} / {}",
                self.pending_result_ttl, self.bad_result_ttl, self.good_result_ttl
            ));
        }

        if self.pending_result_ttl == 0 {
            warnings.push("pending_result_ttl is 0, concurrent requests for the same URL will not be coalesced".to_string());
        }

        if self.request_timeout == 0 {
            warnings.push("request_timeout is 0, every upstream request will time out".to_string());
        }

        if self.unknown_count >= 0 {
            warnings.push(format!(
                "unknown_count is {}, which cannot be told apart from a real share count",
                self.unknown_count
            ));
        }

        if self.listen.parse::<SocketAddr>().is_err() {
            warnings.push(format!("listen address '{}' is not a valid socket address", self.listen));
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            good_result_ttl: default_good_result_ttl(),
            bad_result_ttl: default_bad_result_ttl(),
            pending_result_ttl: default_pending_result_ttl(),
            unknown_count: default_unknown_count(),
            request_timeout: default_request_timeout(),
            sweep_interval: default_sweep_interval(),
            http_cache_max_age: default_http_cache_max_age(),
            listen: default_listen(),
            providers: ProviderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_default_yaml_matches_default() {
        let from_yaml: Config = serde_yaml::from_str(DEFAULT_CONFIG_YAML).unwrap();
        assert_eq!(from_yaml, Config::default());

        let mut warnings = Vec::new();
        from_yaml.validate(&mut warnings);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, warnings) = Config::load(&utf8_dir(&tmp), None).unwrap();
        assert_eq!(config, Config::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_discovers_toml_candidate() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8_dir(&tmp);
        fs::write(dir.join("share-counts.toml"), "good_result_ttl = 600\n[providers]\ntwitter_base_url = \"http://localhost:1\"\n").unwrap();

        let (config, warnings) = Config::load(&dir, None).unwrap();
        assert_eq!(config.good_result_ttl, 600);
        assert_eq!(config.bad_result_ttl, 60);
        assert_eq!(config.providers.twitter_base_url, "http://localhost:1");
        assert_eq!(config.providers.facebook_base_url, "https://graph.facebook.com");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_load_explicit_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = utf8_dir(&tmp).join("custom.json");
        fs::write(&path, r#"{ "unknown_count": -2, "request_timeout": 3 }"#).unwrap();

        let (config, _) = Config::load(&utf8_dir(&tmp), Some(&path)).unwrap();
        assert_eq!(config.unknown_count, -2);
        assert_eq!(config.request_timeout, 3);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = utf8_dir(&tmp).join("bad.yml");
        fs::write(&path, "cache_time: 5\n").unwrap();

        let result = Config::load(&utf8_dir(&tmp), Some(&path));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parsing YAML"));
    }

    #[test]
    fn test_load_rejects_unsupported_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = utf8_dir(&tmp).join("config.ini");
        fs::write(&path, "x=1").unwrap();

        let result = Config::load(&utf8_dir(&tmp), Some(&path));
        assert!(result.unwrap_err().to_string().contains("unsupported configuration file extension"));
    }

    #[test]
    fn test_validate_warns_on_ttl_order() {
        let config = Config {
            bad_result_ttl: 600,
            ..Config::default()
        };

        let mut warnings = Vec::new();
        config.validate(&mut warnings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("pending_result_ttl < bad_result_ttl < good_result_ttl"));
    }

    #[test]
    fn test_validate_warns_on_non_negative_unknown_count_and_bad_listen() {
        let config = Config {
            unknown_count: 0,
            listen: "nowhere".to_string(),
            ..Config::default()
        };

        let mut warnings = Vec::new();
        config.validate(&mut warnings);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_save_and_reload_each_format() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = utf8_dir(&tmp);
        let config = Config {
            good_result_ttl: 1000,
            ..Config::default()
        };

        for name in ["out.toml", "out.yaml", "out.json"] {
            let path = dir.join(name);
            config.save(&path).unwrap();
            let (loaded, _) = Config::load(&dir, Some(&path)).unwrap();
            assert_eq!(loaded, config, "round trip through {name}");
        }
    }

    #[test]
    fn test_save_default_with_comments_keeps_yaml_comments() {
        let tmp = tempfile::tempdir().unwrap();
        let path = utf8_dir(&tmp).join("share-counts.yml");

        Config::default().save_default_with_comments(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, DEFAULT_CONFIG_YAML);
    }
}
