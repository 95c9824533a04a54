use crate::errors::Era5Err;
use dirs::home_dir;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

const RC_FILE_NAME: &str = ".cdsapirc";
const ENV_RC: &str = "CDSAPI_RC";
const ENV_URL: &str = "CDSAPI_URL";
const ENV_KEY: &str = "CDSAPI_KEY";

/// Connection settings for the Climate Data Store.
#[derive(Clone, Debug, PartialEq)]
pub struct CdsConfig {
    /// Base url of the API, e.g. `https://cds.climate.copernicus.eu/api`.
    pub url: String,
    /// Personal access token.
    pub key: String,
    /// Verify TLS certificates.
    pub verify: bool,
    /// Longest wait between two polls of a running job.
    pub sleep_max: Duration,
    /// Timeout for a single API call. Not applied to the result download.
    pub timeout: Duration,
}

// What may appear in a `.cdsapirc` file.
#[derive(Debug, Default, Deserialize)]
struct RcFile {
    url: Option<String>,
    key: Option<String>,
    verify: Option<u8>,
}

impl CdsConfig {
    /// Build a configuration with default polling and timeout settings.
    pub fn new(url: &str, key: &str) -> Self {
        CdsConfig {
            url: url.trim_end_matches('/').to_owned(),
            key: key.to_owned(),
            verify: true,
            sleep_max: Duration::from_secs(120),
            timeout: Duration::from_secs(60),
        }
    }

    /// Load the configuration from `~/.cdsapirc` (or the file named by `CDSAPI_RC`), with
    /// `CDSAPI_URL` and `CDSAPI_KEY` taking precedence over the file.
    pub fn load() -> Result<Self, Era5Err> {
        let rc_path = env::var_os(ENV_RC)
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|hd| hd.join(RC_FILE_NAME)));

        let rc = match rc_path {
            Some(ref path) if path.is_file() => Self::read_rc_file(path)?,
            _ => RcFile::default(),
        };

        Self::merge(
            rc,
            env::var(ENV_URL).ok(),
            env::var(ENV_KEY).ok(),
            rc_path.as_deref(),
        )
    }

    /// Load the configuration from a `.cdsapirc` style file only.
    pub fn from_rc_file(path: &Path) -> Result<Self, Era5Err> {
        let rc = Self::read_rc_file(path)?;
        Self::merge(rc, None, None, Some(path))
    }

    /// Parse the text of a `.cdsapirc` style file.
    pub fn from_rc_str(text: &str) -> Result<Self, Era5Err> {
        let rc = Self::parse_rc(text)?;
        Self::merge(rc, None, None, None)
    }

    fn read_rc_file(path: &Path) -> Result<RcFile, Era5Err> {
        let text = fs::read_to_string(path)?;
        Self::parse_rc(&text)
    }

    fn parse_rc(text: &str) -> Result<RcFile, Era5Err> {
        if text.trim().is_empty() {
            return Ok(RcFile::default());
        }

        Ok(serde_yaml::from_str(text)?)
    }

    fn merge(
        rc: RcFile,
        env_url: Option<String>,
        env_key: Option<String>,
        rc_path: Option<&Path>,
    ) -> Result<Self, Era5Err> {
        let url = env_url.or(rc.url).filter(|url| !url.trim().is_empty());
        let key = env_key.or(rc.key).filter(|key| !key.trim().is_empty());

        let where_from = || match rc_path {
            Some(path) => format!("set {} or add it to {}", ENV_URL, path.display()),
            None => format!("set {}", ENV_URL),
        };

        let url = url.ok_or_else(|| Era5Err::MissingConfig(format!("no url, {}", where_from())))?;
        let key = key.ok_or_else(|| {
            Era5Err::MissingConfig(format!(
                "no key, {}",
                where_from().replace(ENV_URL, ENV_KEY)
            ))
        })?;

        let mut config = CdsConfig::new(url.trim(), key.trim());
        config.verify = rc.verify.map(|v| v != 0).unwrap_or(true);

        Ok(config)
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
