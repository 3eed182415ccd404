use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::ncbi::{DEFAULT_ASSEMBLY_SUFFIX, ENTREZ_ATTEMPTS, GENOMES_FTP_STEM};
use crate::uniprot::UNIPROT_MAPPING_URL;

pub const CONFIG_FILE_NAME: &str = "kira-bu.json";
pub const DEFAULT_BATCH_SIZE: usize = 150;
pub const DEFAULT_RETRIES: usize = 10;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub uniprot: Option<UniprotSection>,
    #[serde(default)]
    pub entrez: Option<EntrezSection>,
    #[serde(default)]
    pub download: Option<DownloadSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UniprotSection {
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub retries: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EntrezSection {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub attempts: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DownloadSection {
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub ftp_stem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub source: Option<Utf8PathBuf>,
    pub batch_size: usize,
    pub retries: usize,
    pub uniprot_url: String,
    pub email: Option<String>,
    pub entrez_attempts: usize,
    pub assembly_suffix: String,
    pub ftp_stem: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path` if given. Otherwise looks for `kira-bu.json` in the current
    /// directory, then in the user config directory, and falls back to defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Self::discover(),
        };

        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default(), None);
        };

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| KiraError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config, Some(config_path))
    }

    fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(CONFIG_FILE_NAME);
        if local.as_std_path().exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.config_dir().join("kira-bu").join(CONFIG_FILE_NAME))
                    .ok()
            })
            .filter(|path| path.as_std_path().exists())
    }

    pub fn resolve_config(
        config: Config,
        source: Option<Utf8PathBuf>,
    ) -> Result<ResolvedConfig, KiraError> {
        let uniprot = config.uniprot.unwrap_or_default();
        let entrez = config.entrez.unwrap_or_default();
        let download = config.download.unwrap_or_default();

        let batch_size = uniprot.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(KiraError::ConfigParse(
                "uniprot.batch_size must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            source,
            batch_size,
            retries: uniprot.retries.unwrap_or(DEFAULT_RETRIES),
            uniprot_url: uniprot
                .url
                .unwrap_or_else(|| UNIPROT_MAPPING_URL.to_string()),
            email: entrez.email.filter(|email| !email.trim().is_empty()),
            entrez_attempts: entrez.attempts.unwrap_or(ENTREZ_ATTEMPTS).max(1),
            assembly_suffix: download
                .suffix
                .unwrap_or_else(|| DEFAULT_ASSEMBLY_SUFFIX.to_string()),
            ftp_stem: download
                .ftp_stem
                .unwrap_or_else(|| GENOMES_FTP_STEM.to_string()),
        })
    }
}

impl ResolvedConfig {
    pub fn source_path(&self) -> Option<&Utf8Path> {
        self.source.as_deref()
    }
}
