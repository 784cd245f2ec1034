use std::path::PathBuf;
use std::str::FromStr;

use company_common::kafka::{ConsumerConfig, KafkaConfig};
use company_common::store::StoreConfig;
use envconfig::Envconfig;
use thiserror::Error;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(nested = true)]
    pub store: StoreConfig,

    #[envconfig(from = "ES_COMPANY_INDEX")]
    pub company_index: NonEmptyString,

    // Off only for stores that refuse upserts; every first write then goes through create
    #[envconfig(from = "ES_DOC_AS_UPSERT", default = "true")]
    pub doc_as_upsert: bool,

    #[envconfig(from = "CSV_DIR_PATH")]
    pub csv_dir_path: Option<String>,

    #[envconfig(from = "CSV_COMPANY_FILENAME")]
    pub csv_company_filename: Option<String>,

    // How long the consumer loop may go without reporting before liveness fails.
    // Idle waits report every third of this.
    #[envconfig(default = "30")]
    pub worker_liveness_deadline_secs: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reference directory path not provided (CSV_DIR_PATH)")]
    MissingReferenceDir,
    #[error("reference file name not provided (CSV_COMPANY_FILENAME)")]
    MissingReferenceFilename,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full path of the reference file. Both parts are required; an empty value
    /// counts as missing.
    pub fn reference_file_path(&self) -> Result<PathBuf, ConfigError> {
        let dir = non_blank(&self.csv_dir_path).ok_or(ConfigError::MissingReferenceDir)?;
        let filename =
            non_blank(&self.csv_company_filename).ok_or(ConfigError::MissingReferenceFilename)?;

        Ok(PathBuf::from(dir).join(filename))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}
