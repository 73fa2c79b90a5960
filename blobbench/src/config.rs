//! Configuration for the benchmark harness.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line flags, where available (e.g. `--mapping-id`)
//! 2. Environment variables (prefixed with `BB__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `BB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `BB__FLAVOR=stored` selects the store flavor
//! - `BB__THREADS=16` sets the number of workers
//! - `BB__WORKLOAD__RECORD_COUNT=100000` sets the number of records to load
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! flavor: stored
//! threads: 16
//!
//! workload:
//!   record_count: 100000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use blobbench_client::StoreFlavor;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::export::ExportFormat;
use crate::workload::{KeyDistribution, Workload};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "BB__";

/// The shape and mix of the generated traffic.
///
/// Used in: [`Config::workload`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Prefix of all logical record keys.
    ///
    /// Defaults to `user`.
    pub key_prefix: String,

    /// Number of records inserted by a load run.
    pub record_count: u64,

    /// Number of operations performed by a run.
    pub operation_count: u64,

    /// Number of fields per record.
    pub field_count: usize,

    /// Length of every field value in bytes.
    pub field_length: usize,

    /// Whether reads request all fields, or a single random field.
    pub read_all_fields: bool,

    /// Relative weight of reads in a run.
    pub read_proportion: u32,
    /// Relative weight of updates in a run.
    pub update_proportion: u32,
    /// Relative weight of inserts in a run.
    pub insert_proportion: u32,
    /// Relative weight of scans in a run.
    pub scan_proportion: u32,
    /// Relative weight of deletes in a run.
    pub delete_proportion: u32,

    /// How existing keys are chosen.
    pub distribution: KeyDistribution,

    /// Maximum number of records requested by a scan.
    pub max_scan_length: usize,

    /// Seed for all random choices. A random seed is used if not set.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            key_prefix: "user".to_owned(),
            record_count: 1000,
            operation_count: 1000,
            field_count: 10,
            field_length: 100,
            read_all_fields: true,
            read_proportion: 95,
            update_proportion: 0,
            insert_proportion: 0,
            scan_proportion: 0,
            delete_proportion: 5,
            distribution: KeyDistribution::Zipfian,
            max_scan_length: 1000,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Creates the workload described by this configuration.
    pub fn build(&self) -> crate::Result<Workload> {
        let mut builder = Workload::builder()
            .key_prefix(self.key_prefix.as_str())
            .record_count(self.record_count)
            .operation_count(self.operation_count)
            .fields(self.field_count, self.field_length)
            .read_all_fields(self.read_all_fields)
            .operation_weights(
                self.read_proportion,
                self.update_proportion,
                self.insert_proportion,
                self.scan_proportion,
                self.delete_proportion,
            )
            .distribution(self.distribution)
            .max_scan_length(self.max_scan_length);

        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }

        builder.build()
    }
}

/// Where and how the benchmark report is written.
///
/// Used in: [`Config::export`]
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Export {
    /// The report format.
    ///
    /// # Environment Variable
    ///
    /// `BB__EXPORT__FORMAT`
    pub format: ExportFormat,

    /// The file the report is written to. Defaults to stdout.
    ///
    /// # Environment Variable
    ///
    /// `BB__EXPORT__PATH`
    pub path: Option<PathBuf>,
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

/// The logging format parse error.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so that they do not interleave with the report.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// Valid levels in increasing severity: TRACE, DEBUG, INFO, WARN, ERROR, OFF. The `RUST_LOG`
    /// environment variable overrides this for more granular control.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `BB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Environment Variable
    ///
    /// `BB__LOGGING__FORMAT`
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the benchmark harness.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the blob store.
    ///
    /// # Default
    ///
    /// The development address of the configured [`flavor`](Config::flavor).
    ///
    /// # Environment Variable
    ///
    /// `BB__URL`
    pub url: Option<String>,

    /// The kind of blob store to benchmark.
    ///
    /// # Default
    ///
    /// `ambry`
    ///
    /// # Environment Variable
    ///
    /// `BB__FLAVOR`
    pub flavor: StoreFlavor,

    /// Number of concurrent workers.
    ///
    /// This also sizes the async runtime.
    ///
    /// # Environment Variable
    ///
    /// `BB__THREADS`
    pub threads: usize,

    /// Reference token of a published key mapping, required for runs.
    ///
    /// # Environment Variable
    ///
    /// `BB__MAPPING_ID`
    pub mapping_id: Option<String>,

    /// Maximum number of requests in flight at the same time.
    ///
    /// # Default
    ///
    /// `2000`
    pub max_connections: usize,

    /// Maximum number of idle connections kept per host.
    ///
    /// # Default
    ///
    /// `100`
    pub max_connections_per_host: usize,

    /// The generated traffic.
    pub workload: WorkloadConfig,

    /// Stops issuing operations after this duration, even if not all operations ran.
    ///
    /// Accepts human readable durations such as `30s` or `5m`.
    ///
    /// # Environment Variable
    ///
    /// `BB__MAX_EXECUTION_TIME`
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Option<Duration>,

    /// Report output.
    pub export: Export,

    /// Logging.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            flavor: StoreFlavor::default(),
            threads: 1,
            mapping_id: None,
            max_connections: 2000,
            max_connections_per_host: 100,
            workload: WorkloadConfig::default(),
            max_execution_time: None,
            export: Export::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file and the environment.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `BB__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Returns the base URL of the store, falling back to the flavor's default.
    pub fn base_url(&self) -> &str {
        self.url
            .as_deref()
            .unwrap_or_else(|| self.flavor.default_url())
    }

    /// Returns the number of workers, at least one.
    pub fn workers(&self) -> usize {
        self.threads.max(1)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.flavor, StoreFlavor::Ambry);
            assert_eq!(config.base_url(), "http://127.0.0.1:1174");
            assert_eq!(config.workers(), 1);
            assert_eq!(config.mapping_id, None);
            assert_eq!(config.max_execution_time, None);
            assert_eq!(config.workload.key_prefix, "user");
            assert_eq!(config.export.format, ExportFormat::Text);
            assert_eq!(config.logging.level, LevelFilter::INFO);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__FLAVOR", "stored");
            jail.set_env("BB__THREADS", "8");
            jail.set_env("BB__MAPPING_ID", "/blob/abc");
            jail.set_env("BB__WORKLOAD__RECORD_COUNT", "42");
            jail.set_env("BB__WORKLOAD__DISTRIBUTION", "latest");
            jail.set_env("BB__MAX_EXECUTION_TIME", "90s");
            jail.set_env("BB__EXPORT__FORMAT", "csv");
            jail.set_env("BB__LOGGING__LEVEL", "debug");
            jail.set_env("BB__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            assert_eq!(dbg!(&config).flavor, StoreFlavor::Stored);
            assert_eq!(config.base_url(), "http://127.0.0.1:8080");
            assert_eq!(config.workers(), 8);
            assert_eq!(config.mapping_id.as_deref(), Some("/blob/abc"));
            assert_eq!(config.workload.record_count, 42);
            assert_eq!(config.workload.distribution, KeyDistribution::Latest);
            assert_eq!(config.max_execution_time, Some(Duration::from_secs(90)));
            assert_eq!(config.export.format, ExportFormat::Csv);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            url: http://ambry.local:1174/
            threads: 4
            workload:
                field_count: 2
                read_proportion: 50
                delete_proportion: 50
            export:
                format: csv
                path: /tmp/report.csv
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(dbg!(&config).base_url(), "http://ambry.local:1174/");
            assert_eq!(config.workers(), 4);
            assert_eq!(config.workload.field_count, 2);
            // Unset fields keep their defaults.
            assert_eq!(config.workload.field_length, 100);
            assert_eq!(config.export.path, Some(PathBuf::from("/tmp/report.csv")));

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            flavor: stored
            threads: 4
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__THREADS", "2");

            let config = Config::load(Some(tempfile.path())).unwrap();

            assert_eq!(config.flavor, StoreFlavor::Stored);
            // Env should overwrite the yaml config
            assert_eq!(config.workers(), 2);

            Ok(())
        });
    }

    #[test]
    fn rejects_unknown_flavor() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BB__FLAVOR", "etcd");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn workload_from_config() {
        let config = WorkloadConfig {
            record_count: 10,
            seed: Some(3),
            ..Default::default()
        };
        let workload = config.build().unwrap();
        assert_eq!(workload.record_count(), 10);
        assert_eq!(workload.key(3), "user3");

        let config = WorkloadConfig {
            read_proportion: 0,
            delete_proportion: 0,
            ..Default::default()
        };
        assert!(config.build().is_err());
    }

    #[test]
    fn parses_log_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
