//! Settings for `event-report`
//!
//! Resolved once, in order: defaults, config file, CLI flags. The data
//! source is chosen on the command line only (`-D` or `-A`).

use clap::{Args, Parser};
use serde::Deserialize;
use stackledger_core::config::{default_config_path, load_overrides};
use stackledger_core::ports::STATE_EVENT_TYPE;
use stackledger_core::{Exclusions, LedgerError, Result, TimeWindow};
use std::fmt;
use std::path::PathBuf;

pub const TOOL_NAME: &str = "event_report";

#[derive(Debug, Clone, Parser)]
#[command(name = "event-report")]
#[command(about = "Report OpenStack billing events for a time window")]
#[command(version)]
pub struct Cli {
    /// Output debugging information
    #[arg(short, long)]
    pub verbose: bool,

    /// Exclude instance state events and the configured skip list
    #[arg(short, long)]
    pub nostate: bool,

    /// Flatten event traits into top-level fields
    #[arg(short, long = "collapse-traits")]
    pub collapse_traits: bool,

    /// Configuration file (JSON)
    #[arg(short = 'C', long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// Window start, %Y-%m-%dT%H:%M:%S
    #[arg(short, long)]
    pub start: String,

    /// Window end (exclusive), %Y-%m-%dT%H:%M:%S
    #[arg(short, long)]
    pub end: String,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Database host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Database port
    #[arg(long)]
    pub port: Option<u16>,

    /// Database user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Database password
    #[arg(short, long)]
    pub passwd: Option<String>,

    /// Database name
    #[arg(short, long)]
    pub db: Option<String>,

    #[command(flatten)]
    pub source: SourceFlags,
}

#[derive(Debug, Clone, Copy, Args)]
#[group(required = true, multiple = false)]
pub struct SourceFlags {
    /// Read events directly from the event database
    #[arg(short = 'D', long = "use-db")]
    pub use_db: bool,

    /// Read events from the event REST API
    #[arg(short = 'A', long = "use-api")]
    pub use_api: bool,
}

/// Config-file keys; every field is optional and unknown keys are ignored
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ReportOverrides {
    pub outdir: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub nostate: Option<bool>,
    pub collapse_traits: Option<bool>,
    pub skip_events: Option<Vec<String>>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub passwd: Option<String>,
    pub db: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Database(DbSettings),
    Api,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub config_file: PathBuf,
    pub outdir: PathBuf,
    pub verbose: bool,
    pub window: TimeWindow,
    pub collapse_traits: bool,
    pub skip_state: bool,
    pub skip_events: Vec<String>,
    pub source: SourceSelection,
}

impl ReportConfig {
    /// Layer config-file overrides, then CLI flags, over the defaults
    pub fn resolve(cli: &Cli, file: ReportOverrides) -> Result<Self> {
        let window = TimeWindow::parse(&cli.start, &cli.end)?;

        let source = if cli.source.use_db {
            let password = cli
                .passwd
                .clone()
                .or(file.passwd)
                .ok_or_else(|| LedgerError::Config("database password is required with --use-db".into()))?;
            SourceSelection::Database(DbSettings {
                host: cli.host.clone().or(file.host).unwrap_or_else(|| "0.0.0.0".into()),
                port: cli.port.or(file.port).unwrap_or(3306),
                user: cli.user.clone().or(file.user).unwrap_or_else(|| "panko".into()),
                password,
                database: cli.db.clone().or(file.db).unwrap_or_else(|| "panko".into()),
            })
        } else {
            SourceSelection::Api
        };

        Ok(Self {
            config_file: cli
                .config_file
                .clone()
                .unwrap_or_else(|| default_config_path(TOOL_NAME)),
            outdir: cli
                .outdir
                .clone()
                .or(file.outdir)
                .unwrap_or_else(|| PathBuf::from(".")),
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            window,
            collapse_traits: cli.collapse_traits || file.collapse_traits.unwrap_or(false),
            skip_state: cli.nostate || file.nostate.unwrap_or(false),
            skip_events: file.skip_events.unwrap_or_default(),
            source,
        })
    }

    pub async fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config_file
            .clone()
            .unwrap_or_else(|| default_config_path(TOOL_NAME));
        let file = load_overrides::<ReportOverrides>(&path).await?;
        Self::resolve(cli, file)
    }

    /// Event types to exclude; the skip list only applies with `nostate`
    pub fn exclusions(&self) -> Exclusions {
        if !self.skip_state {
            return Exclusions::default();
        }
        let mut skip = self.skip_events.clone();
        skip.push(STATE_EVENT_TYPE.to_string());
        Exclusions::new(skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackledger_core::ports::NOISE_EVENT_TYPE;

    const WINDOW: [&str; 4] = ["-s", "2023-01-01T00:00:00", "-e", "2023-01-02T00:00:00"];

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec!["event-report"];
        args.extend(WINDOW);
        args.extend(extra);
        Cli::parse_from(args)
    }

    #[test]
    fn test_source_flags_exclusive_and_required() {
        let mut args = vec!["event-report"];
        args.extend(WINDOW);
        assert!(Cli::try_parse_from(args.clone()).is_err());

        args.extend(["-D", "-A"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_api_defaults() {
        let config = ReportConfig::resolve(&cli(&["-A"]), ReportOverrides::default()).unwrap();
        assert_eq!(config.source, SourceSelection::Api);
        assert_eq!(config.outdir, PathBuf::from("."));
        assert!(!config.collapse_traits);
        assert_eq!(config.window.report_file_name(), "2023-01-01T00:00:00_2023-01-02T00:00:00.json");
    }

    #[test]
    fn test_db_requires_password() {
        let err = ReportConfig::resolve(&cli(&["-D"]), ReportOverrides::default()).unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }

    #[test]
    fn test_db_settings_layering() {
        let file = ReportOverrides {
            passwd: Some("from-file".into()),
            host: Some("db.internal".into()),
            user: Some("reader".into()),
            ..ReportOverrides::default()
        };
        let config = ReportConfig::resolve(&cli(&["-D", "-u", "admin", "--port", "3307"]), file).unwrap();
        let SourceSelection::Database(db) = config.source else {
            panic!("expected database source");
        };
        assert_eq!(db.host, "db.internal");
        assert_eq!(db.port, 3307);
        assert_eq!(db.user, "admin");
        assert_eq!(db.password, "from-file");
        assert_eq!(db.database, "panko");
        assert!(!format!("{:?}", db).contains("from-file"));
    }

    #[test]
    fn test_invalid_window_rejected() {
        let args = ["event-report", "-A", "-s", "2023-01-02T00:00:00", "-e", "2023-01-01T00:00:00"];
        assert!(ReportConfig::resolve(&Cli::parse_from(args), ReportOverrides::default()).is_err());

        let args = ["event-report", "-A", "-s", "yesterday", "-e", "2023-01-01T00:00:00"];
        assert!(ReportConfig::resolve(&Cli::parse_from(args), ReportOverrides::default()).is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event_report.json");
        std::fs::write(
            &path,
            r#"{"outdir": "/var/lib/events", "passwd": "s3cret", "collapse_traits": true}"#,
        )
        .unwrap();

        let config = ReportConfig::load(&cli(&["-D", "-C", path.to_str().unwrap()])).await.unwrap();
        assert_eq!(config.config_file, path);
        assert_eq!(config.outdir, PathBuf::from("/var/lib/events"));
        assert!(config.collapse_traits);
        let SourceSelection::Database(db) = config.source else {
            panic!("expected database source");
        };
        assert_eq!(db.password, "s3cret");
    }

    #[test]
    fn test_skip_list_only_with_nostate() {
        let file = ReportOverrides {
            skip_events: Some(vec!["identity.authenticate".into()]),
            ..ReportOverrides::default()
        };
        let config = ReportConfig::resolve(&cli(&["-A"]), file.clone()).unwrap();
        assert_eq!(config.exclusions().event_types(), [NOISE_EVENT_TYPE]);

        let config = ReportConfig::resolve(&cli(&["-A", "-n"]), file).unwrap();
        let exclusions = config.exclusions();
        assert!(exclusions.excludes(NOISE_EVENT_TYPE));
        assert!(exclusions.excludes(STATE_EVENT_TYPE));
        assert!(exclusions.excludes("identity.authenticate"));
    }
}
