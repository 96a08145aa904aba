//! Configuration for the ingest binary.
//!
//! Connection and retry settings come from the environment (see
//! [`PostgresConfig::from_env`] and [`RetryPolicy::from_env`]). The command
//! line only chooses the input.

use std::path::PathBuf;

use clap::Parser;
use crowdtangle_db::{PostgresConfig, RetryPolicy};

use crate::error::IngestError;

/// Persist batches of processed CrowdTangle results to `PostgreSQL`.
///
/// Each input line is one batch: a JSON array of post records.
#[derive(Parser, Debug)]
#[command(name = "crowdtangle-ingest", version, about, long_about = None)]
pub struct Cli {
    /// File of newline-delimited JSON batches; `-` or omitted reads stdin
    pub input: Option<PathBuf>,
}

/// Complete ingest configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Database connection settings.
    pub postgres: PostgresConfig,
    /// Deadlock retry policy for each batch.
    pub retry: RetryPolicy,
    /// Apply pending migrations before writing.
    pub run_migrations: bool,
    /// Emit logs as JSON instead of human-readable text.
    pub json_logs: bool,
    /// File to read batches from; stdin when absent.
    pub input: Option<PathBuf>,
}

impl IngestConfig {
    /// Load configuration from the environment and command-line arguments.
    ///
    /// Optional variables on top of the database and retry ones:
    /// - `RUN_MIGRATIONS` -- apply migrations first (default `false`)
    /// - `LOG_FORMAT` -- `json` for JSON logs
    ///
    /// `--help` and `--version` print and exit here, before any connection
    /// is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if a variable is missing or malformed.
    pub fn load() -> Result<Self, IngestError> {
        Self::from_parts(|name| std::env::var(name).ok(), Cli::parse())
    }

    /// Build the configuration from a variable lookup and parsed arguments.
    pub fn from_parts<F>(lookup: F, cli: Cli) -> Result<Self, IngestError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let postgres = PostgresConfig::from_lookup(&lookup)?;
        let retry = RetryPolicy::from_lookup(&lookup)?;

        let run_migrations = parse_flag(&lookup, "RUN_MIGRATIONS")?;
        let json_logs = lookup("LOG_FORMAT").is_some_and(|format| format == "json");

        let input = cli.input.filter(|path| path.as_os_str() != "-");

        Ok(Self {
            postgres,
            retry,
            run_migrations,
            json_logs,
            input,
        })
    }
}

fn parse_flag<F>(lookup: &F, name: &str) -> Result<bool, IngestError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).map_or(Ok(false), |raw| {
        raw.parse()
            .map_err(|e| IngestError::Config(format!("invalid {name}: {e}")))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "DATABASE_URL" => Some(String::from("postgresql://localhost/crowdtangle")),
            "RUN_MIGRATIONS" => Some(String::from("true")),
            "LOG_FORMAT" => Some(String::from("json")),
            _ => None,
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crowdtangle-ingest").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn reads_flags_and_path() {
        let config = IngestConfig::from_parts(env, cli(&["batches.jsonl"])).unwrap();
        assert!(config.run_migrations);
        assert!(config.json_logs);
        assert_eq!(config.input, Some(PathBuf::from("batches.jsonl")));
        assert_eq!(config.retry.max_attempts(), 3);
    }

    #[test]
    fn dash_or_nothing_means_stdin() {
        assert_eq!(IngestConfig::from_parts(env, cli(&[])).unwrap().input, None);
        assert_eq!(IngestConfig::from_parts(env, cli(&["-"])).unwrap().input, None);
    }

    #[test]
    fn help_and_version_are_not_input_paths() {
        let help = Cli::try_parse_from(["crowdtangle-ingest", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);

        let version = Cli::try_parse_from(["crowdtangle-ingest", "--version"]).unwrap_err();
        assert_eq!(version.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn rejects_extra_arguments() {
        let result = Cli::try_parse_from(["crowdtangle-ingest", "a.jsonl", "b.jsonl"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_flag() {
        let lookup = |name: &str| match name {
            "DATABASE_URL" => Some(String::from("postgresql://localhost/crowdtangle")),
            "RUN_MIGRATIONS" => Some(String::from("yes please")),
            _ => None,
        };
        let result = IngestConfig::from_parts(lookup, cli(&[]));
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn missing_database_settings_surface_as_db_error() {
        let result = IngestConfig::from_parts(|_: &str| None, cli(&[]));
        assert!(matches!(result, Err(IngestError::Db { .. })));
    }
}
