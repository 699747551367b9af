use clap::{Parser, Subcommand};
use pantry_cook::{Container, Format};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "pantry", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Configuration file; defaults to the per-user configuration directory.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Report which tiers hold a record.
    Exists { id: u64 },
    /// Extension and MIME type of a cooked file.
    Metadata(Cooking),
    /// Print the record's sidecar information.
    Info { id: u64 },
    /// Cook a record and write the result.
    Cook {
        id: u64,
        #[command(flatten)]
        cooking: Cooking,
        /// Output file, `-` for standard output. Defaults to a descriptive
        /// name in the current directory.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a record from every tier.
    #[command(alias = "rm")]
    Delete { id: u64 },
    /// Cook several records in the background and wait for them.
    Job {
        #[arg(required = true)]
        ids: Vec<u64>,
        #[command(flatten)]
        cooking: Cooking,
        /// Identifier echoed in every job notification.
        #[arg(long)]
        job_id: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, clap::Args)]
pub struct Cooking {
    #[arg(long, short, default_value = "opus", value_parser = parse_format)]
    pub format: Format,
    #[arg(long = "container", short = 'C', default_value = "mix", value_parser = parse_container)]
    pub container: Container,
    /// Ask for dynamic audio normalization.
    #[arg(long)]
    pub dynaudnorm: bool,
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse().map_err(|e: pantry_cook::error::Error| (*e).to_string())
}

fn parse_container(s: &str) -> Result<Container, String> {
    s.parse().map_err(|e: pantry_cook::error::Error| (*e).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let app = App::try_parse_from(["pantry", "cook", "12"]).unwrap();
        match app.cmd {
            Commands::Cook { id, cooking, output } => {
                assert_eq!(id, 12);
                assert_eq!(cooking.format, Format::Opus);
                assert_eq!(cooking.container, Container::Mix);
                assert!(!cooking.dynaudnorm);
                assert_eq!(output, None);
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_config_and_job() {
        let app = App::try_parse_from([
            "pantry", "job", "1", "2", "--format", "flac", "--container", "zip", "--job-id", "b", "--config", "p.toml",
        ])
        .unwrap();
        assert_eq!(app.config, Some(PathBuf::from("p.toml")));
        match app.cmd {
            Commands::Job { ids, cooking, job_id } => {
                assert_eq!(ids, [1, 2]);
                assert_eq!((cooking.format, cooking.container), (Format::Flac, Container::Zip));
                assert_eq!(job_id.as_deref(), Some("b"));
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[rstest]
    #[case(&["pantry", "cook", "1", "--format", "wma"])]
    #[case(&["pantry", "cook", "1", "--container", "tar"])]
    #[case(&["pantry", "job"])]
    #[case(&["pantry", "exists", "-3"])]
    fn test_rejected(#[case] args: &[&str]) {
        assert!(App::try_parse_from(args).is_err());
    }
}
