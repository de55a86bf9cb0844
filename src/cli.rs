//! Command line surface of the `animator` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Turns still images into short animations through a chain of fallback
/// pipelines, tracking each request as a durable job.
#[derive(Debug, Parser)]
#[command(name = "animator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (defaults to ./animator.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging for this crate.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit an image for animation.
    Submit {
        /// URL of the source image.
        image_url: String,

        /// Use this job id instead of generating one.
        #[arg(long)]
        job_id: Option<String>,

        /// Stay attached until the job finishes.
        #[arg(long, default_value_t = false)]
        wait: bool,
    },

    /// Print the stored state of a job.
    Status {
        job_id: String,
    },

    /// Consume animation tasks from the Redis queue until interrupted.
    Consume,

    /// Show the configured fallback chain.
    Tiers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_submit_subcommand() {
        let cli = Cli::parse_from(["animator", "submit", "http://x/cat.png", "--wait"]);
        match cli.command {
            Command::Submit {
                image_url,
                job_id,
                wait,
            } => {
                assert_eq!(image_url, "http://x/cat.png");
                assert!(job_id.is_none());
                assert!(wait);
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn cli_parses_job_id_and_global_flags() {
        let cli = Cli::parse_from([
            "animator",
            "--config",
            "/etc/animator.toml",
            "-v",
            "submit",
            "http://x/cat.png",
            "--job-id",
            "order-42",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/animator.toml")));
        match cli.command {
            Command::Submit { job_id, wait, .. } => {
                assert_eq!(job_id.as_deref(), Some("order-42"));
                assert!(!wait);
            }
            _ => panic!("expected Submit command"),
        }
    }

    #[test]
    fn cli_parses_status_subcommand() {
        let cli = Cli::parse_from(["animator", "status", "abc"]);
        assert!(matches!(cli.command, Command::Status { job_id } if job_id == "abc"));
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
