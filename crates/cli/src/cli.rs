use clap::{Parser, Subcommand};

/// Run a worker pool and timer scheduler.
#[derive(Parser, Debug)]
#[command(name = "taskline", version, about)]
pub struct Cli {
    /// Path to taskline.toml config file.
    #[arg(long, env = "TASKLINE_CONFIG", default_value = "config/taskline.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the pool and scheduler and run until Ctrl-C.
    Run {
        /// Stats report interval in seconds.
        #[arg(long, env = "TASKLINE_REPORT_INTERVAL", default_value_t = 10)]
        report_interval: u64,

        /// Number of demo jobs to submit on startup.
        #[arg(long, default_value_t = 0)]
        burst: usize,
    },
    /// Load and validate the config, then print the effective settings.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "taskline",
            "--config",
            "local.toml",
            "run",
            "--report-interval",
            "5",
            "--burst",
            "20",
        ]);
        assert_eq!(cli.config, "local.toml");
        match cli.command {
            Command::Run {
                report_interval,
                burst,
            } => {
                assert_eq!(report_interval, 5);
                assert_eq!(burst, 20);
            }
            Command::Check => panic!("expected run"),
        }
    }

    #[test]
    fn check_needs_no_flags() {
        let cli = Cli::parse_from(["taskline", "check"]);
        assert!(matches!(cli.command, Command::Check));
    }
}
