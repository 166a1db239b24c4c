use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "rxnalign - Score reactant-to-product atom correspondences by rigid-body alignment.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score every reactant/product atom pair of a reaction problem file.
    Score(ScoreArgs),
}

/// Arguments for the `score` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ScoreArgs {
    /// Path to the TOML problem file describing both sides of the reaction.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the CSV score table. Only the summary is printed when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Override the outer iteration limit of the multi-body solver.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override both the gradient and the constraint tolerance of the multi-body solver.
    #[arg(long, value_name = "FLOAT")]
    pub tolerance: Option<f64>,

    /// Accept rotations that are not uniquely determined instead of failing.
    #[arg(long)]
    pub allow_degenerate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_score_command_with_overrides() {
        let cli = Cli::try_parse_from([
            "rxnalign",
            "-vv",
            "score",
            "-i",
            "problem.toml",
            "-o",
            "scores.csv",
            "--max-iterations",
            "50",
            "--tolerance",
            "1e-6",
            "--allow-degenerate",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        let Commands::Score(args) = cli.command;
        assert_eq!(args.input, PathBuf::from("problem.toml"));
        assert_eq!(args.output, Some(PathBuf::from("scores.csv")));
        assert_eq!(args.max_iterations, Some(50));
        assert_eq!(args.tolerance, Some(1e-6));
        assert!(args.allow_degenerate);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["rxnalign", "score"]).is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["rxnalign", "-q", "-v", "score", "-i", "p.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_are_accepted_after_the_subcommand() {
        let cli =
            Cli::try_parse_from(["rxnalign", "score", "-i", "p.toml", "--log-file", "run.log"])
                .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
    }
}
