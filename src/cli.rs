use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "botcheck",
    version,
    about = "Replay scripted, branching conversations against a chat bot and check its replies"
)]
pub struct Cli {
    /// Emit logs as JSON lines instead of compact text.
    #[arg(long = "log-json", global = true, default_value_t = false, action = ArgAction::SetTrue)]
    pub log_json: bool,

    /// Also write JSON logs to `<dir>/botcheck.log`.
    #[arg(long = "log-dir", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every conversation path in the workbook against the bot.
    Run(RunArgs),
    /// Print the expanded conversation paths without contacting the bot.
    Plan(PlanArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// TOML configuration file. Defaults to `botcheck.toml` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Workbook (.xlsx or .yaml) holding the test cases. Overrides config and env.
    #[arg(long)]
    pub cases: Option<PathBuf>,

    /// Write outcomes and totals to this JSON file.
    #[arg(long = "report-json")]
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct PlanArgs {
    /// Workbook (.xlsx or .yaml) holding the test cases.
    #[arg(long)]
    pub cases: PathBuf,

    /// Print the suite as JSON instead of a readable listing.
    #[arg(long, default_value_t = false, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "botcheck",
            "run",
            "--cases",
            "cases.xlsx",
            "--report-json",
            "out.json",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.cases, Some(PathBuf::from("cases.xlsx")));
        assert_eq!(args.report_json, Some(PathBuf::from("out.json")));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_plan_requires_cases() {
        assert!(Cli::try_parse_from(["botcheck", "plan"]).is_err());
        let cli = Cli::try_parse_from(["botcheck", "plan", "--cases", "c.yaml", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Plan(PlanArgs { json: true, .. })));
    }
}
