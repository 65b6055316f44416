pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod report;
pub mod script;
pub mod transport;
pub mod workbook;

use std::path::Path;
use std::process::ExitCode;

use cli::{Cli, Command, PlanArgs, RunArgs};
use config::RunnerConfig;
use engine::{DriverSettings, SuiteRunner, SuiteSummary};
use error::AppError;
use report::{ConsoleReporter, RunReport};
use script::TestSuite;
use transport::directline::DirectLineClient;
use workbook::Workbook;

/// Every path passed.
pub const EXIT_PASSED: u8 = 0;
/// At least one path failed or errored.
pub const EXIT_FAILED: u8 = 1;
/// Bad configuration or unreadable workbook; nothing was run.
pub const EXIT_SETUP: u8 = 2;

/// Dispatch a parsed command line. Logging must already be initialised.
pub async fn run(cli: Cli) -> ExitCode {
    let status = match cli.command {
        Command::Run(args) => run_suite(args).await,
        Command::Plan(args) => match plan(&args) {
            Ok(()) => EXIT_PASSED,
            Err(e) => setup_failed(&e),
        },
    };
    ExitCode::from(status)
}

async fn run_suite(args: RunArgs) -> u8 {
    let (config, suite) = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(e) => return setup_failed_with_report(&args, args.cases.as_deref(), &e),
    };

    let client = match DirectLineClient::new(&config.direct_line, config.activity.clone()) {
        Ok(client) => client,
        Err(e) => {
            return setup_failed_with_report(&args, config.test_case_file.as_deref(), &e)
        }
    };

    let runner = SuiteRunner::new(&client, DriverSettings::from(&config.polling));
    let mut reporter = ConsoleReporter::stdout();
    let summary = runner.run(&suite, &mut reporter).await;

    if let Some(path) = &args.report_json {
        write_report(
            path,
            &RunReport::completed(config.test_case_file.as_deref(), &summary),
        );
    }
    exit_status(&summary)
}

/// Resolve configuration (file, then env, then flags) and load the suite.
fn prepare(args: &RunArgs) -> Result<(RunnerConfig, TestSuite), AppError> {
    let mut config = RunnerConfig::load(args.config.as_deref())?;
    config.apply_env();
    if let Some(cases) = &args.cases {
        config.test_case_file = Some(cases.clone());
    }
    config.validate_for_run()?;

    let cases = config
        .test_case_file
        .clone()
        .ok_or_else(|| AppError::Internal("test case file vanished after validation".into()))?;
    let suite = load_cases(&cases)?;
    Ok((config, suite))
}

fn load_cases(path: &Path) -> Result<TestSuite, AppError> {
    let workbook = Workbook::open(path)?;
    let suite = script::load_suite(&workbook)?;
    tracing::info!(
        file = %path.display(),
        cases = suite.test_cases.len(),
        paths = suite.path_count(),
        "Test suite loaded"
    );
    Ok(suite)
}

fn plan(args: &PlanArgs) -> Result<(), AppError> {
    let suite = load_cases(&args.cases)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&suite)?);
    } else {
        print!("{}", report::format_plan(&suite));
    }
    Ok(())
}

fn exit_status(summary: &SuiteSummary) -> u8 {
    if summary.all_passed() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    }
}

fn setup_failed(err: &AppError) -> u8 {
    tracing::error!(kind = err.kind(), "{}", err);
    eprintln!("botcheck: {}", err);
    EXIT_SETUP
}

fn setup_failed_with_report(args: &RunArgs, cases: Option<&Path>, err: &AppError) -> u8 {
    if let Some(path) = &args.report_json {
        write_report(path, &RunReport::failed(cases, err));
    }
    setup_failed(err)
}

/// A failed report write is logged but never changes the exit status.
fn write_report(path: &Path, report: &RunReport<'_>) {
    if let Err(e) = report.write_to(path) {
        tracing::error!(path = %path.display(), "Could not write JSON report: {}", e);
    }
}
