//! Workflow Harness CLI
//!
//! Runs workflow scenarios against the simulated Time module.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};

use workflow_harness::config::{HarnessConfig, Validate};
use workflow_harness::debug;
use workflow_harness::driver::{SimQuirks, SimulatedTimeModule};
use workflow_harness::fixture::{CustomerData, ProjectData, TestCaseSet, TimesheetData};
use workflow_harness::harness::{
    customer_scenario, project_scenario, render_text, run_suite, timesheet_scenario, RunReport,
    RunnerConfig, Scenario, Summary,
};
use workflow_harness::Result;

#[derive(Parser)]
#[command(name = "workflow-harness")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "HARNESS_CONFIG")]
    config: Option<PathBuf>,

    /// Behavior of the simulated module
    #[arg(long, value_enum, default_value = "strict", global = true)]
    quirks: QuirksProfile,

    /// Report format
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: ReportFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenario files (YAML or JSON)
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run the test-case documents in a directory
    Cases {
        /// Directory holding customers_data.json, projects_data.json and timesheet_data.json
        dir: PathBuf,

        /// Only run these case IDs
        #[arg(long)]
        only: Vec<String>,
    },

    /// Parse and check scenario files without running them
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QuirksProfile {
    /// Behaves as documented
    Strict,
    /// Reproduces the defects seen in the live module
    Observed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose || debug::is_debug() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = HarnessConfig::load(cli.config.as_deref())?;
    for warning in config.validate().into_result()? {
        tracing::warn!("{}", warning);
    }

    let scenarios = match &cli.command {
        Commands::Run { files } => load_scenarios(files)?,
        Commands::Cases { dir, only } => catalog_scenarios(dir, only, config.max_name_len)?,
        Commands::Check { files } => {
            let scenarios = load_scenarios(files)?;
            for scenario in &scenarios {
                println!("{}: {} steps", scenario.name, scenario.steps.len());
            }
            return Ok(0);
        }
    };

    let quirks = SimQuirks {
        max_name_len: config.max_name_len,
        ..match cli.quirks {
            QuirksProfile::Strict => SimQuirks::strict(),
            QuirksProfile::Observed => SimQuirks::observed(),
        }
    };
    let runner_config = RunnerConfig::from(&config);
    let app = SimulatedTimeModule::new(quirks, &runner_config.supervisor);

    tracing::info!(
        scenarios = scenarios.len(),
        quirks = ?cli.quirks,
        fail_fast = debug::is_fail_fast(),
        "starting run"
    );
    let results = run_suite(scenarios, runner_config, || app.driver()).await;
    let summary = Summary::of(&results);

    match cli.format {
        ReportFormat::Text => print!("{}", render_text(&results)),
        ReportFormat::Json => println!("{}", RunReport::new(results).to_json()?),
    }
    Ok(summary.exit_code())
}

fn load_scenarios(files: &[PathBuf]) -> Result<Vec<Scenario>> {
    files.iter().map(Scenario::load).collect()
}

fn catalog_scenarios(dir: &Path, only: &[String], max_name_len: usize) -> Result<Vec<Scenario>> {
    let wanted = |id: &str| only.is_empty() || only.iter().any(|o| o == id);
    let mut scenarios = Vec::new();

    let customers = dir.join("customers_data.json");
    if customers.exists() {
        let set = TestCaseSet::<CustomerData>::load(&customers)?;
        for id in set.ids().filter(|id| wanted(id)) {
            scenarios.push(customer_scenario(set.get(id)?, max_name_len));
        }
    }

    let projects = dir.join("projects_data.json");
    if projects.exists() {
        let set = TestCaseSet::<ProjectData>::load(&projects)?;
        for id in set.ids().filter(|id| wanted(id)) {
            scenarios.push(project_scenario(set.get(id)?, max_name_len));
        }
    }

    let timesheets = dir.join("timesheet_data.json");
    if timesheets.exists() {
        let set = TestCaseSet::<TimesheetData>::load(&timesheets)?;
        for id in set.ids().filter(|id| wanted(id)) {
            scenarios.push(timesheet_scenario(set.get(id)?));
        }
    }

    tracing::info!(dir = %dir.display(), cases = scenarios.len(), "loaded test cases");
    Ok(scenarios)
}
