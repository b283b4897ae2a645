//! SFC models CLI
//!
//! Solve an equation file, or run the built-in model SIM.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sfc_models::builtin_models::{build_sim, SimParameters};
use sfc_models::logging::{self, LogSettings};
use sfc_models::solver::{EquationSolver, ExportFormat, FunctionRegistry, SolverConfig, TimeSeries};

#[derive(Parser, Debug)]
#[command(name = "sfc")]
#[command(about = "Build and solve stock-flow consistent models")]
struct Cli {
    /// Log thresholds: a level, or `stream=level` (stream: parser, solver, model, trace, timeseries)
    #[arg(long = "log", global = true)]
    log: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a file of equations
    Solve {
        file: PathBuf,

        /// Solver configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the solved time series (tab separated)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override MaxTime from the file
        #[arg(long)]
        max_time: Option<usize>,
    },
    /// Run model SIM
    Sim {
        #[arg(long, default_value_t = 100)]
        steps: usize,

        #[arg(long, default_value_t = 20.0)]
        gov_demand: f64,

        /// New level of government demand
        #[arg(long, requires = "step_at")]
        step_change: Option<f64>,

        /// Period at which the new level applies
        #[arg(long, requires = "step_change")]
        step_at: Option<usize>,

        /// Start from the steady state
        #[arg(long)]
        equilibrium: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the generated equations
        #[arg(long)]
        equations: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = LogSettings::default();
    for spec in &cli.log {
        settings.apply(spec)?;
    }
    // A logger installed by the host takes precedence
    let _ = logging::init(&settings);

    match cli.command {
        Command::Solve {
            file,
            config,
            output,
            max_time,
        } => solve_file(&file, config.as_deref(), output.as_deref(), max_time),
        Command::Sim {
            steps,
            gov_demand,
            step_change,
            step_at,
            equilibrium,
            output,
            equations,
        } => {
            let params = SimParameters {
                gov_demand,
                step_change: step_at.zip(step_change),
                max_time: steps,
                initial_equilibrium: equilibrium,
                ..SimParameters::default()
            };
            run_sim(&params, output.as_deref(), equations.as_deref())
        }
    }
}

fn solve_file(file: &Path, config: Option<&Path>, output: Option<&Path>, max_time: Option<usize>) -> Result<()> {
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let mut config = match config {
        Some(path) => {
            let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            SolverConfig::from_json(&json)?
        }
        None => SolverConfig::default(),
    };
    if max_time.is_some() {
        config.max_time = max_time;
    }

    let mut solver = EquationSolver::new(&text, FunctionRegistry::new(), config)?;
    for warning in &solver.parser().warnings {
        eprintln!("warning: {}", warning);
    }
    solver.solve()?;
    let series = solver.time_series();

    println!("Solved {} ({} steps)", file.display(), solver.steps_solved());
    print_final_values(&series);
    if let Some(path) = output {
        series.write_csv(path, &ExportFormat::default())?;
        println!("\nTime series written to: {}", path.display());
    }
    Ok(())
}

fn run_sim(params: &SimParameters, output: Option<&Path>, equations: Option<&Path>) -> Result<()> {
    println!("Model SIM");
    println!("=========\n");
    println!("  Tax rate:            {}", params.tax_rate);
    println!("  Alpha (income):      {}", params.alpha_income);
    println!("  Alpha (wealth):      {}", params.alpha_fin);
    println!("  Government demand:   {}", params.gov_demand_series());
    println!();

    let mut model = build_sim(params)?;
    model.main()?;

    let ts = model.time_series();
    println!("{:>5} {:>12} {:>12} {:>12}", "k", "Output", "HH wealth", "Fiscal bal");
    println!("{}", "-".repeat(44));
    let len = ts.len();
    for k in (0..len).filter(|k| *k < 10 || k % 10 == 0 || *k == len - 1) {
        println!(
            "{:>5} {:>12.4} {:>12.4} {:>12.4}",
            k,
            ts.value("GOOD__SUP_GOOD", k).unwrap_or(f64::NAN),
            ts.value("HH__F", k).unwrap_or(f64::NAN),
            ts.value("GOV__FISCBAL", k).unwrap_or(f64::NAN),
        );
    }

    if let Some(path) = output {
        model.write_csv(path, &ExportFormat::default())?;
        println!("\nTime series written to: {}", path.display());
    }
    if let Some(path) = equations {
        model.write_equation_log(path)?;
        println!("Equations written to: {}", path.display());
    }
    Ok(())
}

fn print_final_values(series: &TimeSeries) {
    println!("\nFinal values:");
    for name in series.column_names() {
        if let Some(v) = series.last(name) {
            println!("  {:<32} {:>14.6}", name, v);
        }
    }
}
