//! Flexible Constellation Deployment CLI
//!
//! Runs the fixed vs flexible deployment experiment and post-processes
//! result files.
//!
//! Usage:
//!   flex-sim init --output inputs.json
//!   flex-sim run --input inputs.json --output results.cz --compact --seed 42
//!   flex-sim heatmap --results results.cz --x r --y J --metric "flexM.ELCC / xTrad.LCC"
//!   flex-sim decode --input results.cz --output results.json

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use demand_model::DemandScenarios;
use flex_sim::codec::{load_results, save_results};
use flex_sim::config::{load_config, save_config, SimulationInputs};
use flex_sim::metrics::{dollars, heatmap, HeatmapConfig, HeatmapConstants, SweepParam};
use flex_sim::optimizer::{best_multi, best_single};
use flex_sim::{run_experiment, InputConfig, OutputMetric};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "flex-sim",
    about = "Compare fixed and flexible multi-layer constellation deployments"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default input configuration
    Init {
        #[arg(short, long, default_value = "inputs.json")]
        output: PathBuf,
    },

    /// Run the full experiment
    Run {
        /// Input configuration JSON (defaults when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output results file
        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Index-encode and compress the results file
        #[arg(long)]
        compact: bool,

        /// RNG seed for demand scenarios (overrides the input file)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Build a heatmap of one output metric from a results file
    Heatmap {
        /// Results file written by `run`
        #[arg(short, long)]
        results: PathBuf,

        /// Parameter along columns (r, rec, σ, J, Lm)
        #[arg(long)]
        x: SweepParam,

        /// Parameter along rows (r, rec, σ, J, Lm)
        #[arg(long)]
        y: SweepParam,

        #[arg(short, long, default_value = "flexM.ELCC / xTrad.LCC")]
        metric: OutputMetric,

        #[arg(long, default_value_t = 0.1)]
        r: f64,

        #[arg(long, default_value_t = 0.2)]
        rec: f64,

        #[arg(long, default_value_t = 0.2)]
        sigma: f64,

        #[arg(long, default_value_t = 1.5)]
        jump: f64,

        #[arg(long, default_value_t = 2)]
        layers: usize,

        /// Use the best strategy of each case instead of --jump/--layers
        #[arg(long)]
        optimal: bool,

        /// Write the heatmap as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rewrite a compact results file as plain JSON
    Decode {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Init { output } => {
            save_config(&output, &InputConfig::default())?;
            info!("Wrote default inputs to {:?}", output);
        }
        Command::Run { input, output, compact, seed } => run(input, output, compact, seed)?,
        Command::Heatmap {
            results,
            x,
            y,
            metric,
            r,
            rec,
            sigma,
            jump,
            layers,
            optimal,
            output,
        } => {
            let constants = HeatmapConstants { r, rec, sigma, jump, max_layers: layers, optimal };
            render_heatmap(results, x, y, metric, constants, output)?;
        }
        Command::Decode { input, output } => {
            let saved = load_results(&input)?;
            save_results(&output, &saved.inputs, &saved.results, false)?;
        }
    }

    Ok(())
}

fn banner(title: &str) {
    info!("{}", "=".repeat(60));
    info!("{}", title);
    info!("{}", "=".repeat(60));
}

fn run(input: Option<PathBuf>, output: PathBuf, compact: bool, seed: Option<u64>) -> Result<()> {
    banner("Flexible Constellation Deployment Simulator");

    let mut config = match &input {
        Some(path) => load_config(path).with_context(|| format!("loading inputs from {:?}", path))?,
        None => {
            info!("No input file given, using defaults");
            InputConfig::default()
        }
    };
    let seed = seed.or(config.seed).unwrap_or_else(rand::random);
    config.seed = Some(seed);
    info!("Seed: {}", seed);

    log_demand_summary(&config, seed)?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} strategies ({eta})")?
            .progress_chars("##-"),
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let results = run_experiment(&config, &mut rng, |p| {
        pb.set_length(p.total as u64);
        pb.set_position(p.completed as u64);
    })?;
    pb.finish_and_clear();

    save_results(&output, &config, &results, compact)?;

    // Summary
    banner("SUMMARY");
    info!(
        "{} cases, {} families, {} configurations",
        results.metadata.cases, results.metadata.families, results.metadata.configurations
    );
    for record in &results.traditional {
        let case = record.case;
        let flex = results.flex_for(&case);
        let (single, multi) = {
            let all: Vec<_> = flex.collect();
            (best_single(all.iter().copied()).cloned(), best_multi(all.iter().copied()).cloned())
        };
        info!("r={} rec={} σ={}", case.r, case.rec, case.sigma);
        info!("  xTrad  LCC:  {}", dollars(record.result.lcc));
        match single {
            Some(s) => info!("  flexS ELCC:  {} (J={}, avgR={})", dollars(s.elcc), s.strategy.jump, s.avg_reconfigurations),
            None => warn!("  flexS: no feasible strategy"),
        }
        match multi {
            Some(m) => info!(
                "  flexM ELCC:  {} (J={}, Lm={}, avgN={}, avgR={})",
                dollars(m.elcc),
                m.strategy.jump,
                m.strategy.max_layers,
                m.avg_new_layers,
                m.avg_reconfigurations
            ),
            None => warn!("  flexM: no feasible strategy"),
        }
    }
    info!("Results written to {:?}", output);

    Ok(())
}

/// Expected and sampled final demand of the first case
fn log_demand_summary(config: &InputConfig, seed: u64) -> Result<()> {
    let Some(case) = config.scenario_space()?.enumerate().into_iter().next() else {
        bail!("scenario tradespace is empty");
    };
    let inputs = SimulationInputs::from_case(config.simulation, &case)?;
    let params = inputs.constants.demand_params();
    let mut rng = StdRng::seed_from_u64(seed);
    let demand = DemandScenarios::generate(&params, inputs.sigma, inputs.scenarios, &mut rng)?;

    info!("Expected final demand: {:.0} channels", demand.expected_final());
    if let Some((min, max)) = demand.final_range() {
        info!("Scenario final demand: {:.0} .. {:.0} channels", min, max);
    }
    Ok(())
}

fn render_heatmap(
    results: PathBuf,
    x: SweepParam,
    y: SweepParam,
    metric: OutputMetric,
    constants: HeatmapConstants,
    output: Option<PathBuf>,
) -> Result<()> {
    let saved = load_results(&results)?;
    let config = HeatmapConfig::from_inputs(&saved.inputs, x, y, constants, metric)?;
    let map = heatmap(&saved.results, config)?;

    banner(&format!("{}: {} (cols) x {} (rows)", metric, x, y));
    let cells = map.formatted();
    let header: Vec<String> = map.config.x.values.iter().map(|v| format!("{:>12}", v)).collect();
    info!("{:>8} {}", "", header.join(""));
    for (row, yv) in map.config.y.values.iter().enumerate() {
        let line: Vec<String> = (0..map.cols())
            .map(|col| format!("{:>12}", cells[row * map.cols() + col]))
            .collect();
        info!("{:>8} {}", yv, line.join(""));
    }

    if let Some(path) = output {
        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &map)?;
        info!("Heatmap written to {:?}", path);
    }
    Ok(())
}
