extern crate anyhow;
extern crate clap;
extern crate ndarray as nd;
extern crate rand;
extern crate sixty_three;
extern crate tracing;
extern crate tracing_subscriber;
extern crate util;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};

use util::StateSteps;
use util::data::{quantile_band, rmse};

use sixty_three::experiment::{Experiment, FilterKind};
use sixty_three::settings::Settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Filter {
  Pf,
  Enkf,
  Both,
  OpenLoop,
}

#[derive(Parser, Debug)]
#[command(name = "sixty-three", about = "Particle filter vs. EnKF on the Lorenz '63 system")]
struct Cli {
  /// Seed for the parameter perturbation and resampling.
  #[arg(long, default_value_t = 1)]
  seed: u64,
  #[arg(long, value_enum, default_value_t = Filter::Both)]
  filter: Filter,
  /// Override the ensemble size.
  #[arg(long)]
  ensemble: Option<usize>,
  /// Override the number of timesteps.
  #[arg(long)]
  steps: Option<usize>,
  /// Observe `u` every this many steps.
  #[arg(long)]
  frequency: Option<usize>,
  #[arg(long)]
  no_progress: bool,
  #[arg(long, default_value_t = Level::INFO)]
  log_level: Level,
}

impl Cli {
  fn settings(&self) -> Settings {
    let mut s = Settings::default();
    s.seed = self.seed;
    if let Some(n) = self.ensemble { s.ensemble_count = n; }
    if let Some(n) = self.steps { s.steps = n; }
    if let Some(f) = self.frequency { s.measurement.frequency = f; }
    let (pf, enkf) = match self.filter {
      Filter::Pf => (true, false),
      Filter::Enkf => (false, true),
      Filter::Both => (true, true),
      Filter::OpenLoop => (false, false),
    };
    s.run_pf = pf;
    s.run_enkf = enkf;
    s
  }
}

fn summarize(experiment: &Experiment, kind: FilterKind, states: &StateSteps) -> anyhow::Result<()> {
  let err = rmse(&states.estimates.t(), &experiment.truth)?;
  let model_err = rmse(&experiment.model_run, &experiment.truth)?;
  let (lo, hi) = quantile_band(states, 0.05, 0.95);
  let spread = (&hi - &lo).mean_axis(nd::Axis(0));

  info!("{} rmse (u, v, w): {:.4} {:.4} {:.4}", kind, err[0], err[1], err[2]);
  info!("modified model rmse (u, v, w): {:.4} {:.4} {:.4}",
        model_err[0], model_err[1], model_err[2]);
  if let Some(spread) = spread {
    info!("{} mean 5%-95% spread (u, v, w): {:.4} {:.4} {:.4}",
          kind, spread[0], spread[1], spread[2]);
  }
  Ok(())
}

fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  tracing_subscriber::fmt()
    .with_max_level(cli.log_level)
    .with_writer(::std::io::stderr)
    .init();

  let settings = cli.settings();
  let mut rand = StdRng::seed_from_u64(settings.seed);
  let experiment = Experiment::prepare(settings, &mut rand)
    .context("preparing the experiment")?;

  let mut kinds = experiment.selected_filters();
  if cli.filter == Filter::OpenLoop {
    kinds.push(FilterKind::OpenLoop);
  }

  for kind in kinds {
    let states = experiment.assimilate_with_progress(kind, &mut rand, !cli.no_progress)
      .with_context(|| format!("{} failed", kind))?;
    summarize(&experiment, kind, &states)?;
  }

  Ok(())
}
