//! Everything a filter comparison needs, derived from one [`Settings`]: the
//! truth and biased-model trajectories, the observations, and the perturbed
//! ensemble parameters.

use std::borrow::Cow;
use std::fmt;

use nd::{Array1, Array2};
use rand::{Rng, RngCore};
use tracing::info;

use na_df::{OpenLoop, Result, Update};
use na_df::assimilate::{Assimilation, StateSteps};
use na_df::ensemble::Ensemble;
use na_df::kalman::EnsembleKalmanFilter;
use na_df::particle::ParticleFilter;

use util::data::{subsample, time_array};
use util::progress::ReportingIterator;

use crate::{run_deterministic, L63Model, ParameterSet};
use crate::prep::{ensemble_params, parameter_series};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
  Particle,
  Kalman,
  /// Forecast only; useful as a baseline.
  OpenLoop,
}
impl fmt::Display for FilterKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let name = match self {
      &FilterKind::Particle => "particle filter",
      &FilterKind::Kalman => "EnKF",
      &FilterKind::OpenLoop => "open loop",
    };
    f.write_str(name)
  }
}

pub type L63Assimilation = Assimilation<L63Model, Box<dyn Update<ParameterSet>>>;

#[derive(Debug, Clone)]
pub struct Experiment {
  pub settings: Settings,
  pub times: Array1<f64>,
  /// (3 × T) run with the base parameters.
  pub truth: Array2<f64>,
  /// (3 × T) run with the unperturbed modified parameters.
  pub model_run: Array2<f64>,
  pub observations: Vec<Option<f64>>,
  pub ensemble_params: Vec<ParameterSet>,
}

impl Experiment {
  pub fn prepare<R>(settings: Settings, rand: &mut R) -> Result<Experiment>
    where R: Rng + ?Sized,
  {
    settings.validate()?;

    let times = time_array(settings.steps, settings.delta_t);

    info!(steps = settings.steps, "running base model");
    let base = parameter_series(&settings.base.params, settings.steps);
    let truth = run_deterministic(&base[..], settings.base.initial,
                                  times.view(), settings.delta_t)?;

    info!("running modified model");
    let modified = parameter_series(&settings.modified.params, settings.steps);
    let model_run = run_deterministic(&modified[..], settings.modified.initial,
                                      times.view(), settings.delta_t)?;

    info!(members = settings.ensemble_count, "creating ensemble parameters");
    let ensemble_params = ensemble_params(&settings, rand)?;

    info!(frequency = settings.measurement.frequency, "creating measurements");
    let observations = subsample(truth.row(0), settings.measurement.frequency)?;

    Ok(Experiment {
      settings: settings,
      times: times,
      truth: truth,
      model_run: model_run,
      observations: observations,
      ensemble_params: ensemble_params,
    })
  }

  /// The filters switched on in the settings, particle filter first.
  pub fn selected_filters(&self) -> Vec<FilterKind> {
    let mut out = Vec::new();
    if self.settings.run_pf { out.push(FilterKind::Particle); }
    if self.settings.run_enkf { out.push(FilterKind::Kalman); }
    out
  }

  pub fn build_filter(&self, kind: FilterKind) -> Result<Box<dyn Update<ParameterSet>>> {
    let measurement = &self.settings.measurement;
    let filter: Box<dyn Update<ParameterSet>> = match kind {
      FilterKind::Particle => {
        let p = &self.settings.particle;
        let pf = ParticleFilter::new(measurement.variance, p.n_eff_fraction)?
          .with_resampling(p.resample)
          .with_likelihood(p.likelihood.into())
          .with_trigger(p.trigger.into())
          .with_degeneracy(p.degeneracy.into())
          .with_estimate(p.estimate.into());
        Box::new(pf)
      },
      FilterKind::Kalman => {
        let enkf = EnsembleKalmanFilter::new(measurement.variance)?
          .with_gain(self.settings.kalman.gain.into());
        Box::new(enkf)
      },
      FilterKind::OpenLoop => Box::new(OpenLoop),
    };
    Ok(filter)
  }

  /// A fresh ensemble at the modified initial state, ready to step.
  pub fn assimilation(&self, kind: FilterKind) -> Result<L63Assimilation> {
    let initial = self.settings.modified.initial.to_array();
    let ensemble = Ensemble::new(initial.view(), self.ensemble_params.clone())?;
    let model = L63Model { delta_t: self.settings.delta_t };
    Assimilation::new(model, self.build_filter(kind)?, ensemble)
  }

  pub fn assimilate(&self, kind: FilterKind, rand: &mut dyn RngCore) -> Result<StateSteps> {
    self.assimilate_with_progress(kind, rand, false)
  }

  /// [`Experiment::assimilate`], optionally drawing a progress bar on stderr.
  pub fn assimilate_with_progress(&self, kind: FilterKind,
                                  rand: &mut dyn RngCore,
                                  progress: bool) -> Result<StateSteps> {
    if kind == FilterKind::Particle && self.settings.particle.resample {
      info!("running {} with resampling", kind);
    } else {
      info!("running {}", kind);
    }

    let name: Cow<'static, str> = kind.to_string().into();
    let obs = if progress {
      ReportingIterator::new(self.observations.iter(), name)
    } else {
      ReportingIterator::hidden(self.observations.iter(), name)
    };
    let states = self.assimilation(kind)?.run(obs, rand)?;
    info!("{} done", kind);
    Ok(states)
  }
}
