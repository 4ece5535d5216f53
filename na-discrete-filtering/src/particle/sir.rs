//! Sequential importance resampling with a scalar observation of one state
//! component.
//!
//! Each step weighs the forecast members by the Gaussian likelihood of the
//! observation, takes the weighted mean as the estimate, and, when the
//! effective sample size says so, rebuilds the ensemble by systematic
//! resampling.

use nd::{Array1, ArrayView1, ArrayView2, Axis};
use rand::{Rng, RngCore};
use tracing::{debug, warn};

use crate::ensemble::Ensemble;
use crate::{Error, Result, Update};

/// How a member's distance from the observation becomes a likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikelihoodForm {
  /// `exp(-e² / 2R)`.
  Gaussian,
  /// `exp(-e² R / 2)`, multiplying by the variance instead of dividing.
  /// Only useful to reproduce runs made with that formula.
  Reference,
}
impl Default for LikelihoodForm {
  fn default() -> Self { LikelihoodForm::Gaussian }
}

/// When to resample, given the threshold `n_eff_fraction * N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleTrigger {
  /// Resample once the effective size drops under the threshold.
  BelowThreshold,
  /// Resample while the effective size is *above* the threshold.
  Reference,
}
impl Default for ResampleTrigger {
  fn default() -> Self { ResampleTrigger::BelowThreshold }
}
impl ResampleTrigger {
  pub fn fires(&self, n_eff: f64, threshold: f64) -> bool {
    match self {
      &ResampleTrigger::BelowThreshold => n_eff < threshold,
      &ResampleTrigger::Reference => threshold < n_eff,
    }
  }
}

/// Which ensemble the weighted-mean estimate is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateTiming {
  /// The weighted forecast, before any resampling.
  Forecast,
  /// The resampled members, still weighted by the pre-reset weights of their
  /// slots. Identical to `Forecast` on steps that don't resample.
  Reference,
}
impl Default for EstimateTiming {
  fn default() -> Self { EstimateTiming::Forecast }
}

/// What to do when every likelihood underflows to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegeneracyPolicy {
  /// Carry on with uniform weights.
  Uniform,
  Fail,
}
impl Default for DegeneracyPolicy {
  fn default() -> Self { DegeneracyPolicy::Uniform }
}

/// Likelihood of `observation` for each member (column) of `states`, looking
/// only at component `observed`.
pub fn likelihoods(states: ArrayView2<f64>,
                   observation: f64,
                   observed: usize,
                   variance: f64,
                   form: LikelihoodForm) -> Array1<f64> {
  states
    .row(observed)
    .mapv(|x| {
      let error = (x - observation).abs();
      match form {
        LikelihoodForm::Gaussian => (-0.5 * error * error / variance).exp(),
        LikelihoodForm::Reference => (-0.5 * error * variance * error).exp(),
      }
    })
}

/// Scale `likelihoods` to sum to one.
pub fn normalize_weights(likelihoods: ArrayView1<f64>,
                         policy: DegeneracyPolicy) -> Result<Array1<f64>> {
  let sum = likelihoods.sum();
  if sum > 0.0 && sum.is_finite() {
    return Ok(likelihoods.mapv(|l| l / sum ));
  }

  match policy {
    DegeneracyPolicy::Uniform => {
      warn!(sum, members = likelihoods.len(),
            "likelihoods degenerate, falling back to uniform weights");
      let n = likelihoods.len() as f64;
      Ok(Array1::from_elem(likelihoods.len(), 1.0 / n))
    },
    DegeneracyPolicy::Fail => Err(Error::DegenerateEnsemble { sum: sum }),
  }
}

/// `1 / Σw²`; N for uniform weights, 1 when a single member holds all of it.
pub fn effective_sample_size(weights: ArrayView1<f64>) -> f64 {
  1.0 / weights.iter().map(|w| w * w ).sum::<f64>()
}

/// Weighted average of each state component over the members.
pub fn weighted_mean(states: ArrayView2<f64>, weights: ArrayView1<f64>) -> Array1<f64> {
  states.dot(&weights) / weights.sum()
}

/// Systematic resampling: one uniform offset `r` in `[0, 1/N)`, then member
/// `k` of the new ensemble is the first old member whose cumulative weight
/// reaches `r + k/N`.
pub fn systematic_resample<R>(weights: ArrayView1<f64>, rand: &mut R) -> Vec<usize>
  where R: Rng + ?Sized,
{
  let n = weights.len();
  let step = 1.0 / n as f64;

  let mut cumulative = weights.to_owned();
  cumulative.accumulate_axis_inplace(Axis(0), |&prev, cur| *cur += prev );

  let mut pointer = rand.gen::<f64>() * step;
  let mut j = 0;
  let mut indices = Vec::with_capacity(n);
  for _ in 0..n {
    // rounding can leave the last cumulative weight a hair under one
    while j < n - 1 && cumulative[j] < pointer {
      j += 1;
    }
    indices.push(j);
    pointer += step;
  }

  indices
}

#[derive(Debug, Clone)]
pub struct ParticleFilter {
  measurement_variance: f64,
  n_eff_fraction: f64,
  resample: bool,
  observed: usize,
  likelihood: LikelihoodForm,
  trigger: ResampleTrigger,
  degeneracy: DegeneracyPolicy,
  estimate: EstimateTiming,

  last_n_eff: Option<f64>,
  resample_count: u64,
}

impl ParticleFilter {
  pub fn new(measurement_variance: f64, n_eff_fraction: f64) -> Result<ParticleFilter> {
    if !(measurement_variance > 0.0) {
      return Err(Error::config(format!("measurement variance must be positive, got {}",
                                       measurement_variance)));
    }
    if !(n_eff_fraction >= 0.0 && n_eff_fraction <= 1.0) {
      return Err(Error::config(format!("effective size fraction must be in [0, 1], got {}",
                                       n_eff_fraction)));
    }

    Ok(ParticleFilter {
      measurement_variance: measurement_variance,
      n_eff_fraction: n_eff_fraction,
      resample: true,
      observed: 0,
      likelihood: Default::default(),
      trigger: Default::default(),
      degeneracy: Default::default(),
      estimate: Default::default(),

      last_n_eff: None,
      resample_count: 0,
    })
  }

  pub fn with_resampling(mut self, enabled: bool) -> Self {
    self.resample = enabled;
    self
  }
  pub fn with_observed(mut self, component: usize) -> Self {
    self.observed = component;
    self
  }
  pub fn with_likelihood(mut self, form: LikelihoodForm) -> Self {
    self.likelihood = form;
    self
  }
  pub fn with_trigger(mut self, trigger: ResampleTrigger) -> Self {
    self.trigger = trigger;
    self
  }
  pub fn with_degeneracy(mut self, policy: DegeneracyPolicy) -> Self {
    self.degeneracy = policy;
    self
  }
  pub fn with_estimate(mut self, timing: EstimateTiming) -> Self {
    self.estimate = timing;
    self
  }

  /// Effective sample size seen on the most recent update.
  pub fn last_n_eff(&self) -> Option<f64> { self.last_n_eff }
  pub fn resample_count(&self) -> u64 { self.resample_count }
}

impl<P> Update<P> for ParticleFilter {
  fn check(&self, _ensemble_count: usize, state_dim: usize) -> Result<()> {
    if self.observed >= state_dim {
      return Err(Error::config(format!("observed component {} out of range for state of length {}",
                                       self.observed, state_dim)));
    }
    Ok(())
  }

  fn update(&mut self,
            step: usize,
            ensemble: &mut Ensemble<P>,
            observation: f64,
            rand: &mut dyn RngCore) -> Result<Array1<f64>> {
    let states = ensemble.states();
    let l = likelihoods(states.view(), observation, self.observed,
                        self.measurement_variance, self.likelihood);
    let weights = normalize_weights(l.view(), self.degeneracy)?;
    ensemble.set_weights(weights.view())?;

    let mut estimate = weighted_mean(states.view(), weights.view());
    let n_eff = effective_sample_size(weights.view());
    self.last_n_eff = Some(n_eff);

    let threshold = self.n_eff_fraction * ensemble.len() as f64;
    if self.resample && self.trigger.fires(n_eff, threshold) {
      debug!(step, n_eff, threshold, "resampling particles");
      let indices = systematic_resample(weights.view(), rand);
      ensemble.resample(&indices[..])?;
      self.resample_count += 1;

      if self.estimate == EstimateTiming::Reference {
        estimate = weighted_mean(ensemble.states().view(), weights.view());
      }
    }

    Ok(estimate)
  }
}
