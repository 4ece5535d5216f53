//! Run configuration. Any serde format will do; nothing here reads files.

use serde::{Deserialize, Serialize};

use na_df::{Error, Result};
use na_df::kalman::GainForm;
use na_df::particle::{DegeneracyPolicy, EstimateTiming, LikelihoodForm, ResampleTrigger};

use crate::{ParameterSet, State};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
  pub initial: State,
  pub params: ParameterSet,
}
impl Default for RunSettings {
  fn default() -> Self {
    RunSettings {
      initial: State::new(1.0, 1.0, 1.0),
      params: Default::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementSettings {
  pub variance: f64,
  /// Observe `u` on every step whose index is a multiple of this.
  pub frequency: usize,
}
impl Default for MeasurementSettings {
  fn default() -> Self {
    MeasurementSettings {
      variance: 1.0,
      frequency: 10,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
  Gaussian,
  Reference,
}
impl From<Likelihood> for LikelihoodForm {
  fn from(v: Likelihood) -> LikelihoodForm {
    match v {
      Likelihood::Gaussian => LikelihoodForm::Gaussian,
      Likelihood::Reference => LikelihoodForm::Reference,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
  BelowThreshold,
  Reference,
}
impl From<Trigger> for ResampleTrigger {
  fn from(v: Trigger) -> ResampleTrigger {
    match v {
      Trigger::BelowThreshold => ResampleTrigger::BelowThreshold,
      Trigger::Reference => ResampleTrigger::Reference,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
  Uniform,
  Fail,
}
impl From<Degeneracy> for DegeneracyPolicy {
  fn from(v: Degeneracy) -> DegeneracyPolicy {
    match v {
      Degeneracy::Uniform => DegeneracyPolicy::Uniform,
      Degeneracy::Fail => DegeneracyPolicy::Fail,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimate {
  Forecast,
  Reference,
}
impl From<Estimate> for EstimateTiming {
  fn from(v: Estimate) -> EstimateTiming {
    match v {
      Estimate::Forecast => EstimateTiming::Forecast,
      Estimate::Reference => EstimateTiming::Reference,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gain {
  Scalar,
  Reference,
}
impl From<Gain> for GainForm {
  fn from(v: Gain) -> GainForm {
    match v {
      Gain::Scalar => GainForm::Scalar,
      Gain::Reference => GainForm::Reference,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
  /// Resampling threshold as a fraction of the ensemble size.
  pub n_eff_fraction: f64,
  pub resample: bool,
  pub likelihood: Likelihood,
  pub trigger: Trigger,
  pub degeneracy: Degeneracy,
  /// Take the estimate before or after resampling.
  pub estimate: Estimate,
}
impl Default for ParticleSettings {
  fn default() -> Self {
    ParticleSettings {
      n_eff_fraction: 0.5,
      resample: true,
      likelihood: Likelihood::Gaussian,
      trigger: Trigger::BelowThreshold,
      degeneracy: Degeneracy::Uniform,
      estimate: Estimate::Forecast,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanSettings {
  pub gain: Gain,
}
impl Default for KalmanSettings {
  fn default() -> Self {
    KalmanSettings { gain: Gain::Scalar, }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub ensemble_count: usize,
  pub delta_t: f64,
  pub steps: usize,
  pub seed: u64,

  /// The truth run.
  pub base: RunSettings,
  /// The biased model every ensemble member starts from.
  pub modified: RunSettings,
  /// Standard deviations of the relative noise applied to `modified.params`.
  pub perturbation: ParameterSet,

  pub measurement: MeasurementSettings,
  pub particle: ParticleSettings,
  pub kalman: KalmanSettings,

  pub run_pf: bool,
  pub run_enkf: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Settings {
      ensemble_count: 50,
      delta_t: 0.01,
      steps: 2000,
      seed: 1,

      base: Default::default(),
      modified: RunSettings {
        initial: State::new(1.5, 1.2, 0.8),
        params: ParameterSet::new(10.5, 27.0, 8.0 / 3.0),
      },
      perturbation: ParameterSet::new(0.05, 0.05, 0.05),

      measurement: Default::default(),
      particle: Default::default(),
      kalman: Default::default(),

      run_pf: true,
      run_enkf: true,
    }
  }
}

impl Settings {
  pub fn validate(&self) -> Result<()> {
    if self.ensemble_count == 0 {
      return Err(Error::config("ensemble_count must be at least 1"));
    }
    if self.run_enkf && self.ensemble_count < 2 {
      return Err(Error::config(format!("the EnKF needs at least two members, got {}",
                                       self.ensemble_count)));
    }
    if !(self.delta_t > 0.0) || !self.delta_t.is_finite() {
      return Err(Error::config(format!("delta_t must be positive and finite, got {}",
                                       self.delta_t)));
    }
    if self.steps == 0 {
      return Err(Error::config("steps must be at least 1"));
    }

    let p = &self.perturbation;
    for &(name, scale) in &[("rho", p.rho), ("psi", p.psi), ("beta", p.beta)] {
      if !(scale >= 0.0) || !scale.is_finite() {
        return Err(Error::config(format!("perturbation scale for {} must be finite and \
                                          non-negative, got {}", name, scale)));
      }
    }

    if !(self.measurement.variance > 0.0) {
      return Err(Error::config(format!("measurement variance must be positive, got {}",
                                       self.measurement.variance)));
    }
    if self.measurement.frequency == 0 {
      return Err(Error::config("measurement frequency must be at least 1"));
    }
    let f = self.particle.n_eff_fraction;
    if !(f >= 0.0 && f <= 1.0) {
      return Err(Error::config(format!("effective size fraction must be in [0, 1], got {}",
                                       f)));
    }

    Ok(())
  }
}
