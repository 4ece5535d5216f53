//! Ensemble filters for state estimation in small dynamical systems.
//!
//! A [`Model`] advances single ensemble members; an [`Update`] folds one
//! scalar observation back into the whole ensemble. The
//! [`assimilate::Assimilation`] loop ties the two together.

extern crate ndarray as nd;
extern crate num_traits;
extern crate rand;
extern crate thiserror;
extern crate tracing;

use nd::{Array1, ArrayViewMut1};
use rand::RngCore;

pub use error::{Error, Result};

pub mod assimilate;
pub mod ensemble;
pub mod error;
pub mod kalman;
pub mod particle;
pub mod utils;

use ensemble::Ensemble;

pub trait Model {
  /// Per-member parameters, fixed for the member's lifetime.
  type Params;

  fn state_dim(&self) -> usize;
  /// Called once before any member is stepped.
  fn check(&self) -> Result<()> { Ok(()) }
  /// Advance `state` one step using `derivative` from the previous call, then
  /// overwrite `derivative` with its value at the new state.
  fn step(&self, params: &Self::Params,
          state: ArrayViewMut1<f64>,
          derivative: ArrayViewMut1<f64>);
}

impl<'a, M> Model for &'a M
  where M: Model + ?Sized,
{
  type Params = M::Params;
  fn state_dim(&self) -> usize { (**self).state_dim() }
  fn check(&self) -> Result<()> { (**self).check() }
  fn step(&self, params: &M::Params,
          state: ArrayViewMut1<f64>,
          derivative: ArrayViewMut1<f64>) {
    (**self).step(params, state, derivative)
  }
}

#[derive(Debug, Clone)]
pub struct ModelStats<M> {
  pub model: M,
  /// Number of member steps taken so far.
  pub calls: u64,
}
impl<M> From<M> for ModelStats<M> {
  fn from(v: M) -> ModelStats<M> {
    ModelStats {
      model: v,
      calls: 0,
    }
  }
}

/// An assimilation update: folds one observation into the forecast ensemble
/// and returns the state estimate.
pub trait Update<P> {
  /// Called once when the loop is built, before any step runs.
  fn check(&self, _ensemble_count: usize, _state_dim: usize) -> Result<()> {
    Ok(())
  }

  fn update(&mut self,
            step: usize,
            ensemble: &mut Ensemble<P>,
            observation: f64,
            rand: &mut dyn RngCore) -> Result<Array1<f64>>;
}

impl<P, U> Update<P> for Box<U>
  where U: Update<P> + ?Sized,
{
  fn check(&self, ensemble_count: usize, state_dim: usize) -> Result<()> {
    (**self).check(ensemble_count, state_dim)
  }
  fn update(&mut self,
            step: usize,
            ensemble: &mut Ensemble<P>,
            observation: f64,
            rand: &mut dyn RngCore) -> Result<Array1<f64>> {
    (**self).update(step, ensemble, observation, rand)
  }
}

/// No update at all; the ensemble runs free and the estimate is its mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenLoop;

impl<P> Update<P> for OpenLoop {
  fn update(&mut self,
            _step: usize,
            ensemble: &mut Ensemble<P>,
            _observation: f64,
            _rand: &mut dyn RngCore) -> Result<Array1<f64>> {
    Ok(ensemble.mean())
  }
}
