//! The forecast/assimilate loop.

use nd::{Array, Array1, Array2, Array3, ArrayView1, Axis};
use rand::RngCore;
use tracing::debug;

use crate::ensemble::Ensemble;
use crate::{Error, Model, ModelStats, Result, Update};

/// Per-step output of an assimilation run.
#[derive(Clone, Debug)]
pub struct StateSteps {
  /// (T, dim, N): the ensemble after each step's update.
  pub ensembles: Array3<f64>,
  /// (T, dim)
  pub estimates: Array2<f64>,
}
impl StateSteps {
  pub fn new(steps: usize, ensemble_count: usize, n: usize) -> StateSteps {
    StateSteps {
      ensembles: Array::zeros((steps, n, ensemble_count)),
      estimates: Array::zeros((steps, n)),
    }
  }

  pub fn steps(&self) -> usize { self.estimates.dim().0 }

  pub fn store_state<P>(&mut self, step: usize,
                        ensemble: &Ensemble<P>,
                        estimate: ArrayView1<f64>) {
    self.ensembles
      .index_axis_mut(Axis(0), step)
      .assign(&ensemble.states());
    self.estimates
      .index_axis_mut(Axis(0), step)
      .assign(&estimate);
  }
}

pub struct Assimilation<M, U>
  where M: Model,
{
  model: ModelStats<M>,
  filter: U,
  ensemble: Ensemble<M::Params>,
  step: usize,
}

impl<M, U> Assimilation<M, U>
  where M: Model,
        U: Update<M::Params>,
{
  /// Everything the filter and model need from the ensemble is checked here,
  /// so a bad setup never gets as far as the first step.
  pub fn new(model: M, filter: U, ensemble: Ensemble<M::Params>) -> Result<Assimilation<M, U>> {
    model.check()?;
    if ensemble.dim() != model.state_dim() {
      return Err(Error::shape(format!("ensemble states have length {}, model expects {}",
                                      ensemble.dim(), model.state_dim())));
    }
    filter.check(ensemble.len(), ensemble.dim())?;

    Ok(Assimilation {
      model: From::from(model),
      filter: filter,
      ensemble: ensemble,
      step: 0,
    })
  }

  pub fn ensemble(&self) -> &Ensemble<M::Params> { &self.ensemble }
  pub fn filter(&self) -> &U { &self.filter }
  pub fn current_step(&self) -> usize { self.step }
  pub fn model_calls(&self) -> u64 { self.model.calls }

  /// Forecast one step, then fold in `observation` if there is one. Returns
  /// the state estimate for the step.
  pub fn next_step(&mut self,
                   observation: Option<f64>,
                   rand: &mut dyn RngCore) -> Result<Array1<f64>> {
    let step = self.step;

    self.ensemble.forecast(&self.model.model);
    self.model.calls += self.ensemble.len() as u64;
    self.ensemble.check_finite(step)?;

    let estimate = match observation {
      Some(z) => self.filter.update(step, &mut self.ensemble, z, rand)?,
      None => self.ensemble.mean(),
    };

    self.step += 1;
    Ok(estimate)
  }

  /// One step per entry of `observations`, recording every step. Any sized
  /// iterator will do, so callers can wrap it to report progress.
  pub fn run<'a, I>(mut self,
                    observations: I,
                    rand: &mut dyn RngCore) -> Result<StateSteps>
    where I: IntoIterator<Item = &'a Option<f64>>,
          I::IntoIter: ExactSizeIterator,
  {
    let observations = observations.into_iter();
    let mut states = StateSteps::new(observations.len(),
                                     self.ensemble.len(),
                                     self.ensemble.dim());
    for (i, &obs) in observations.enumerate() {
      let estimate = self.next_step(obs, rand)?;
      states.store_state(i, &self.ensemble, estimate.view());
    }
    debug!(model_calls = self.model_calls(), "assimilation finished");
    Ok(states)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, ArrayViewMut1};
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use crate::kalman::EnsembleKalmanFilter;
  use crate::particle::ParticleFilter;
  use crate::OpenLoop;

  /// Constant-velocity model: x += v each step, `v` stored as the derivative.
  struct Walk;
  impl Model for Walk {
    type Params = f64;
    fn state_dim(&self) -> usize { 1 }
    fn step(&self, v: &f64,
            mut state: ArrayViewMut1<f64>,
            mut derivative: ArrayViewMut1<f64>) {
      state[0] += derivative[0];
      derivative[0] = *v;
    }
  }

  struct Blowup;
  impl Model for Blowup {
    type Params = ();
    fn state_dim(&self) -> usize { 1 }
    fn step(&self, _: &(),
            mut state: ArrayViewMut1<f64>,
            _: ArrayViewMut1<f64>) {
      state[0] = state[0] * 1e200 + 1e200;
    }
  }

  struct Frozen;
  impl Model for Frozen {
    type Params = f64;
    fn state_dim(&self) -> usize { 1 }
    fn check(&self) -> Result<()> { Err(Error::config("frozen")) }
    fn step(&self, _: &f64, _: ArrayViewMut1<f64>, _: ArrayViewMut1<f64>) {}
  }

  fn walkers() -> Ensemble<f64> {
    Ensemble::new(arr1(&[0.0]).view(), vec![-1.0, 0.0, 1.0, 2.0]).unwrap()
  }

  #[test]
  fn open_loop_records_every_step() {
    let mut rand = StdRng::seed_from_u64(1);
    let a = Assimilation::new(Walk, OpenLoop, walkers()).unwrap();
    let out = a.run(&[None, Some(3.0), None], &mut rand).unwrap();

    assert_eq!(out.steps(), 3);
    assert_eq!(out.ensembles.dim(), (3, 1, 4));
    assert_eq!(out.ensembles.index_axis(Axis(0), 2).row(0).to_vec(),
               vec![-2.0, 0.0, 2.0, 4.0]);
    assert_eq!(out.estimates[[2, 0]], 1.0);
  }

  #[test]
  fn missing_observation_skips_update() {
    let mut rand = StdRng::seed_from_u64(1);
    let enkf = EnsembleKalmanFilter::new(1.0).unwrap();
    let mut a = Assimilation::new(Walk, enkf, walkers()).unwrap();
    a.next_step(None, &mut rand).unwrap();
    a.next_step(None, &mut rand).unwrap();
    assert_eq!(a.ensemble().states().row(0).to_vec(), vec![-1.0, 0.0, 1.0, 2.0]);
    assert!(a.filter().last_gain().is_none());

    a.next_step(Some(0.5), &mut rand).unwrap();
    assert!(a.filter().last_gain().is_some());
    assert_eq!(a.current_step(), 3);
    assert_eq!(a.model_calls(), 12);
  }

  #[test]
  fn analysis_feeds_next_forecast() {
    let mut rand = StdRng::seed_from_u64(1);
    let enkf = EnsembleKalmanFilter::new(1e-12).unwrap();
    let mut a = Assimilation::new(Walk, enkf, walkers()).unwrap();
    a.next_step(None, &mut rand).unwrap();
    a.next_step(Some(5.0), &mut rand).unwrap();
    // near-perfect observation collapses everyone onto it
    assert!(a.ensemble().states().iter().all(|&x| (x - 5.0).abs() < 1e-6 ));

    // then each member moves on with its own velocity
    a.next_step(None, &mut rand).unwrap();
    let s = a.ensemble().states();
    assert!((s[[0, 0]] - 4.0).abs() < 1e-6);
    assert!((s[[0, 3]] - 7.0).abs() < 1e-6);
  }

  #[test]
  fn boxed_filters_are_interchangeable() {
    let filters: Vec<Box<dyn Update<f64>>> = vec![
      Box::new(OpenLoop),
      Box::new(ParticleFilter::new(1.0, 0.5).unwrap()),
      Box::new(EnsembleKalmanFilter::new(1.0).unwrap()),
    ];
    for f in filters {
      let mut rand = StdRng::seed_from_u64(9);
      let a = Assimilation::new(Walk, f, walkers()).unwrap();
      let out = a.run(&[None, Some(1.0), Some(2.0)], &mut rand).unwrap();
      assert_eq!(out.estimates.dim(), (3, 1));
      assert!(out.estimates.iter().all(|v| v.is_finite() ));
    }
  }

  #[test]
  fn enkf_rejects_single_member_up_front() {
    let e = Ensemble::new(arr1(&[0.0]).view(), vec![1.0]).unwrap();
    let r = Assimilation::new(Walk, EnsembleKalmanFilter::new(1.0).unwrap(), e);
    assert!(matches!(r, Err(Error::Config(_))));
  }

  #[test]
  fn model_is_checked_before_the_first_step() {
    let r = Assimilation::new(Frozen, OpenLoop, walkers());
    assert!(matches!(r, Err(Error::Config(_))));
  }

  #[test]
  fn state_dimension_must_match_model() {
    let e = Ensemble::new(arr1(&[0.0, 0.0]).view(), vec![1.0, 2.0]).unwrap();
    assert!(matches!(Assimilation::new(Walk, OpenLoop, e), Err(Error::Shape(_))));
  }

  #[test]
  fn divergence_fails_fast() {
    let mut rand = StdRng::seed_from_u64(1);
    let e = Ensemble::new(arr1(&[1.0]).view(), vec![(); 2]).unwrap();
    let a = Assimilation::new(Blowup, OpenLoop, e).unwrap();
    match a.run(&[None; 5], &mut rand) {
      Err(Error::Divergence { step: 1, member: Some(0) }) => {},
      other => panic!("unexpected {:?}", other.map(|s| s.steps() )),
    }
  }
}
