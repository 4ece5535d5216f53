//! Common stuffs for ensembles/particles

use nd::{Array, Array1, Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::{Error, Model, Result};
use crate::utils::all_finite;

#[derive(Debug, Clone, PartialEq)]
pub struct Member<P> {
  pub state: Array1<f64>,
  /// Derivative at `state`, consumed by the next step.
  pub derivative: Array1<f64>,
  pub params: P,
  /// Only meaningful between weighting and the end of an update.
  pub weight: f64,
}

/// A fixed-size collection of members sharing one state dimension.
#[derive(Debug, Clone)]
pub struct Ensemble<P> {
  members: Vec<Member<P>>,
  dim: usize,
}

impl<P> Ensemble<P> {
  /// Every member starts at `initial` with a zero derivative; only the
  /// parameters differ.
  pub fn new(initial: ArrayView1<f64>, params: Vec<P>) -> Result<Ensemble<P>> {
    if params.is_empty() {
      return Err(Error::config("ensemble must have at least one member"));
    }

    let dim = initial.len();
    let uniform = 1.0 / params.len() as f64;
    let members = params
      .into_iter()
      .map(|params| Member {
        state: initial.to_owned(),
        derivative: Array::zeros(dim),
        params: params,
        weight: uniform,
      })
      .collect();

    Ok(Ensemble {
      members: members,
      dim: dim,
    })
  }

  pub fn len(&self) -> usize { self.members.len() }
  pub fn dim(&self) -> usize { self.dim }
  pub fn members(&self) -> &[Member<P>] { &self.members[..] }
  pub fn members_mut(&mut self) -> &mut [Member<P>] { &mut self.members[..] }

  /// Member states as columns, (dim × N).
  pub fn states(&self) -> Array2<f64> {
    let mut out = Array::zeros((self.dim, self.len()));
    for (mut col, m) in out.axis_iter_mut(Axis(1)).zip(self.members.iter()) {
      col.assign(&m.state);
    }
    out
  }
  pub fn derivatives(&self) -> Array2<f64> {
    let mut out = Array::zeros((self.dim, self.len()));
    for (mut col, m) in out.axis_iter_mut(Axis(1)).zip(self.members.iter()) {
      col.assign(&m.derivative);
    }
    out
  }

  /// Replace every member state at once from a (dim × N) matrix.
  pub fn assign_states(&mut self, states: ArrayView2<f64>) -> Result<()> {
    if states.dim() != (self.dim, self.len()) {
      return Err(Error::shape(format!("expected states of shape {:?}, got {:?}",
                                      (self.dim, self.len()), states.dim())));
    }
    for (m, col) in self.members.iter_mut().zip(states.axis_iter(Axis(1))) {
      m.state.assign(&col);
    }
    Ok(())
  }

  pub fn weights(&self) -> Array1<f64> {
    self.members.iter().map(|m| m.weight ).collect()
  }
  pub fn set_weights(&mut self, weights: ArrayView1<f64>) -> Result<()> {
    if weights.len() != self.len() {
      return Err(Error::shape(format!("{} weights for {} members",
                                      weights.len(), self.len())));
    }
    for (m, &w) in self.members.iter_mut().zip(weights.iter()) {
      m.weight = w;
    }
    Ok(())
  }
  pub fn reset_weights(&mut self) {
    let uniform = 1.0 / self.len() as f64;
    for m in self.members.iter_mut() {
      m.weight = uniform;
    }
  }

  /// Rebuild the ensemble from `indices` in one batch: slot `k` takes the
  /// state of member `indices[k]`. The lagged derivative and the parameters
  /// stay with their slot, and weights go back to uniform.
  pub fn resample(&mut self, indices: &[usize]) -> Result<()> {
    if indices.len() != self.len() {
      return Err(Error::shape(format!("{} resample indices for {} members",
                                      indices.len(), self.len())));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i >= self.len() ) {
      return Err(Error::shape(format!("resample index {} out of range", bad)));
    }

    let picked: Vec<_> = indices
      .iter()
      .map(|&i| self.members[i].state.clone() )
      .collect();
    for (m, state) in self.members.iter_mut().zip(picked.into_iter()) {
      m.state = state;
    }
    self.reset_weights();
    Ok(())
  }

  /// Unweighted mean over members.
  pub fn mean(&self) -> Array1<f64> {
    let mut m: Array1<f64> = Array::zeros(self.dim);
    for member in self.members.iter() {
      m += &member.state;
    }
    m / self.len() as f64
  }

  /// Advance every member by one model step. Member `i` only ever reads its
  /// own state, derivative and parameters.
  pub fn forecast<M>(&mut self, model: &M)
    where M: Model<Params = P>,
  {
    for m in self.members.iter_mut() {
      model.step(&m.params, m.state.view_mut(), m.derivative.view_mut());
    }
  }

  /// Fails with the index of the first member holding a NaN or infinity.
  pub fn check_finite(&self, step: usize) -> Result<()> {
    match self.members.iter().position(|m| !all_finite(&m.state) ) {
      Some(member) => Err(Error::Divergence {
        step: step,
        member: Some(member),
      }),
      None => Ok(()),
    }
  }
}

/// Forecast-only output: states and derivatives as (T, dim, N).
#[derive(Debug, Clone)]
pub struct Forecast {
  pub states: Array3<f64>,
  pub derivatives: Array3<f64>,
}

/// Run the ensemble forward for `steps` steps without any assimilation.
pub fn propagate<M>(model: &M,
                    initial: ArrayView1<f64>,
                    params: Vec<M::Params>,
                    steps: usize) -> Result<Forecast>
  where M: Model,
{
  model.check()?;
  if initial.len() != model.state_dim() {
    return Err(Error::shape(format!("initial state has length {}, model expects {}",
                                    initial.len(), model.state_dim())));
  }
  let mut ensemble = Ensemble::new(initial, params)?;
  let shape = (steps, ensemble.dim(), ensemble.len());
  let mut out = Forecast {
    states: Array::zeros(shape),
    derivatives: Array::zeros(shape),
  };

  for step in 0..steps {
    ensemble.forecast(model);
    ensemble.check_finite(step)?;
    out.states
      .index_axis_mut(Axis(0), step)
      .assign(&ensemble.states());
    out.derivatives
      .index_axis_mut(Axis(0), step)
      .assign(&ensemble.derivatives());
  }

  Ok(out)
}
