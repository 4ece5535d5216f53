//! The Lorenz '63 system as a data assimilation testbed.
//!
//! Integration uses a lagged explicit Euler scheme: each step moves the state
//! along the derivative computed on the *previous* step, then evaluates the
//! derivative at the new state for the next one.

extern crate ndarray as nd;
extern crate ndarray_rand as nd_rand;
extern crate na_discrete_filtering as na_df;
extern crate rand;
extern crate serde;
extern crate tracing;
extern crate util;

use nd::{Array, Array1, Array2, ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};

use na_df::{Error, Result};

pub mod experiment;
pub mod prep;
pub mod settings;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
  pub u: f64,
  pub v: f64,
  pub w: f64,
}
impl State {
  pub fn new(u: f64, v: f64, w: f64) -> State {
    State { u: u, v: v, w: w, }
  }
  pub fn from_view(a: ArrayView1<f64>) -> State {
    State::new(a[0], a[1], a[2])
  }
  pub fn to_array(&self) -> Array1<f64> {
    Array::from(vec![self.u, self.v, self.w])
  }
  pub fn is_finite(&self) -> bool {
    self.u.is_finite() && self.v.is_finite() && self.w.is_finite()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Derivative {
  pub du: f64,
  pub dv: f64,
  pub dw: f64,
}
impl Derivative {
  pub fn from_view(a: ArrayView1<f64>) -> Derivative {
    Derivative { du: a[0], dv: a[1], dw: a[2], }
  }
}

/// (ρ, ψ, β). Also reused for per-parameter perturbation scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
  pub rho: f64,
  pub psi: f64,
  pub beta: f64,
}
impl ParameterSet {
  pub fn new(rho: f64, psi: f64, beta: f64) -> ParameterSet {
    ParameterSet { rho: rho, psi: psi, beta: beta, }
  }

  /// The Lorenz equations evaluated at `s`.
  pub fn derivative(&self, s: &State) -> Derivative {
    Derivative {
      du: self.rho * (s.v - s.u),
      dv: s.u * (self.psi - s.w) - s.v,
      dw: s.u * s.v - self.beta * s.w,
    }
  }
}
impl Default for ParameterSet {
  fn default() -> Self {
    ParameterSet {
      rho: 10.0,
      psi: 28.0,
      beta: 8.0 / 3.0,
    }
  }
}

fn check_delta_t(delta_t: f64) -> Result<()> {
  if !(delta_t > 0.0) || !delta_t.is_finite() {
    return Err(Error::config(format!("delta_t must be positive and finite, got {}",
                                     delta_t)));
  }
  Ok(())
}

fn explicit_euler(quantity: f64, flux: f64, delta_t: f64) -> f64 {
  quantity + flux * delta_t
}

/// One lagged Euler step: advance along `derivative`, then return the new
/// state with the derivative evaluated there.
pub fn predict(state: State, derivative: Derivative,
               params: &ParameterSet, delta_t: f64) -> (State, Derivative) {
  let next = State {
    u: explicit_euler(state.u, derivative.du, delta_t),
    v: explicit_euler(state.v, derivative.dv, delta_t),
    w: explicit_euler(state.w, derivative.dw, delta_t),
  };
  (next, params.derivative(&next))
}

/// [`predict`] as an ensemble model with a fixed timestep.
#[derive(Debug, Clone, Copy)]
pub struct L63Model {
  pub delta_t: f64,
}
impl na_df::Model for L63Model {
  type Params = ParameterSet;

  fn state_dim(&self) -> usize { 3 }
  fn check(&self) -> Result<()> { check_delta_t(self.delta_t) }
  fn step(&self, params: &ParameterSet,
          mut state: ArrayViewMut1<f64>,
          mut derivative: ArrayViewMut1<f64>) {
    debug_assert!(state.len() == 3);
    debug_assert!(derivative.len() == 3);

    let (s, d) = predict(State::from_view(state.view()),
                         Derivative::from_view(derivative.view()),
                         params, self.delta_t);
    state[0] = s.u;
    state[1] = s.v;
    state[2] = s.w;
    derivative[0] = d.du;
    derivative[1] = d.dv;
    derivative[2] = d.dw;
  }
}

/// Integrate from `initial` with a zero starting derivative, one step per
/// entry of `times`, using `params[i]` on step `i`. Column `i` of the (3 × T)
/// result is the state after step `i`.
pub fn run_deterministic(params: &[ParameterSet],
                         initial: State,
                         times: ArrayView1<f64>,
                         delta_t: f64) -> Result<Array2<f64>> {
  check_delta_t(delta_t)?;
  if params.len() != times.len() {
    return Err(Error::shape(format!("{} parameter sets for {} timesteps",
                                    params.len(), times.len())));
  }

  let mut out = Array::zeros((3, times.len()));
  let mut state = initial;
  let mut derivative = Derivative::default();
  for (i, p) in params.iter().enumerate() {
    let (s, d) = predict(state, derivative, p, delta_t);
    if !s.is_finite() {
      return Err(Error::Divergence { step: i, member: None, });
    }
    state = s;
    derivative = d;

    out[[0, i]] = state.u;
    out[[1, i]] = state.v;
    out[[2, i]] = state.w;
  }

  Ok(out)
}
