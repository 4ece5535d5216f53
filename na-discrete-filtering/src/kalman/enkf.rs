//! Deterministic EnKF for a single observed state component: the ensemble's
//! own sample covariance sets the gain, and every member is moved towards
//! the (unperturbed) observation.

use nd::{Array1, Array2, ArrayView2, Axis};
use nd::linalg::general_mat_mul;
use rand::RngCore;

use crate::ensemble::Ensemble;
use crate::{Error, Result, Update};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainForm {
  /// `K = P Hᵗ / (H P Hᵗ + R)`.
  Scalar,
  /// Row `i` divides by `P[i, o] + R` instead of `P[o, o] + R`, matching an
  /// element-wise evaluation of the formula above. Kept for parity runs.
  Reference,
}
impl Default for GainForm {
  fn default() -> Self { GainForm::Scalar }
}

/// Column mean of `states` (dim × N) and the centered ensemble.
pub fn anomalies(states: ArrayView2<f64>) -> (Array1<f64>, Array2<f64>) {
  let n = states.dim().1 as f64;
  let mean = states.sum_axis(Axis(1)) / n;
  let mut xhat = states.to_owned();
  for mut col in xhat.axis_iter_mut(Axis(1)) {
    col -= &mean;
  }
  (mean, xhat)
}

/// Sample covariance `A Aᵗ / (N - 1)` of an anomaly matrix. Symmetric by
/// construction.
pub fn forecast_covariance(anomalies: ArrayView2<f64>) -> Array2<f64> {
  let (dim, n) = anomalies.dim();
  let mut c = Array2::zeros((dim, dim));
  general_mat_mul(1.0 / (n as f64 - 1.0),
                  &anomalies, &anomalies.t(),
                  0.0,
                  &mut c);
  c
}

/// Gain for observing component `observed` with noise variance `r`.
///
/// This is the one-observation special case; several observed components at
/// once would need `(H P Hᵗ + R)` inverted as a matrix.
pub fn kalman_gain(covariance: ArrayView2<f64>,
                   observed: usize,
                   r: f64,
                   form: GainForm) -> Array1<f64> {
  let pht = covariance.column(observed);
  let hpht = covariance[[observed, observed]];
  pht.mapv(|p| {
    let denom = match form {
      GainForm::Scalar => hpht + r,
      GainForm::Reference => p + r,
    };
    if denom == 0.0 { 0.0 } else { p / denom }
  })
}

#[derive(Debug, Clone)]
pub struct EnsembleKalmanFilter {
  measurement_variance: f64,
  observed: usize,
  gain: GainForm,

  last_gain: Option<Array1<f64>>,
}

impl EnsembleKalmanFilter {
  pub fn new(measurement_variance: f64) -> Result<EnsembleKalmanFilter> {
    if !(measurement_variance > 0.0) {
      return Err(Error::config(format!("measurement variance must be positive, got {}",
                                       measurement_variance)));
    }
    Ok(EnsembleKalmanFilter {
      measurement_variance: measurement_variance,
      observed: 0,
      gain: Default::default(),
      last_gain: None,
    })
  }

  pub fn with_observed(mut self, component: usize) -> Self {
    self.observed = component;
    self
  }
  pub fn with_gain(mut self, form: GainForm) -> Self {
    self.gain = form;
    self
  }

  pub fn last_gain(&self) -> Option<&Array1<f64>> { self.last_gain.as_ref() }

  /// Analysis ensemble for `forecast` (dim × N) and one observation, with
  /// its mean.
  pub fn analyze(&self, forecast: ArrayView2<f64>, observation: f64) -> (Array2<f64>, Array1<f64>) {
    let (analysis, _) = self.analyze_with_gain(forecast, observation);
    let n = analysis.dim().1 as f64;
    let mean = analysis.sum_axis(Axis(1)) / n;
    (analysis, mean)
  }

  fn analyze_with_gain(&self, forecast: ArrayView2<f64>, observation: f64) -> (Array2<f64>, Array1<f64>) {
    let (_, xhat) = anomalies(forecast);
    let c = forecast_covariance(xhat.view());
    let k = kalman_gain(c.view(), self.observed, self.measurement_variance, self.gain);

    let mut analysis = forecast.to_owned();
    for mut member in analysis.axis_iter_mut(Axis(1)) {
      let innovation = observation - member[self.observed];
      member.scaled_add(innovation, &k);
    }
    (analysis, k)
  }
}

impl<P> Update<P> for EnsembleKalmanFilter {
  fn check(&self, ensemble_count: usize, state_dim: usize) -> Result<()> {
    if ensemble_count < 2 {
      return Err(Error::config(format!("the EnKF needs at least two members, got {}",
                                       ensemble_count)));
    }
    if self.observed >= state_dim {
      return Err(Error::config(format!("observed component {} out of range for state of length {}",
                                       self.observed, state_dim)));
    }
    Ok(())
  }

  fn update(&mut self,
            _step: usize,
            ensemble: &mut Ensemble<P>,
            observation: f64,
            _rand: &mut dyn RngCore) -> Result<Array1<f64>> {
    let (analysis, k) = self.analyze_with_gain(ensemble.states().view(), observation);
    ensemble.assign_states(analysis.view())?;
    self.last_gain = Some(k);

    Ok(ensemble.mean())
  }
}
