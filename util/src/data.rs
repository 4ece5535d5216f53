use nd::{Array, Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix2};
use num_traits::{Float, NumCast};

use na_df::{Error, Result};
use na_df::assimilate::StateSteps;

/// `t_i = i * delta_t` for `i < steps`.
pub fn time_array(steps: usize, delta_t: f64) -> Array1<f64> {
  Array::from_shape_fn(steps, |i| i as f64 * delta_t )
}

/// Every `frequency`th entry of `series`, starting with the first; `None`
/// everywhere else.
pub fn subsample(series: ArrayView1<f64>, frequency: usize) -> Result<Vec<Option<f64>>> {
  if frequency == 0 {
    return Err(Error::config("measurement frequency must be at least 1"));
  }
  Ok(series
     .iter()
     .enumerate()
     .map(|(i, &v)| if i % frequency == 0 { Some(v) } else { None })
     .collect())
}

/// Root mean square difference per row of two (dim × T) series.
pub fn rmse<S1, S2, E>(estimate: &ArrayBase<S1, Ix2>,
                       truth: &ArrayBase<S2, Ix2>) -> Result<Array1<E>>
  where S1: Data<Elem = E>,
        S2: Data<Elem = E>,
        E: Float,
{
  if estimate.dim() != truth.dim() {
    return Err(Error::shape(format!("estimate is {:?}, truth is {:?}",
                                    estimate.dim(), truth.dim())));
  }
  let n = <E as NumCast>::from(truth.dim().1).unwrap_or_else(E::one);
  let out = estimate
    .outer_iter()
    .zip(truth.outer_iter())
    .map(|(e, t)| {
      let sq = e.iter()
        .zip(t.iter())
        .fold(E::zero(), |acc, (&a, &b)| acc + (a - b) * (a - b) );
      (sq / n).sqrt()
    })
    .collect();
  Ok(out)
}

/// Linearly interpolated `q`-quantile of `values`; NaN when empty.
pub fn quantile(values: &mut [f64], q: f64) -> f64 {
  if values.is_empty() {
    return ::std::f64::NAN;
  }
  values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(::std::cmp::Ordering::Equal) );
  let pos = q.max(0.0).min(1.0) * (values.len() - 1) as f64;
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;
  values[lo] + (values[hi] - values[lo]) * frac
}

/// The `lower` and `upper` quantiles over members, for every step and state
/// component: two (T, dim) arrays.
pub fn quantile_band(steps: &StateSteps, lower: f64, upper: f64) -> (Array2<f64>, Array2<f64>) {
  let (t, dim, _) = steps.ensembles.dim();
  let mut lo = Array::zeros((t, dim));
  let mut hi = Array::zeros((t, dim));
  for (i, ensemble) in steps.ensembles.axis_iter(Axis(0)).enumerate() {
    for (j, members) in ensemble.axis_iter(Axis(0)).enumerate() {
      let mut values = members.to_vec();
      lo[[i, j]] = quantile(&mut values[..], lower);
      hi[[i, j]] = quantile(&mut values[..], upper);
    }
  }
  (lo, hi)
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2, Array3};
  use na_df::utils::PartialEqWithinTol;

  #[test]
  fn time_array_spacing() {
    let t = time_array(4, 0.5);
    assert_eq!(t, arr1(&[0.0, 0.5, 1.0, 1.5]));
  }

  #[test]
  fn subsample_keeps_multiples_of_frequency() {
    let s = arr1(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    let m = subsample(s.view(), 3).unwrap();
    assert_eq!(m, vec![Some(1.0), None, None, Some(4.0), None, None, Some(7.0)]);

    let every = subsample(s.view(), 1).unwrap();
    assert!(every.iter().all(|v| v.is_some() ));
    assert!(subsample(s.view(), 0).is_err());
  }

  #[test]
  fn rmse_per_component() {
    let truth = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
    let est = arr2(&[[3.0, -3.0], [1.0, 1.0]]);
    let r = rmse(&est, &truth).unwrap();
    assert_eq!(r, arr1(&[3.0, 0.0]));
    assert!(rmse(&est, &arr2(&[[0.0]])).is_err());
  }

  #[test]
  fn quantile_interpolates() {
    let mut v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
    assert_eq!(quantile(&mut v[..], 0.5), 3.0);
    assert!(quantile(&mut v[..], 0.05).partial_eq_within_tol(&1.2, 1e-12));
    assert!(quantile(&mut v[..], 0.95).partial_eq_within_tol(&4.8, 1e-12));
    assert!(quantile(&mut [], 0.5).is_nan());
  }

  #[test]
  fn band_brackets_members() {
    let mut ensembles = Array3::zeros((1, 2, 5));
    for k in 0..5 {
      ensembles[[0, 0, k]] = k as f64;
      ensembles[[0, 1, k]] = 10.0;
    }
    let steps = StateSteps {
      ensembles: ensembles,
      estimates: Array2::zeros((1, 2)),
    };
    let (lo, hi) = quantile_band(&steps, 0.25, 0.75);
    assert_eq!(lo, arr2(&[[1.0, 10.0]]));
    assert_eq!(hi, arr2(&[[3.0, 10.0]]));
  }
}
