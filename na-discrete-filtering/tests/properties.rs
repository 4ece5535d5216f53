extern crate na_discrete_filtering as na_df;
extern crate ndarray as nd;
extern crate proptest;
extern crate rand;

use nd::{Array1, Array2};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use na_df::kalman::enkf::{anomalies, forecast_covariance};
use na_df::particle::sir::{effective_sample_size, normalize_weights, systematic_resample};
use na_df::particle::DegeneracyPolicy;
use na_df::utils::PartialEqWithinTol;

fn likelihood_vec() -> impl Strategy<Value = Vec<f64>> {
  prop::collection::vec(0.0f64..1.0, 1..64)
    .prop_filter("needs some mass", |v| v.iter().sum::<f64>() > 1e-9 )
}

proptest! {
  #[test]
  fn weights_are_normalized(l in likelihood_vec()) {
    let w = normalize_weights(Array1::from(l).view(), DegeneracyPolicy::Fail).unwrap();
    prop_assert!(w.iter().all(|&x| x >= 0.0 ));
    prop_assert!(w.sum().partial_eq_within_tol(&1.0, 1e-9));
  }

  #[test]
  fn n_eff_is_between_one_and_n(l in likelihood_vec()) {
    let n = l.len() as f64;
    let w = normalize_weights(Array1::from(l).view(), DegeneracyPolicy::Fail).unwrap();
    let n_eff = effective_sample_size(w.view());
    prop_assert!(n_eff >= 1.0 - 1e-9);
    prop_assert!(n_eff <= n + 1e-9);
  }

  #[test]
  fn resampling_keeps_size_and_picks_weighted_members(l in likelihood_vec(), seed in any::<u64>()) {
    let w = normalize_weights(Array1::from(l).view(), DegeneracyPolicy::Fail).unwrap();
    let mut rand = StdRng::seed_from_u64(seed);
    let idx = systematic_resample(w.view(), &mut rand);
    prop_assert_eq!(idx.len(), w.len());
    prop_assert!(idx.iter().all(|&i| i < w.len() ));
    // zero-weight members are never picked, except at the rounding guard
    for &i in idx.iter() {
      prop_assert!(w[i] > 0.0 || i == w.len() - 1);
    }
  }

  #[test]
  fn covariance_is_symmetric(values in prop::collection::vec(-100.0f64..100.0, 3 * 8)) {
    let states = Array2::from_shape_vec((3, 8), values).unwrap();
    let (_, xhat) = anomalies(states.view());
    let c = forecast_covariance(xhat.view());
    prop_assert!(c.partial_eq_within_tol(&c.t(), 1e-9));
    prop_assert!(c.diag().iter().all(|&v| v >= 0.0 ));
  }
}
