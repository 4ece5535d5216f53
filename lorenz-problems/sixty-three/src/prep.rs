//! Parameter arrays for the deterministic and ensemble runs.

use nd::Array1;
use nd_rand::RandomExt;
use nd_rand::rand_distr::Normal;
use rand::Rng;

use na_df::{Error, Result};

use crate::ParameterSet;
use crate::settings::Settings;

/// `params` repeated for each of `steps` timesteps.
pub fn parameter_series(params: &ParameterSet, steps: usize) -> Vec<ParameterSet> {
  vec![*params; steps]
}

fn relative_noise<R>(scale: f64, count: usize, rand: &mut R) -> Result<Array1<f64>>
  where R: Rng + ?Sized,
{
  let normal = Normal::new(0.0, scale)
    .map_err(|e| Error::config(format!("bad perturbation scale {}: {}", scale, e)))?;
  Ok(Array1::random_using(count, normal, rand))
}

/// One parameter set per member: `modified.params * (1 + N(0, scale))`,
/// drawn independently for each of ρ, ψ and β.
pub fn ensemble_params<R>(settings: &Settings, rand: &mut R) -> Result<Vec<ParameterSet>>
  where R: Rng + ?Sized,
{
  let n = settings.ensemble_count;
  let p = &settings.modified.params;
  let scale = &settings.perturbation;

  let rho = relative_noise(scale.rho, n, rand)?;
  let psi = relative_noise(scale.psi, n, rand)?;
  let beta = relative_noise(scale.beta, n, rand)?;

  let out = (0..n)
    .map(|i| {
      ParameterSet::new(p.rho * (1.0 + rho[i]),
                        p.psi * (1.0 + psi[i]),
                        p.beta * (1.0 + beta[i]))
    })
    .collect();
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn series_is_constant() {
    let p = ParameterSet::new(1.0, 2.0, 3.0);
    let s = parameter_series(&p, 4);
    assert_eq!(s.len(), 4);
    assert!(s.iter().all(|q| *q == p ));
  }

  #[test]
  fn zero_scale_copies_modified_params() {
    let mut settings = Settings::default();
    settings.perturbation = ParameterSet::new(0.0, 0.0, 0.0);
    let mut rand = StdRng::seed_from_u64(3);
    let ps = ensemble_params(&settings, &mut rand).unwrap();
    assert_eq!(ps.len(), settings.ensemble_count);
    assert!(ps.iter().all(|q| *q == settings.modified.params ));
  }

  #[test]
  fn perturbation_is_seeded_and_varies() {
    let settings = Settings::default();
    let a = ensemble_params(&settings, &mut StdRng::seed_from_u64(7)).unwrap();
    let b = ensemble_params(&settings, &mut StdRng::seed_from_u64(7)).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().any(|q| q.rho != settings.modified.params.rho ));

    let mean_rho = a.iter().map(|q| q.rho ).sum::<f64>() / a.len() as f64;
    assert!((mean_rho - settings.modified.params.rho).abs() < 1.0);
  }

  #[test]
  fn negative_scale_is_a_config_error() {
    let mut settings = Settings::default();
    settings.perturbation.beta = -1.0;
    let r = ensemble_params(&settings, &mut StdRng::seed_from_u64(0));
    assert!(matches!(r, Err(Error::Config(_))));
  }
}
