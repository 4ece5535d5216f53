extern crate na_discrete_filtering as na_df;
extern crate serde_yaml;
extern crate sixty_three;

use na_df::Error;
use sixty_three::settings::{Degeneracy, Estimate, Gain, Likelihood, Settings, Trigger};
use sixty_three::{ParameterSet, State};

#[test]
fn partial_yaml_falls_back_to_defaults() {
  let s: Settings = serde_yaml::from_str("
ensemble_count: 12
delta_t: 0.005
base:
  initial: { u: 2.0, v: 3.0, w: 4.0 }
measurement:
  frequency: 4
particle:
  likelihood: reference
  trigger: reference
  degeneracy: fail
  estimate: reference
kalman:
  gain: reference
run_pf: false
").unwrap();

  let d = Settings::default();
  assert_eq!(s.ensemble_count, 12);
  assert_eq!(s.delta_t, 0.005);
  assert_eq!(s.steps, d.steps);
  assert_eq!(s.base.initial, State::new(2.0, 3.0, 4.0));
  assert_eq!(s.base.params, ParameterSet::default());
  assert_eq!(s.modified, d.modified);
  assert_eq!(s.measurement.frequency, 4);
  assert_eq!(s.measurement.variance, d.measurement.variance);
  assert_eq!(s.particle.likelihood, Likelihood::Reference);
  assert_eq!(s.particle.trigger, Trigger::Reference);
  assert_eq!(s.particle.degeneracy, Degeneracy::Fail);
  assert_eq!(s.particle.estimate, Estimate::Reference);
  assert_eq!(s.particle.n_eff_fraction, d.particle.n_eff_fraction);
  assert_eq!(s.kalman.gain, Gain::Reference);
  assert!(!s.run_pf);
  assert!(s.run_enkf);
  s.validate().unwrap();
}

#[test]
fn empty_document_is_the_default() {
  let s: Settings = serde_yaml::from_str("{}").unwrap();
  assert_eq!(s, Settings::default());
}

#[test]
fn unknown_policy_names_are_rejected() {
  let r: Result<Settings, _> = serde_yaml::from_str("particle: { trigger: sometimes }");
  assert!(r.is_err());
}

#[test]
fn loaded_values_still_go_through_validation() {
  let s: Settings = serde_yaml::from_str("
perturbation: { rho: 0.1, psi: -0.2, beta: 0.1 }
").unwrap();
  match s.validate() {
    Err(Error::Config(msg)) => assert!(msg.contains("psi"), "{}", msg),
    other => panic!("expected a config error, got {:?}", other),
  }
}
