//! Helpers shared by the problem crates: synthetic observation series,
//! summary statistics over assimilation output, and progress reporting.

extern crate ndarray as nd;
extern crate na_discrete_filtering as na_df;
extern crate num_traits;
extern crate pbr;

pub mod data;
pub mod progress;

pub use na_df::assimilate::StateSteps;
