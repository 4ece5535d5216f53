//! Particle filters.

pub mod sir;

pub use self::sir::{DegeneracyPolicy, EstimateTiming, LikelihoodForm, ParticleFilter,
                    ResampleTrigger};
