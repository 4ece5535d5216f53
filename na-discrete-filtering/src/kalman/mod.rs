//! Kalman-type ensemble updates.

pub mod enkf;

pub use self::enkf::{EnsembleKalmanFilter, GainForm};
