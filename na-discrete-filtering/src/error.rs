
use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// Rejected before any step is taken.
  #[error("invalid configuration: {0}")]
  Config(String),
  /// Every likelihood vanished, so the weights can't be normalized.
  #[error("degenerate ensemble: likelihood sum is {sum}")]
  DegenerateEnsemble { sum: f64 },
  #[error("state became non-finite at step {step}{}", member_suffix(.member))]
  Divergence { step: usize, member: Option<usize> },
  #[error("shape mismatch: {0}")]
  Shape(String),
}

impl Error {
  pub fn config<S: Into<String>>(msg: S) -> Error {
    Error::Config(msg.into())
  }
  pub fn shape<S: Into<String>>(msg: S) -> Error {
    Error::Shape(msg.into())
  }
}

fn member_suffix(member: &Option<usize>) -> String {
  match member {
    &Some(m) => format!(" (member {})", m),
    &None => String::new(),
  }
}
