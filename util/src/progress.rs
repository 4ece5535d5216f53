use std::borrow::Cow;
use std::io::{self, Stderr, Write};
use std::iter::ExactSizeIterator;
use std::time::Duration;

use pbr::ProgressBar;

/// Wraps an iterator and ticks a progress bar for every item it yields.
pub struct ReportingIterator<I, W = Stderr>
  where I: ExactSizeIterator,
        W: Write,
{
  name: Cow<'static, str>,
  progress: Option<ProgressBar<W>>,
  inner: I,
}

impl<I> ReportingIterator<I, Stderr>
  where I: ExactSizeIterator,
{
  pub fn new(inner: I, name: Cow<'static, str>) -> ReportingIterator<I, Stderr> {
    ReportingIterator::on(io::stderr(), inner, name)
  }

  /// Same iteration, nothing drawn.
  pub fn hidden(inner: I, name: Cow<'static, str>) -> ReportingIterator<I, Stderr> {
    ReportingIterator {
      name: name,
      progress: None,
      inner: inner,
    }
  }
}

impl<I, W> ReportingIterator<I, W>
  where I: ExactSizeIterator,
        W: Write,
{
  pub fn on(handle: W, inner: I, name: Cow<'static, str>) -> ReportingIterator<I, W> {
    let mut p = ProgressBar::on(handle, inner.len() as u64);
    p.show_speed = true;
    p.show_percent = true;
    p.show_counter = true;
    p.show_time_left = true;

    let fps = Duration::new(1, 0) / 30;
    p.set_max_refresh_rate(Some(fps));

    let msg = format!("{}: ", name);
    p.message(&msg[..]);
    ReportingIterator {
      name: name,
      progress: Some(p),
      inner: inner,
    }
  }

  pub fn name(&self) -> &str { &self.name }
}

impl<I, W> Iterator for ReportingIterator<I, W>
  where I: ExactSizeIterator,
        W: Write,
{
  type Item = I::Item;
  fn next(&mut self) -> Option<Self::Item> {
    match self.inner.next() {
      Some(v) => {
        if let Some(ref mut p) = self.progress {
          p.inc();
        }
        Some(v)
      },
      None => {
        if let Some(mut p) = self.progress.take() {
          let msg = format!("{} done\n", self.name);
          p.finish_print(&msg);
        }
        None
      },
    }
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    self.inner.size_hint()
  }
}
impl<I, W> ExactSizeIterator for ReportingIterator<I, W>
  where I: ExactSizeIterator,
        W: Write,
{ }
