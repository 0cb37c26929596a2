//! Waiting for one of several possible outcomes to become visible.

use std::time::Duration;

use crate::backoff::ExponentialBackoff;
use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::harness_debug;
use crate::outcome::{Candidate, Outcome};

/// Result of [`observe_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The first candidate found visible.
    Matched(Candidate),
    /// No candidate appeared within the bound.
    TimedOut,
}

impl Observation {
    /// The observed outcome; a timeout observes [`Outcome::Unknown`].
    pub fn outcome(&self) -> Outcome {
        match self {
            Observation::Matched(candidate) => candidate.outcome.clone(),
            Observation::TimedOut => Outcome::Unknown,
        }
    }

    /// Text that was seen, for reports.
    pub fn describe(&self) -> String {
        match self {
            Observation::Matched(candidate) => format!("\"{}\" appeared", candidate.text),
            Observation::TimedOut => "no expected text appeared".to_string(),
        }
    }
}

/// Polls the page until one of `candidates` is visible or `timeout` passes.
///
/// Candidates are checked in order on every poll, so when several are
/// visible at once the earliest listed wins. Each visibility check is also
/// bounded by the deadline, so a stalled driver times out like an empty
/// page. Driver errors end the wait.
pub async fn observe_outcome<D>(
    driver: &D,
    candidates: &[Candidate],
    timeout: Duration,
) -> Result<Observation>
where
    D: PageDriver + ?Sized,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut backoff = ExponentialBackoff::polling();
    let mut polls = 0u32;

    loop {
        polls += 1;
        for candidate in candidates {
            let visible =
                match tokio::time::timeout_at(deadline, driver.is_visible(&candidate.text)).await {
                    Ok(visible) => visible?,
                    Err(_) => {
                        harness_debug!(polls, ?timeout, text = %candidate.text, "visibility check stalled");
                        return Ok(Observation::TimedOut);
                    }
                };
            if visible {
                harness_debug!(text = %candidate.text, polls, "outcome observed");
                return Ok(Observation::Matched(candidate.clone()));
            }
        }
        if !backoff.wait_until(deadline).await {
            harness_debug!(polls, ?timeout, "no outcome observed");
            return Ok(Observation::TimedOut);
        }
    }
}

/// Waits until `text` is visible.
pub async fn wait_for_text<D>(driver: &D, text: &str, timeout: Duration) -> Result<()>
where
    D: PageDriver + ?Sized,
{
    let candidate = Candidate::new(text, Outcome::Success);
    match observe_outcome(driver, std::slice::from_ref(&candidate), timeout).await? {
        Observation::Matched(_) => Ok(()),
        Observation::TimedOut => Err(Error::ObservationTimeout {
            what: format!("\"{}\"", text),
            after: timeout,
        }),
    }
}
