use std::path::Path;

use log::{error, info};

use crate::{
    calendar::{Clock, DateSpec, DayOfYear},
    error::Error,
    fetcher::{DownloadOutcome, Fetcher},
    remover::{RemoveOutcome, remove},
    retry::{RetryPolicy, Sleeper},
};

/// Operation applied to each day of a batch
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Operation {
    Fetch(RetryPolicy),
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Download(DownloadOutcome),
    Remove(RemoveOutcome),
    /// Day could not be processed at all
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Download(outcome) => outcome.is_success(),
            Self::Remove(outcome) => matches!(outcome, RemoveOutcome::Removed(_)),
            Self::Failed(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Days before today
    pub offset: u32,
    /// Resolved day of year, when it could be resolved
    pub day_of_year: Option<DayOfYear>,
    pub outcome: Outcome,
}

/// Per-day outcomes of a batch, today first.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub entries: Vec<Entry>,
}

impl BatchReport {
    pub fn successes(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_success())
            .count()
    }

    pub fn failures(&self) -> usize {
        self.entries.len() - self.successes()
    }
}

/// Applies `operation` to the last `last_days` days (today included), in `directory`.
///
/// Days are processed one after the other. A failing day is recorded in the
/// [BatchReport] and does not stop the batch.
pub async fn run_batch<C: Clock, S: Sleeper>(
    fetcher: &Fetcher<C, S>,
    operation: Operation,
    last_days: u32,
    directory: &Path,
) -> Result<BatchReport, Error> {
    if last_days == 0 {
        return Err(Error::EmptyBatch);
    }

    let mut report = BatchReport::default();

    for offset in 0..last_days {
        let day_of_year = match fetcher.indexer().day_of_year(&DateSpec::Offset(offset)) {
            Ok(doy) => doy,
            Err(e) => {
                error!("offset {}: {}", offset, e);
                report.entries.push(Entry {
                    offset,
                    day_of_year: None,
                    outcome: Outcome::Failed(e.to_string()),
                });
                continue;
            },
        };

        let outcome = match operation {
            Operation::Fetch(policy) => fetcher
                .fetch(day_of_year, directory, &policy)
                .await
                .map(Outcome::Download),
            Operation::Delete => {
                remove(fetcher.indexer(), day_of_year, directory).map(Outcome::Remove)
            },
        };

        let outcome = outcome.unwrap_or_else(|e| {
            error!("day {}: {}", day_of_year, e);
            Outcome::Failed(e.to_string())
        });

        report.entries.push(Entry {
            offset,
            day_of_year: Some(day_of_year),
            outcome,
        });
    }

    info!(
        "batch completed: {} day(s), {} succeeded, {} failed or missing",
        report.entries.len(),
        report.successes(),
        report.failures()
    );

    Ok(report)
}
