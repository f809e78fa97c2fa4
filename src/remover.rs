use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::{
    calendar::{Clock, DateIndexer, DayOfYear},
    error::Error,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RemoveOutcome {
    /// File was deleted
    Removed(PathBuf),
    /// Nothing to delete at this path. Not an error.
    NotFoundWarning(PathBuf),
}

/// Deletes the decompressed ephemeris file for given day of year, in `directory`.
pub fn remove<C: Clock>(
    indexer: &DateIndexer<C>,
    day_of_year: DayOfYear,
    directory: &Path,
) -> Result<RemoveOutcome, Error> {
    let filename = indexer.filename(day_of_year)?.decompressed();
    let path = directory.join(&filename);

    if !path.is_file() {
        warn!(
            "no file found to delete for {} in {}",
            filename,
            directory.display()
        );
        return Ok(RemoveOutcome::NotFoundWarning(path));
    }

    fs::remove_file(&path)?;
    info!("deleted {}", path.display());

    Ok(RemoveOutcome::Removed(path))
}
