//! Calendar indexing of the daily broadcast ephemeris.
//!
//! Daily BRDC files are addressed by their day of year. The two digit year
//! in the file name (and the archive directory) always comes from the
//! current [Clock] year, even when an explicit date of another year is requested.
use std::{fmt, str::FromStr};

use hifitime::{
    efmt::Format,
    prelude::{Duration, Epoch, Formatter},
};
use log::{trace, warn};

use crate::error::Error;

/// Largest accepted offset, in days (about a century)
pub const MAX_OFFSET_DAYS: u32 = 36_600;

/// Source of "now". Lets the indexer be driven by a fixed instant in tests.
pub trait Clock {
    fn now(&self) -> Result<Epoch, Error>;
}

/// [Clock] backed by the system time, expressed in UTC.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<Epoch, Error> {
        Ok(Epoch::now()?)
    }
}

/// Parses a dd-mm-yyyy date, as midnight UTC
pub fn parse_date(s: &str) -> Result<Epoch, Error> {
    Epoch::from_format_str(s.trim(), "%d-%m-%Y").map_err(|_| Error::MalformedDate(s.to_string()))
}

fn year(t: Epoch) -> i32 {
    let (y, _, _, _, _, _, _) = t.to_gregorian_utc();
    y
}

/// Ordinal day of given [Epoch] within its own year
fn ordinal(t: Epoch) -> Result<DayOfYear, Error> {
    let fmt = Format::from_str("%j").map_err(|e| Error::Formatting(format!("{:?}", e)))?;
    let formatted = Formatter::new(t, fmt).to_string();

    formatted
        .parse::<u16>()
        .ok()
        .and_then(DayOfYear::new)
        .ok_or(Error::Formatting(formatted))
}

/// How the user addresses a daily file.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DateSpec {
    /// Days before now (0 = today)
    Offset(u32),
    /// Explicit calendar date
    Date(Epoch),
}

impl Default for DateSpec {
    fn default() -> Self {
        Self::Offset(0)
    }
}

/// 1-based ordinal day in [1, 366]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayOfYear(u16);

impl DayOfYear {
    pub fn new(ordinal: u16) -> Option<Self> {
        if (1..=366).contains(&ordinal) {
            Some(Self(ordinal))
        } else {
            None
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for DayOfYear {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// Daily broadcast ephemeris file name, `brdcDDD0.YYn` (decompressed)
/// or `brdcDDD0.YYn.gz` (as archived).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EphemerisFilename {
    pub day_of_year: DayOfYear,
    pub year: i32,
}

impl EphemerisFilename {
    /// Compression suffix of the archived file
    pub const GZIP_SUFFIX: &'static str = ".gz";

    /// Name of the durable, decompressed file
    pub fn decompressed(&self) -> String {
        format!("brdc{}0.{:02}n", self.day_of_year, self.year.rem_euclid(100))
    }

    /// Name of the archived (and transient local) gzip file
    pub fn compressed(&self) -> String {
        format!("{}{}", self.decompressed(), Self::GZIP_SUFFIX)
    }
}

/// Maps [DateSpec]s to [DayOfYear] and [EphemerisFilename].
/// Nothing is cached: each call samples the [Clock] again.
#[derive(Debug, Default, Clone)]
pub struct DateIndexer<C: Clock> {
    clock: C,
}

impl<C: Clock> DateIndexer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Current year, used for both the archive path and file names
    pub fn current_year(&self) -> Result<i32, Error> {
        Ok(year(self.clock.now()?))
    }

    pub fn day_of_year(&self, spec: &DateSpec) -> Result<DayOfYear, Error> {
        match spec {
            DateSpec::Offset(offset) => {
                if *offset > MAX_OFFSET_DAYS {
                    return Err(Error::OffsetTooLarge(*offset));
                }
                let t = self.clock.now()? - Duration::from_days(*offset as f64);
                trace!("offset {} - {}", offset, t);
                ordinal(t)
            },
            DateSpec::Date(date) => {
                let current = self.current_year()?;
                if year(*date) != current {
                    warn!(
                        "{}: file name will still refer to year {}",
                        date, current
                    );
                }
                ordinal(*date)
            },
        }
    }

    pub fn filename(&self, day_of_year: DayOfYear) -> Result<EphemerisFilename, Error> {
        Ok(EphemerisFilename {
            day_of_year,
            year: self.current_year()?,
        })
    }

    /// Shortcut for [Self::day_of_year] followed by [Self::filename]
    pub fn resolve(&self, spec: &DateSpec) -> Result<EphemerisFilename, Error> {
        let day_of_year = self.day_of_year(spec)?;
        self.filename(day_of_year)
    }
}
