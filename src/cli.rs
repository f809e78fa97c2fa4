use std::{path::PathBuf, str::FromStr, time::Duration};

use hifitime::prelude::Epoch;
use itertools::Itertools;

use clap::{Arg, ArgAction, ArgMatches, ColorChoice, Command, value_parser};

use crate::{
    calendar::{DateSpec, MAX_OFFSET_DAYS, parse_date},
    error::Error,
    fetcher::{DEFAULT_ARCHIVE, DEFAULT_TIMEOUT},
    retry::RetryPolicy,
    simulator::{DEFAULT_BINARY, DEFAULT_BITS, GpsSdrSim, Position},
};

/// Default download directory
pub const DEFAULT_DIRECTORY: &str = "downloads";

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    fn command() -> Command {
        Command::new("brdc-fetch")
            .author("Guillaume W. Bres, <guillaume.bressaix@gmail.com>")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Daily GNSS broadcast ephemeris (BRDC) downloader")
            .long_about("Download and manage daily broadcast ephemeris files from the CDDIS archive.
Files are addressed by day offset (0 = today) or by explicit date, downloaded with optional
retries, decompressed and stored in the download directory. They can be deleted the same way.")
            .color(ColorChoice::Always)
            .next_help_heading("File selection")
            .arg(
                Arg::new("offset")
                    .short('o')
                    .long("offset")
                    .value_name("DAYS")
                    .value_parser(value_parser!(u32).range(..=MAX_OFFSET_DAYS as i64))
                    .default_value("0")
                    .help("Offset in days from today (0 for today, 1 for yesterday, etc.)"),
            )
            .arg(
                Arg::new("date")
                    .short('s')
                    .long("date")
                    .value_name("dd-mm-yyyy")
                    .help("Specific date for download or delete.
The file name always refers to the current year, whatever the year of this date."),
            )
            .arg(
                Arg::new("last-days")
                    .short('l')
                    .long("last-days")
                    .value_name("N")
                    .value_parser(value_parser!(u32).range(1..))
                    .help("Download or delete files for the last N days (today included)"),
            )
            .arg(
                Arg::new("delete")
                    .short('d')
                    .long("delete")
                    .action(ArgAction::SetTrue)
                    .help("Delete the file(s) instead of downloading them"),
            )
            .arg(
                Arg::new("directory")
                    .long("dir")
                    .value_name("DIR")
                    .default_value(DEFAULT_DIRECTORY)
                    .help("Directory where files are downloaded to, or deleted from"),
            )
            .next_help_heading("Download")
            .arg(
                Arg::new("retry")
                    .short('r')
                    .long("retry")
                    .num_args(2)
                    .value_names(["RETRIES", "MINUTES"])
                    .value_parser(value_parser!(u32))
                    .help("Number of retries and wait time in minutes between them (e.g. -r 10 15).
Total wait time is limited to 23h59'"),
            )
            .arg(
                Arg::new("archive")
                    .long("archive")
                    .value_name("URL")
                    .default_value(DEFAULT_ARCHIVE)
                    .help("Base URL of the daily archive. \"{year}/brdc/\" is appended to it."),
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .value_name("SECONDS")
                    .value_parser(value_parser!(u64))
                    .help("HTTP request timeout. Default is 60s."),
            )
            .next_help_heading("RF simulation")
            .arg(
                Arg::new("simulate")
                    .long("simulate")
                    .value_name("LAT,LON,ALT")
                    .conflicts_with_all(["delete", "date", "last-days"])
                    .help("Run the RF simulator on the (already downloaded) file of --offset,
for this static position: decimal degrees and meters (e.g. 43.6,1.44,150)"),
            )
            .arg(
                Arg::new("sim-bin")
                    .long("sim-bin")
                    .value_name("PATH")
                    .default_value(DEFAULT_BINARY)
                    .help("Simulator (gps-sdr-sim) executable"),
            )
            .arg(
                Arg::new("bits")
                    .long("bits")
                    .value_name("BITS")
                    .value_parser(value_parser!(u8))
                    .help("I/Q sample bit depth passed to the simulator. Default is 8."),
            )
    }

    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: Self::command().get_matches(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_args(args: &[&str]) -> Self {
        Self {
            matches: Self::command()
                .try_get_matches_from(args)
                .unwrap_or_else(|e| panic!("invalid command line: {}", e)),
        }
    }

    pub fn offset(&self) -> u32 {
        self.matches.get_one::<u32>("offset").copied().unwrap_or(0)
    }

    /// Explicit date, when defined
    pub fn date(&self) -> Result<Option<Epoch>, Error> {
        match self.matches.get_one::<String>("date") {
            Some(date) => Ok(Some(parse_date(date)?)),
            None => Ok(None),
        }
    }

    /// Explicit date when defined, offset otherwise
    pub fn date_spec(&self) -> Result<DateSpec, Error> {
        match self.date()? {
            Some(date) => Ok(DateSpec::Date(date)),
            None => Ok(DateSpec::Offset(self.offset())),
        }
    }

    pub fn last_days(&self) -> Option<u32> {
        self.matches.get_one::<u32>("last-days").copied()
    }

    pub fn delete(&self) -> bool {
        self.matches.get_flag("delete")
    }

    pub fn directory(&self) -> PathBuf {
        self.matches
            .get_one::<String>("directory")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY))
    }

    /// Retry policy, no retries by default
    pub fn retry_policy(&self) -> Result<RetryPolicy, Error> {
        let retry = self
            .matches
            .get_many::<u32>("retry")
            .and_then(|values| values.copied().collect_tuple());

        match retry {
            Some((retries, wait_minutes)) => RetryPolicy::new(retries, wait_minutes),
            None => Ok(RetryPolicy::default()),
        }
    }

    pub fn archive(&self) -> &str {
        self.matches
            .get_one::<String>("archive")
            .map(String::as_str)
            .unwrap_or(DEFAULT_ARCHIVE)
    }

    pub fn timeout(&self) -> Duration {
        self.matches
            .get_one::<u64>("timeout")
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Simulation position, when simulation is requested
    pub fn simulation(&self) -> Result<Option<Position>, Error> {
        match self.matches.get_one::<String>("simulate") {
            Some(position) => Ok(Some(Position::from_str(position)?)),
            None => Ok(None),
        }
    }

    pub fn simulator(&self) -> GpsSdrSim {
        let binary = self
            .matches
            .get_one::<String>("sim-bin")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BINARY);

        let bits = self
            .matches
            .get_one::<u8>("bits")
            .copied()
            .unwrap_or(DEFAULT_BITS);

        GpsSdrSim::new(binary, bits)
    }
}
