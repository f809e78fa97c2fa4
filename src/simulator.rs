//! RF signal simulation, fed with a downloaded ephemeris file.
use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
    str::FromStr,
};

use itertools::Itertools;
use log::{debug, info};

use crate::error::Error;

/// Default simulator location
pub const DEFAULT_BINARY: &str = "./gps-sdr-sim";

/// Default I/Q sample bit depth
pub const DEFAULT_BITS: u8 = 8;

/// Static receiver position: latitude and longitude in decimal degrees,
/// altitude in meters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl FromStr for Position {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || Error::MalformedPosition(s.to_string());

        let (latitude, longitude, altitude) = s
            .split(',')
            .map(|item| item.trim().parse::<f64>())
            .collect_tuple()
            .ok_or_else(malformed)?;

        Ok(Self {
            latitude: latitude.map_err(|_| malformed())?,
            longitude: longitude.map_err(|_| malformed())?,
            altitude: altitude.map_err(|_| malformed())?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{}", self.latitude, self.longitude, self.altitude)
    }
}

/// Anything that can simulate the RF signal from an ephemeris file
pub trait Simulator {
    fn run(&self, ephemeris: &Path, position: &Position) -> Result<ExitStatus, Error>;
}

/// [Simulator] that shells out to gps-sdr-sim
#[derive(Debug, Clone)]
pub struct GpsSdrSim {
    binary: PathBuf,
    bits: u8,
}

impl Default for GpsSdrSim {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY, DEFAULT_BITS)
    }
}

impl GpsSdrSim {
    pub fn new<P: AsRef<Path>>(binary: P, bits: u8) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            bits,
        }
    }

    fn command(&self, ephemeris: &Path, position: &Position) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-e")
            .arg(ephemeris)
            .arg("-l")
            .arg(position.to_string())
            .arg("-b")
            .arg(self.bits.to_string());
        command
    }
}

impl Simulator for GpsSdrSim {
    fn run(&self, ephemeris: &Path, position: &Position) -> Result<ExitStatus, Error> {
        let mut command = self.command(ephemeris, position);

        info!(
            "executing {} {}",
            self.binary.display(),
            command
                .get_args()
                .map(OsStr::to_string_lossy)
                .join(" ")
        );

        let status = command.status().map_err(Error::Simulator)?;
        debug!("{} exited with {}", self.binary.display(), status);

        Ok(status)
    }
}
