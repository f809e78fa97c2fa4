use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed date \"{0}\": expecting dd-mm-yyyy")]
    MalformedDate(String),

    #[error("total wait time {retries}x{wait_minutes}' exceeds 23h59'")]
    RetryCeiling { retries: u32, wait_minutes: u32 },

    #[error("offset of {0} days is out of range")]
    OffsetTooLarge(u32),

    #[error("time formatting error: {0}")]
    Formatting(String),

    #[error("batch length must be at least one day")]
    EmptyBatch,

    #[error("failed to determine system time: {0}")]
    Clock(#[from] hifitime::HifitimeError),

    #[error("failed to create directory \"{}\": {source}", path.display())]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decompress \"{}\": {source}", path.display())]
    Decode {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed position \"{0}\": expecting lat,lon,alt")]
    MalformedPosition(String),

    #[error("failed to run simulator: {0}")]
    Simulator(std::io::Error),

    #[error("simulator exited with {0}")]
    SimulatorStatus(std::process::ExitStatus),
}
