#![doc(
    html_logo_url = "https://raw.githubusercontent.com/nav-solutions/.github/master/logos/logo2.jpg"
)]
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * BRDC-FETCH is part of the nav-solutions framework.
 * Authors: Guillaume W. Bres <guillaume.bressaix@gmail.com> et al,
 * (cf. https://github.com/nav-solutions/brdc-fetch/graphs/contributors)
 * This framework is shipped under Mozilla Public V2 license.
 *
 * Documentation: https://github.com/nav-solutions/brdc-fetch
 */

use env_logger::{Builder, Env, Target};

use log::{error, info, warn};

mod batch;
mod calendar;
mod cli;
mod decompress;
mod error;
mod fetcher;
mod remover;
mod retry;
mod simulator;

use crate::{
    batch::{Operation, run_batch},
    calendar::{Clock, DateIndexer, DateSpec, SystemClock},
    cli::Cli,
    error::Error,
    fetcher::Fetcher,
    remover::remove,
    retry::{Sleeper, TokioSleeper},
    simulator::Simulator,
};

/// Executes the operation requested on the command line.
///
/// Deletion: last days, then explicit date, then offset.
/// Download: explicit date, then last days, then offset.
async fn dispatch<C: Clock, S: Sleeper>(cli: &Cli, fetcher: &Fetcher<C, S>) -> Result<(), Error> {
    // validated before anything else
    let policy = cli.retry_policy()?;

    let directory = cli.directory();
    let indexer = fetcher.indexer();

    if let Some(position) = cli.simulation()? {
        let filename = indexer.resolve(&DateSpec::Offset(cli.offset()))?;
        let ephemeris = directory.join(filename.decompressed());

        if !ephemeris.is_file() {
            warn!("{} does not exist (yet)", ephemeris.display());
        }

        let status = cli.simulator().run(&ephemeris, &position)?;

        if !status.success() {
            return Err(Error::SimulatorStatus(status));
        }

        info!("simulation completed");
        return Ok(());
    }

    if cli.delete() {
        if let Some(last_days) = cli.last_days() {
            run_batch(fetcher, Operation::Delete, last_days, &directory).await?;
        } else {
            let day_of_year = indexer.day_of_year(&cli.date_spec()?)?;
            remove(indexer, day_of_year, &directory)?;
        }
    } else {
        match (cli.date()?, cli.last_days()) {
            (None, Some(last_days)) => {
                run_batch(fetcher, Operation::Fetch(policy), last_days, &directory).await?;
            },
            (date, last_days) => {
                if date.is_some() && last_days.is_some() {
                    warn!("--last-days is ignored when a date is specified");
                }
                let day_of_year = indexer.day_of_year(&cli.date_spec()?)?;
                fetcher.fetch(day_of_year, &directory, &policy).await?;
            },
        }
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<(), Error> {
    let fetcher = Fetcher::new(
        cli.archive(),
        cli.timeout(),
        DateIndexer::new(SystemClock),
        TokioSleeper,
    )?;

    dispatch(cli, &fetcher).await
}

#[tokio::main(flavor = "current_thread")]
pub async fn main() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    builder
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    // cli
    let cli = Cli::new();

    if let Err(e) = run(&cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
