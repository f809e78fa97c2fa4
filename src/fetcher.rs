use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use log::{debug, error, info, trace};
use reqwest::{Client, Response, StatusCode};
use tokio::{fs::File, io::AsyncWriteExt};

use crate::{
    calendar::{Clock, DateIndexer, DayOfYear, EphemerisFilename},
    decompress::decompress,
    error::Error,
    retry::{RetryPolicy, Sleeper},
};

/// CDDIS daily archive. `{year}/brdc/` is appended to it.
pub const DEFAULT_ARCHIVE: &str = "https://cddis.nasa.gov/archive/gnss/data/daily/";

/// Default HTTP request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of a download, or of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// File was retrieved. Holds the local path (decompressed, when
    /// returned by [Fetcher::fetch]).
    Success(PathBuf),

    /// Remote archive does not have this file (yet)
    NotFound,

    /// Any other status code, connection or streaming issue
    TransientFailure(String),

    /// All attempts were consumed without success
    ExhaustedRetries,

    /// File was retrieved but could not be decompressed.
    /// The compressed file is kept at given path.
    Undecodable { path: PathBuf, reason: String },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Retrieves daily ephemeris files from the remote archive,
/// with bounded retries.
pub struct Fetcher<C: Clock, S: Sleeper> {
    client: Client,
    archive: String,
    indexer: DateIndexer<C>,
    sleeper: S,
}

impl<C: Clock, S: Sleeper> Fetcher<C, S> {
    pub fn new(
        archive: &str,
        timeout: Duration,
        indexer: DateIndexer<C>,
        sleeper: S,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            sleeper,
            indexer,
            archive: archive.trim_end_matches('/').to_string(),
        })
    }

    pub fn indexer(&self) -> &DateIndexer<C> {
        &self.indexer
    }

    /// Remote location of this file. The year directory is the current year.
    pub fn url(&self, filename: &EphemerisFilename) -> String {
        format!(
            "{}/{}/brdc/{}",
            self.archive,
            filename.year,
            filename.compressed()
        )
    }

    /// Downloads and decompresses the file for given day of year into `directory`.
    ///
    /// Only an unusable `directory` (or clock) is an error: every network
    /// failure is retried and eventually reported as [DownloadOutcome::ExhaustedRetries].
    /// A 404 does not end the loop either, the file may be published later.
    pub async fn fetch(
        &self,
        day_of_year: DayOfYear,
        directory: &Path,
        policy: &RetryPolicy,
    ) -> Result<DownloadOutcome, Error> {
        let filename = self.indexer.filename(day_of_year)?;
        let name = filename.compressed();
        let url = self.url(&filename);

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| Error::Directory {
                path: directory.to_path_buf(),
                source,
            })?;

        let local_path = directory.join(&name);

        for attempt in 1..=policy.total_attempts() {
            info!("attempt {}: downloading {} from {}", attempt, name, url);

            match self.attempt(&url, &local_path).await {
                DownloadOutcome::Success(path) => {
                    info!("{} downloaded to {}", name, path.display());

                    let compressed = path.clone();
                    let decompressed =
                        tokio::task::spawn_blocking(move || decompress(&compressed)).await;

                    let outcome = match decompressed {
                        Ok(Ok(decompressed)) => DownloadOutcome::Success(decompressed),
                        Ok(Err(e)) => {
                            error!("{}", e);
                            DownloadOutcome::Undecodable {
                                path,
                                reason: e.to_string(),
                            }
                        },
                        Err(e) => {
                            error!("{} - decompression task failure: {}", path.display(), e);
                            DownloadOutcome::Undecodable {
                                path,
                                reason: e.to_string(),
                            }
                        },
                    };

                    return Ok(outcome);
                },
                DownloadOutcome::NotFound => {
                    error!("{} not found (status code 404)", name);
                },
                DownloadOutcome::TransientFailure(reason) => {
                    error!("failed to download {}: {}", name, reason);
                },
                _ => {},
            }

            if let Some(wait) = policy.wait_after(attempt) {
                info!("retrying in {} minutes..", wait.as_secs() / 60);
                self.sleeper.sleep(wait).await;
            }
        }

        error!("all retry attempts failed for {}", name);
        Ok(DownloadOutcome::ExhaustedRetries)
    }

    /// Single GET request. The body is streamed to `local_path`,
    /// which is overwritten.
    async fn attempt(&self, url: &str, local_path: &Path) -> DownloadOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_connect() {
                    format!("connection error: {}", e)
                } else if e.is_timeout() {
                    format!("timeout: {}", e)
                } else {
                    e.to_string()
                };
                return DownloadOutcome::TransientFailure(reason);
            },
        };

        debug!("{} - status code {}", url, response.status());

        match response.status() {
            StatusCode::OK => match Self::stream_to_disk(response, local_path).await {
                Ok(size) => {
                    trace!("{} - wrote {} bytes", local_path.display(), size);
                    DownloadOutcome::Success(local_path.to_path_buf())
                },
                Err(e) => DownloadOutcome::TransientFailure(e.to_string()),
            },
            StatusCode::NOT_FOUND => DownloadOutcome::NotFound,
            status => DownloadOutcome::TransientFailure(format!("status code {}", status)),
        }
    }

    async fn stream_to_disk(mut response: Response, local_path: &Path) -> Result<u64, Error> {
        let mut fd = File::create(local_path).await?;
        let mut size = 0;

        while let Some(chunk) = response.chunk().await? {
            fd.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }

        fd.flush().await?;
        Ok(size)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        calendar::{
            DateSpec,
            test::{FixedClock, april_10th_2024},
        },
        decompress::test::{EPHEMERIS, gzip},
        retry::test::RecordingSleeper,
    };
    use tempfile::TempDir;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn build_fetcher(archive: &str) -> (Fetcher<FixedClock, RecordingSleeper>, RecordingSleeper) {
        let sleeper = RecordingSleeper::default();
        let fetcher = Fetcher::new(
            archive,
            Duration::from_secs(5),
            DateIndexer::new(april_10th_2024()),
            sleeper.clone(),
        )
        .unwrap();
        (fetcher, sleeper)
    }

    fn day(ordinal: u16) -> DayOfYear {
        DayOfYear::new(ordinal).unwrap()
    }

    #[test]
    fn urls() {
        let (fetcher, _) = build_fetcher(DEFAULT_ARCHIVE);
        let filename = EphemerisFilename {
            day_of_year: day(100),
            year: 2024,
        };
        assert_eq!(
            fetcher.url(&filename),
            "https://cddis.nasa.gov/archive/gnss/data/daily/2024/brdc/brdc1000.24n.gz"
        );

        let (fetcher, _) = build_fetcher("http://localhost:8080/archive");
        assert_eq!(
            fetcher.url(&filename),
            "http://localhost:8080/archive/2024/brdc/brdc1000.24n.gz"
        );
    }

    #[tokio::test]
    async fn download_and_decompress() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/brdc/brdc1000.24n.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(EPHEMERIS)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        // offset=1: day 100
        let doy = DateIndexer::new(april_10th_2024())
            .day_of_year(&DateSpec::Offset(1))
            .unwrap();

        let policy = RetryPolicy::new(3, 15).unwrap();
        let outcome = fetcher.fetch(doy, dir.path(), &policy).await.unwrap();

        let expected = dir.path().join("brdc1000.24n");
        assert_eq!(outcome, DownloadOutcome::Success(expected.clone()));
        assert_eq!(std::fs::read(&expected).unwrap(), EPHEMERIS);
        assert!(!dir.path().join("brdc1000.24n.gz").exists());
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn permanent_failure_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        let policy = RetryPolicy::new(3, 10).unwrap();
        let outcome = fetcher.fetch(day(100), dir.path(), &policy).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::ExhaustedRetries);
        // no wait after the final attempt
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(600); 3]);
        assert!(!dir.path().join("brdc1000.24n").exists());
    }

    #[tokio::test]
    async fn not_found_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2024/brdc/brdc1000.24n.gz"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        let policy = RetryPolicy::new(2, 1).unwrap();
        let outcome = fetcher.fetch(day(100), dir.path(), &policy).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::ExhaustedRetries);
        assert_eq!(sleeper.waits().len(), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        let outcome = fetcher
            .fetch(day(100), dir.path(), &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::ExhaustedRetries);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(EPHEMERIS)))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        let policy = RetryPolicy::new(5, 2).unwrap();
        let outcome = fetcher.fetch(day(100), dir.path(), &policy).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(sleeper.waits().len(), 2);
        assert_eq!(
            std::fs::read(dir.path().join("brdc1000.24n")).unwrap(),
            EPHEMERIS
        );
    }

    #[tokio::test]
    async fn undecodable_payload_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<html>login</html>".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&server.uri());

        let policy = RetryPolicy::new(3, 1).unwrap();
        let outcome = fetcher.fetch(day(100), dir.path(), &policy).await.unwrap();

        let compressed = dir.path().join("brdc1000.24n.gz");

        match outcome {
            DownloadOutcome::Undecodable { path, .. } => assert_eq!(path, compressed),
            other => panic!("expecting undecodable outcome, got {:?}", other),
        }

        assert!(compressed.exists());
        assert!(!dir.path().join("brdc1000.24n").exists());
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn connection_errors_are_retried() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };

        let dir = TempDir::new().unwrap();
        let (fetcher, sleeper) = build_fetcher(&uri);

        let policy = RetryPolicy::new(1, 5).unwrap();
        let outcome = fetcher.fetch(day(100), dir.path(), &policy).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::ExhaustedRetries);
        assert_eq!(sleeper.waits(), vec![Duration::from_secs(300)]);
    }

    #[tokio::test]
    async fn creates_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(EPHEMERIS)))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("nested").join("downloads");
        let (fetcher, _) = build_fetcher(&server.uri());

        let outcome = fetcher
            .fetch(day(7), &destination, &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DownloadOutcome::Success(destination.join("brdc0070.24n"))
        );
    }

    #[tokio::test]
    async fn unusable_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();

        let (fetcher, _) = build_fetcher(&server.uri());

        let result = fetcher
            .fetch(day(100), &file.join("downloads"), &RetryPolicy::default())
            .await;

        assert!(matches!(result, Err(Error::Directory { .. })));
    }
}
