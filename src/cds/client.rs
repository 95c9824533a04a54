use super::config::CdsConfig;
use crate::{downloader::Retrieve, errors::Era5Err, variables::CompletedRequest};
use log::{debug, info};
use pbr::{ProgressBar, Units};
use reqwest::{
    blocking::{Client, ClientBuilder, RequestBuilder, Response},
    header::HeaderValue,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    str::FromStr,
    thread::sleep,
    time::{Duration, Instant},
};
use strum_macros::{Display, EnumString};

const TOKEN_HEADER: &str = "private-token";

/// State of a job on the data store.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Successful,
    Failed,
    Rejected,
    Dismissed,
}

impl JobStatus {
    /// Whether the job will not change state any more.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Accepted | JobStatus::Running)
    }
}

#[derive(Debug, Deserialize)]
struct JobDoc {
    #[serde(rename = "jobID")]
    job_id: String,
    status: String,
}

impl JobDoc {
    fn status(&self) -> Result<JobStatus, Era5Err> {
        JobStatus::from_str(&self.status).map_err(|_| Era5Err::UnknownJobStatus(self.status.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct ResultsDoc {
    asset: AssetWrapper,
}

#[derive(Debug, Deserialize)]
struct AssetWrapper {
    value: Asset,
}

/// The result file of a successful job.
#[derive(Debug, Deserialize)]
struct Asset {
    href: String,
    #[serde(rename = "file:size")]
    size: Option<u64>,
}

// The API reports errors as RFC 7807 problem documents.
#[derive(Debug, Deserialize)]
struct ProblemDoc {
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Serialize)]
struct Execute<'a> {
    inputs: &'a CompletedRequest,
}

/// A blocking client for the Climate Data Store retrieve API.
///
/// The access token goes only to the API endpoints, never to the host serving the result file.
pub struct CdsClient {
    config: CdsConfig,
    token: HeaderValue,
    http: Client,
}

impl CdsClient {
    const POLL_START: Duration = Duration::from_secs(1);

    /// Load the configuration from the environment and build a client.
    pub fn from_env() -> Result<Self, Era5Err> {
        Self::new(CdsConfig::load()?)
    }

    /// Build a client for the given configuration.
    pub fn new(config: CdsConfig) -> Result<Self, Era5Err> {
        Self::with_builder(config, Client::builder())
    }

    fn with_builder(config: CdsConfig, builder: ClientBuilder) -> Result<Self, Era5Err> {
        let mut token = HeaderValue::from_str(&config.key)
            .map_err(|_| Era5Err::MissingConfig("key is not a valid header value".to_owned()))?;
        token.set_sensitive(true);

        let http = builder
            .user_agent(concat!("era5dn/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!config.verify)
            .timeout(None::<Duration>)
            .build()?;

        Ok(CdsClient {
            config,
            token,
            http,
        })
    }

    // A request to the API, carrying the access token.
    fn api(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(TOKEN_HEADER, self.token.clone())
            .timeout(self.config.timeout)
    }

    fn execution_url(&self, dataset: &str) -> String {
        format!(
            "{}/retrieve/v1/processes/{}/execution",
            self.config.url, dataset
        )
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/retrieve/v1/jobs/{}", self.config.url, job_id)
    }

    fn results_url(&self, job_id: &str) -> String {
        format!("{}/results", self.job_url(job_id))
    }

    fn submit(&self, dataset: &str, request: &CompletedRequest) -> Result<JobDoc, Era5Err> {
        let response = self
            .api(self.http.post(&self.execution_url(dataset)))
            .json(&Execute { inputs: request })
            .send()?;

        let job: JobDoc = serde_json::from_str(&check_status(response)?.text()?)?;
        info!("submitted {} request, job {}", dataset, job.job_id);

        Ok(job)
    }

    fn job(&self, job_id: &str) -> Result<JobDoc, Era5Err> {
        let response = self
            .api(self.http.get(&self.job_url(job_id)))
            .send()?;

        Ok(serde_json::from_str(&check_status(response)?.text()?)?)
    }

    fn wait_for(&self, job: JobDoc) -> Result<(String, JobStatus), Era5Err> {
        let started = Instant::now();
        let mut status = job.status()?;
        let job_id = job.job_id;
        let mut wait = std::cmp::min(Self::POLL_START, self.config.sleep_max);

        info!("job {} {}", job_id, status);
        while !status.is_terminal() {
            debug!("job {} {}, checking again in {:?}", job_id, status, wait);
            sleep(wait);
            wait = next_wait(wait, self.config.sleep_max);

            let next = self.job(&job_id)?.status()?;
            if next != status {
                info!("job {} {} after {:?}", job_id, next, started.elapsed());
            }
            status = next;
        }

        Ok((job_id, status))
    }

    fn results(&self, job_id: &str) -> Result<Asset, Era5Err> {
        let response = self
            .api(self.http.get(&self.results_url(job_id)))
            .send()?;

        let doc: ResultsDoc = serde_json::from_str(&check_status(response)?.text()?)?;

        Ok(doc.asset.value)
    }

    fn failure_reason(&self, job_id: &str) -> String {
        match self.results(job_id) {
            Err(Era5Err::Api { message, .. }) => message,
            Err(err) => err.to_string(),
            Ok(_) => "no reason given".to_owned(),
        }
    }

    fn download_asset(&self, asset: &Asset, target: &Path) -> Result<(), Era5Err> {
        debug!("downloading {} to {}", asset.href, target.display());
        let mut response = check_status(self.http.get(&asset.href).send()?)?;

        let total = asset.size.or_else(|| response.content_length()).unwrap_or(0);
        let mut pb = ProgressBar::new(total);
        pb.set_units(Units::Bytes);

        let mut out = BufWriter::new(File::create(target)?);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut received: u64 = 0;
        loop {
            let n = response.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            out.write_all(&buffer[..n])?;
            received += n as u64;
            pb.add(n as u64);
        }
        out.flush()?;
        pb.finish();

        match asset.size {
            Some(expected) if expected != received => {
                Err(Era5Err::IncompleteDownload { expected, received })
            }
            _ => Ok(()),
        }
    }
}

impl Retrieve for CdsClient {
    fn retrieve(
        &self,
        dataset: &str,
        request: &CompletedRequest,
        target: &Path,
    ) -> Result<(), Era5Err> {
        let job = self.submit(dataset, request)?;
        let (job_id, status) = self.wait_for(job)?;

        if status != JobStatus::Successful {
            let reason = self.failure_reason(&job_id);
            return Err(Era5Err::JobFailed {
                job_id,
                status,
                reason,
            });
        }

        let asset = self.results(&job_id)?;
        self.download_asset(&asset, target)
    }
}

fn next_wait(wait: Duration, sleep_max: Duration) -> Duration {
    std::cmp::min(wait.mul_f64(1.5), sleep_max)
}

fn check_status(response: Response) -> Result<Response, Era5Err> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(Era5Err::Api {
        status,
        message: problem_message(&body),
    })
}

fn problem_message(body: &str) -> String {
    match serde_json::from_str::<ProblemDoc>(body) {
        Ok(ProblemDoc {
            title: Some(title),
            detail: Some(detail),
        }) => format!("{}: {}", title, detail),
        Ok(ProblemDoc {
            title: Some(msg), ..
        })
        | Ok(ProblemDoc {
            detail: Some(msg), ..
        }) => msg,
        _ => body.trim().to_owned(),
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    use crate::variables::VARIABLES;
    use std::{
        fs,
        io::Read,
        net::{TcpListener, TcpStream},
        sync::{Arc, Mutex},
        thread,
    };
    use tempdir::TempDir;

    const DATASET: &str = "reanalysis-era5-land-monthly-means";

    fn test_client() -> CdsClient {
        CdsClient::new(CdsConfig::new("https://cds.example.com/api/", "abc-123")).unwrap()
    }

    #[test]
    fn test_urls() {
        let client = test_client();

        assert_eq!(
            client.execution_url("reanalysis-era5-land-monthly-means"),
            "https://cds.example.com/api/retrieve/v1/processes/reanalysis-era5-land-monthly-means/execution"
        );
        assert_eq!(
            client.job_url("42"),
            "https://cds.example.com/api/retrieve/v1/jobs/42"
        );
        assert_eq!(
            client.results_url("42"),
            "https://cds.example.com/api/retrieve/v1/jobs/42/results"
        );
    }

    #[test]
    fn test_job_status() {
        let job: JobDoc = serde_json::from_str(
            r#"{"processID": "reanalysis-era5-land-monthly-means", "type": "process",
                "jobID": "b3f2", "status": "running", "created": "2024-10-01T10:00:00"}"#,
        )
        .unwrap();

        assert_eq!(job.job_id, "b3f2");
        assert_eq!(job.status().unwrap(), JobStatus::Running);
        assert!(!JobStatus::Accepted.is_terminal());
        assert!(JobStatus::Successful.is_terminal());
        assert!(JobStatus::Dismissed.is_terminal());
        assert_eq!(JobStatus::Failed.to_string(), "failed");

        let odd = JobDoc {
            job_id: "x".to_owned(),
            status: "paused".to_owned(),
        };
        match odd.status() {
            Err(Era5Err::UnknownJobStatus(s)) => assert_eq!(s, "paused"),
            other => panic!("expected unknown status, got {:?}", other),
        }
    }

    #[test]
    fn test_results_doc() {
        let doc: ResultsDoc = serde_json::from_str(
            r#"{"asset": {"value": {"type": "application/x-grib",
                "href": "https://object-store.example.com/cache/abc.grib",
                "file:checksum": "ff00", "file:size": 1234,
                "file:local_path": "s3://cache/abc.grib"}}}"#,
        )
        .unwrap();

        assert_eq!(
            doc.asset.value.href,
            "https://object-store.example.com/cache/abc.grib"
        );
        assert_eq!(doc.asset.value.size, Some(1234));
    }

    #[test]
    fn test_problem_message() {
        assert_eq!(
            problem_message(r#"{"type": "x", "title": "invalid request", "detail": "bad year"}"#),
            "invalid request: bad year"
        );
        assert_eq!(
            problem_message(r#"{"title": "authentication failed"}"#),
            "authentication failed"
        );
        assert_eq!(problem_message("  Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_next_wait() {
        let max = Duration::from_secs(120);
        assert_eq!(
            next_wait(Duration::from_secs(2), max),
            Duration::from_secs(3)
        );
        assert_eq!(next_wait(Duration::from_secs(100), max), max);
    }

    #[test]
    fn test_execute_body() {
        let request = crate::variables::VARIABLES[1].complete(2000, 2000);
        let body = serde_json::to_value(Execute { inputs: &request }).unwrap();

        assert_eq!(body["inputs"]["variable"][0], "2m_temperature");
        assert_eq!(body["inputs"]["month"][11], "12");
    }

    // A tiny HTTP server answering each request line prefix with a fixed status and body. It
    // keeps the head of every request it sees.
    struct FakeServer {
        api_url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    type Route = (String, u16, String);

    fn start_server<F>(make_routes: F) -> FakeServer
    where
        F: FnOnce(&str) -> Vec<Route>,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes = make_routes(&base);

        let requests = Arc::new(Mutex::new(vec![]));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => break,
                };

                let head = read_request(&mut stream);
                let request_line = head.lines().next().unwrap_or("").to_owned();
                seen.lock().unwrap().push(head);

                let (status, body) = routes
                    .iter()
                    .find(|(prefix, _, _)| request_line.starts_with(prefix.as_str()))
                    .map(|(_, status, body)| (*status, body.clone()))
                    .unwrap_or((404, String::new()));

                let response = format!(
                    "HTTP/1.1 {} Fake\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        FakeServer {
            api_url: format!("{}/api", base),
            requests,
        }
    }

    // Read one request and return its head, consuming any body.
    fn read_request(stream: &mut TcpStream) -> String {
        let mut data: Vec<u8> = vec![];
        let mut buf = [0u8; 4096];

        loop {
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|line| {
                        let line = line.to_ascii_lowercase();
                        line.strip_prefix("content-length:")
                            .and_then(|val| val.trim().parse::<usize>().ok())
                    })
                    .next()
                    .unwrap_or(0);

                if data.len() >= end + 4 + body_len {
                    return head;
                }
            }

            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return String::from_utf8_lossy(&data).to_string(),
                Ok(n) => data.extend_from_slice(&buf[..n]),
            }
        }
    }

    fn fake_client(api_url: &str) -> CdsClient {
        let mut config = CdsConfig::new(api_url, "secret-key");
        config.sleep_max = Duration::from_millis(10);

        CdsClient::with_builder(config, Client::builder().no_proxy()).unwrap()
    }

    fn job_routes(base: &str, results: (u16, String), asset_body: &str) -> Vec<Route> {
        vec![
            (
                format!("POST /api/retrieve/v1/processes/{}/execution ", DATASET),
                201,
                r#"{"jobID": "j1", "status": "accepted"}"#.to_owned(),
            ),
            (
                "GET /api/retrieve/v1/jobs/j1 ".to_owned(),
                200,
                r#"{"jobID": "j1", "status": "successful"}"#.to_owned(),
            ),
            (
                "GET /api/retrieve/v1/jobs/j1/results ".to_owned(),
                results.0,
                results.1.replace("{base}", base),
            ),
            ("GET /file ".to_owned(), 200, asset_body.to_owned()),
        ]
    }

    #[test]
    fn test_retrieve_writes_asset() {
        let server = start_server(|base| {
            job_routes(
                base,
                (
                    200,
                    r#"{"asset": {"value": {"href": "{base}/file", "file:size": 5}}}"#.to_owned(),
                ),
                "GRIB!",
            )
        });
        let tmp = TempDir::new("era5dn-test-client").unwrap();
        let target = tmp.path().join("t2m_2000_2000.grib");

        let client = fake_client(&server.api_url);
        let request = VARIABLES[1].complete(2000, 2000);
        client.retrieve(DATASET, &request, &target).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "GRIB!");

        let requests = server.requests.lock().unwrap();
        let heads: Vec<String> = requests.iter().map(|r| r.to_ascii_lowercase()).collect();
        assert_eq!(heads.len(), 4);
        assert!(heads[0].starts_with("post "));
        assert!(heads[..3]
            .iter()
            .all(|head| head.contains("private-token: secret-key")));
        assert!(heads[3].starts_with("get /file "));
        assert!(!heads[3].contains("private-token"));
    }

    #[test]
    fn test_retrieve_failed_job() {
        let server = start_server(|base| {
            let mut routes = job_routes(
                base,
                (
                    400,
                    r#"{"type": "x", "title": "job failed", "detail": "bad var"}"#.to_owned(),
                ),
                "",
            );
            routes[1].2 = r#"{"jobID": "j1", "status": "failed"}"#.to_owned();
            routes
        });
        let tmp = TempDir::new("era5dn-test-client").unwrap();
        let target = tmp.path().join("tdew_2000_2000.grib");

        let client = fake_client(&server.api_url);
        let request = VARIABLES[2].complete(2000, 2000);

        match client.retrieve(DATASET, &request, &target) {
            Err(Era5Err::JobFailed {
                job_id,
                status,
                reason,
            }) => {
                assert_eq!(job_id, "j1");
                assert_eq!(status, JobStatus::Failed);
                assert_eq!(reason, "job failed: bad var");
            }
            other => panic!("expected a failed job, got {:?}", other),
        }
        assert!(!target.exists());
    }

    #[test]
    fn test_retrieve_short_download() {
        let server = start_server(|base| {
            job_routes(
                base,
                (
                    200,
                    r#"{"asset": {"value": {"href": "{base}/file", "file:size": 100}}}"#
                        .to_owned(),
                ),
                "GRIB!",
            )
        });
        let tmp = TempDir::new("era5dn-test-client").unwrap();
        let target = tmp.path().join("precipitation_2000_2000.grib");

        let client = fake_client(&server.api_url);
        let request = VARIABLES[3].complete(2000, 2000);

        match client.retrieve(DATASET, &request, &target) {
            Err(Era5Err::IncompleteDownload { expected, received }) => {
                assert_eq!(expected, 100);
                assert_eq!(received, 5);
            }
            other => panic!("expected an incomplete download, got {:?}", other),
        }
    }

    #[test]
    fn test_retrieve_rejected_submit() {
        let server = start_server(|_| {
            vec![(
                format!("POST /api/retrieve/v1/processes/{}/execution ", DATASET),
                401,
                r#"{"title": "authentication failed"}"#.to_owned(),
            )]
        });
        let tmp = TempDir::new("era5dn-test-client").unwrap();
        let target = tmp.path().join("t2m_2000_2000.grib");

        let client = fake_client(&server.api_url);
        let request = VARIABLES[1].complete(2000, 2000);

        match client.retrieve(DATASET, &request, &target) {
            Err(Era5Err::Api { status, message }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(message, "authentication failed");
            }
            other => panic!("expected an api error, got {:?}", other),
        }
        assert_eq!(server.requests.lock().unwrap().len(), 1);
    }
}
