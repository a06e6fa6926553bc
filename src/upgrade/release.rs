//! Release feed access and asset selection.
//!
//! The feed is the GitHub "latest release" endpoint of the configured repository.
//! [`ReleaseClient`] abstracts the three network operations the updater needs so the
//! orchestration can be exercised against an in-memory feed.

use crate::core::AsanaError;
use crate::upgrade::platform::PlatformKey;
use crate::utils::progress::ProgressBar;
use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Repository queried when no override is configured.
pub const DEFAULT_REPOSITORY: &str = "pleaseai/asana";

const GITHUB_API_BASE: &str = "https://api.github.com";

/// A published release as reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseDescriptor {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    pub browser_download_url: String,
}

/// The assets chosen for this machine from a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub binary: AssetDescriptor,
    pub checksum: Option<AssetDescriptor>,
}

impl UpdatePlan {
    /// Pick `<binary_name>-<platform>` and, if published, its `.sha256` companion.
    ///
    /// Matching is exact and case-sensitive.
    ///
    /// # Errors
    ///
    /// [`AsanaError::NoBinaryForPlatform`] when the release has no matching binary.
    pub fn select(
        release: &ReleaseDescriptor,
        binary_name: &str,
        platform: PlatformKey,
    ) -> Result<Self, AsanaError> {
        let asset_name = format!("{binary_name}-{platform}");
        let checksum_name = format!("{asset_name}.sha256");

        let binary = release.assets.iter().find(|asset| asset.name == asset_name).cloned().ok_or_else(
            || AsanaError::NoBinaryForPlatform {
                platform: platform.to_string(),
            },
        )?;
        let checksum = release.assets.iter().find(|asset| asset.name == checksum_name).cloned();

        Ok(Self {
            binary,
            checksum,
        })
    }
}

/// Network operations required by the updater.
pub trait ReleaseClient {
    /// Fetch the latest release descriptor.
    fn latest_release(&self) -> impl Future<Output = Result<ReleaseDescriptor>> + Send;

    /// Stream an asset into `dest`, returning the number of bytes written.
    fn download(&self, url: &str, dest: &Path) -> impl Future<Output = Result<u64>> + Send;

    /// Fetch a small text asset such as a checksum file.
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String>> + Send;
}

/// [`ReleaseClient`] backed by the GitHub REST API.
pub struct GitHubReleaseClient {
    http: reqwest::Client,
    repository: String,
    api_base: String,
}

impl GitHubReleaseClient {
    /// Client for `owner/name` on github.com.
    pub fn new(repository: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("asana-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            repository: repository.into(),
            api_base: GITHUB_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API host.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repository
        )
    }
}

impl ReleaseClient for GitHubReleaseClient {
    async fn latest_release(&self) -> Result<ReleaseDescriptor> {
        let url = self.latest_release_url();
        debug!("Fetching latest release from {url}");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .context("Failed to reach the release feed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(AsanaError::FeedUnreachable {
                status: status.to_string(),
            }
            .into());
        }

        let release: ReleaseDescriptor =
            response.json().await.context("Failed to parse release information")?;
        info!("Latest release is {}", release.tag_name);
        Ok(release)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        debug!("Downloading {url} to {:?}", dest);

        let response =
            self.http.get(url).send().await.with_context(|| format!("Failed to download {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AsanaError::DownloadFailed {
                url: url.to_string(),
                status: status.to_string(),
            }
            .into());
        }

        let progress = ProgressBar::download(response.content_length());
        if let Some(name) = dest.file_name() {
            progress.set_message(name.to_string_lossy());
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to create {dest:?}"))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Download of {url} was interrupted"))?;
            file.write_all(&chunk).await.with_context(|| format!("Failed to write {dest:?}"))?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await?;
        progress.finish_and_clear();

        debug!("Downloaded {written} bytes");
        Ok(written)
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response =
            self.http.get(url).send().await.with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AsanaError::DownloadFailed {
                url: url.to_string(),
                status: status.to_string(),
            }
            .into());
        }

        response.text().await.with_context(|| format!("Failed to read {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{Request, Response, StatusCode};
    use http_body_util::combinators::BoxBody;
    use http_body_util::{BodyExt, Full, StreamBody};
    use hyper::body::{Frame, Incoming};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    const LATEST: &str = "/repos/pleaseai/asana/releases/latest";

    #[derive(Clone)]
    enum Reply {
        Body(StatusCode, &'static str),
        Chunked(Vec<&'static [u8]>),
    }

    impl Reply {
        fn into_response(self) -> Response<BoxBody<Bytes, Infallible>> {
            match self {
                Reply::Body(status, body) => Response::builder()
                    .status(status)
                    .body(Full::new(Bytes::from_static(body.as_bytes())).boxed())
                    .unwrap(),
                Reply::Chunked(chunks) => {
                    let frames = chunks
                        .into_iter()
                        .map(|chunk| Ok::<_, Infallible>(Frame::data(Bytes::from_static(chunk))));
                    Response::new(BodyExt::boxed(StreamBody::new(futures::stream::iter(frames))))
                }
            }
        }
    }

    /// Serve fixed replies by path on a loopback port and return the base URL.
    async fn serve(routes: Vec<(&'static str, Reply)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let svc = service_fn(move |req: Request<Incoming>| {
                        let reply = routes
                            .iter()
                            .find(|(path, _)| *path == req.uri().path())
                            .map(|(_, reply)| reply.clone())
                            .unwrap_or(Reply::Body(StatusCode::NOT_FOUND, "Not Found"));
                        async move { Ok::<_, Infallible>(reply.into_response()) }
                    });
                    let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), svc).await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn client(base: &str) -> GitHubReleaseClient {
        GitHubReleaseClient::new("pleaseai/asana").unwrap().with_api_base(base)
    }

    fn asset(name: &str) -> AssetDescriptor {
        AssetDescriptor {
            name: name.to_string(),
            browser_download_url: format!("https://example.invalid/{name}"),
        }
    }

    fn release(names: &[&str]) -> ReleaseDescriptor {
        ReleaseDescriptor {
            tag_name: "v0.2.0".to_string(),
            name: Some("v0.2.0".to_string()),
            prerelease: false,
            assets: names.iter().map(|n| asset(n)).collect(),
        }
    }

    fn linux_x64() -> PlatformKey {
        PlatformKey::detect("linux", "x64").unwrap()
    }

    #[test]
    fn test_select_with_checksum() {
        let release = release(&[
            "asana-darwin-arm64",
            "asana-linux-x64",
            "asana-linux-x64.sha256",
        ]);

        let plan = UpdatePlan::select(&release, "asana", linux_x64()).unwrap();
        assert_eq!(plan.binary.name, "asana-linux-x64");
        assert_eq!(plan.checksum.unwrap().name, "asana-linux-x64.sha256");
    }

    #[test]
    fn test_select_without_checksum() {
        let release = release(&["asana-linux-x64"]);

        let plan = UpdatePlan::select(&release, "asana", linux_x64()).unwrap();
        assert!(plan.checksum.is_none());
    }

    #[test]
    fn test_select_requires_exact_match() {
        let release = release(&["asana-linux-x64.tar.gz", "Asana-linux-x64", "asana-linux-arm64"]);

        let err = UpdatePlan::select(&release, "asana", linux_x64()).unwrap_err();
        assert_eq!(
            err,
            AsanaError::NoBinaryForPlatform {
                platform: "linux-x64".to_string()
            }
        );
    }

    #[test]
    fn test_release_deserializes_from_github_payload() {
        let body = r#"{
            "tag_name": "v0.2.0",
            "name": "Release 0.2.0",
            "prerelease": false,
            "draft": false,
            "assets": [
                {"name": "asana-linux-x64", "browser_download_url": "https://github.com/a/b", "size": 12}
            ]
        }"#;

        let release: ReleaseDescriptor = serde_json::from_str(body).unwrap();
        assert_eq!(release.tag_name, "v0.2.0");
        assert_eq!(release.assets.len(), 1);
    }

    #[test]
    fn test_latest_release_url() {
        let client = GitHubReleaseClient::new("pleaseai/asana")
            .unwrap()
            .with_api_base("http://127.0.0.1:9/");
        assert_eq!(client.latest_release_url(), "http://127.0.0.1:9/repos/pleaseai/asana/releases/latest");
    }

    #[tokio::test]
    async fn test_latest_release_from_feed() {
        let body = r#"{"tag_name":"v0.2.0","assets":[{"name":"asana-linux-x64","browser_download_url":"http://x/a"}]}"#;
        let base = serve(vec![(LATEST, Reply::Body(StatusCode::OK, body))]).await;

        let release = client(&base).latest_release().await.unwrap();
        assert_eq!(release.tag_name, "v0.2.0");
        assert_eq!(release.assets[0].name, "asana-linux-x64");
    }

    #[tokio::test]
    async fn test_feed_error_status_is_unreachable() {
        let base = serve(vec![(
            LATEST,
            Reply::Body(StatusCode::SERVICE_UNAVAILABLE, "down for maintenance"),
        )])
        .await;

        let err = client(&base).latest_release().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<AsanaError>(),
            Some(&AsanaError::FeedUnreachable {
                status: "503 Service Unavailable".to_string()
            })
        );
        assert_eq!(err.to_string(), "Failed to fetch releases: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_malformed_feed_is_a_parse_error() {
        let base = serve(vec![(LATEST, Reply::Body(StatusCode::OK, "<html>rate limited</html>"))]).await;

        let err = client(&base).latest_release().await.unwrap_err();
        assert!(err.downcast_ref::<AsanaError>().is_none());
        assert!(err.to_string().contains("Failed to parse release information"));
    }

    #[tokio::test]
    async fn test_download_streams_chunked_body() {
        let base = serve(vec![(
            "/asana-linux-x64",
            Reply::Chunked(vec![&b"#!/bin/sh\n"[..], &b"echo asana "[..], &b"0.2.0\n"[..]]),
        )])
        .await;
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("asana-linux-x64");

        let written = client(&base).download(&format!("{base}/asana-linux-x64"), &dest).await.unwrap();

        assert_eq!(written, 27);
        assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\necho asana 0.2.0\n");
    }

    #[tokio::test]
    async fn test_missing_assets_are_download_failures() {
        let base = serve(Vec::new()).await;
        let temp = TempDir::new().unwrap();
        let url = format!("{base}/asana-linux-x64");
        let expected = AsanaError::DownloadFailed {
            url: url.clone(),
            status: "404 Not Found".to_string(),
        };

        let err = client(&base).download(&url, &temp.path().join("asset")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<AsanaError>(), Some(&expected));
        assert!(!temp.path().join("asset").exists());

        let err = client(&base).fetch_text(&url).await.unwrap_err();
        assert_eq!(err.downcast_ref::<AsanaError>(), Some(&expected));
    }

    #[tokio::test]
    async fn test_fetch_text_reads_checksum() {
        let base = serve(vec![(
            "/asana-linux-x64.sha256",
            Reply::Body(StatusCode::OK, "abc123  asana-linux-x64\n"),
        )])
        .await;

        let text = client(&base).fetch_text(&format!("{base}/asana-linux-x64.sha256")).await.unwrap();
        assert_eq!(text, "abc123  asana-linux-x64\n");
    }
}
