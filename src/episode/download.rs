// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use url::Url;

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::list_audio_files;

/// Placeholder replaced by the item link in command arguments
pub const URL_PLACEHOLDER: &str = "{url}";

/// Program used by [`CommandDownloader::default`]
pub const DEFAULT_PROGRAM: &str = "yt-dlp";

/// Arguments used by [`CommandDownloader::default`]
pub const DEFAULT_ARGS: [&str; 6] = [
    "--extract-audio",
    "--audio-format",
    "m4a",
    "--output",
    "%(uploader)s - %(title)s.%(ext)s",
    URL_PLACEHOLDER,
];

/// Context for tracking a download within a run
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Filename the item will be stored under once the download finished
    pub filename: String,
    /// Index of this item in the download queue
    pub index: usize,
    /// Total number of items to download
    pub total: usize,
}

/// Fetches the media behind an item link into a directory.
///
/// The downloader picks the name of the file it creates and returns it;
/// callers rename the file afterwards if they need a different name.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(
        &self,
        link: &str,
        dir: &Path,
        context: &DownloadContext,
        reporter: &SharedProgressReporter,
    ) -> Result<String, DownloadError>;
}

/// Streams links that point directly at a media file
#[derive(Clone)]
pub struct HttpDownloader<C> {
    client: C,
}

impl<C: HttpClient> HttpDownloader<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

/// Last non-empty path segment of a link
fn file_name_from_link(link: &str) -> Result<String, DownloadError> {
    let invalid = || DownloadError::InvalidLink(link.to_string());
    let url = Url::parse(link).map_err(|_| invalid())?;

    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty() && !segment.starts_with('.'))
        .map(String::from)
        .ok_or_else(invalid)
}

#[async_trait]
impl<C: HttpClient> Downloader for HttpDownloader<C> {
    /// Streams the response body to `<name>.partial` and renames it to
    /// `<name>` once complete, so an interrupted download never looks finished.
    async fn download(
        &self,
        link: &str,
        dir: &Path,
        context: &DownloadContext,
        reporter: &SharedProgressReporter,
    ) -> Result<String, DownloadError> {
        let file_name = file_name_from_link(link)?;
        let output_path = dir.join(&file_name);
        let partial_path = dir.join(format!("{file_name}.partial"));

        let response = self
            .client
            .get_stream(link)
            .await
            .map_err(|e| DownloadError::HttpFailed {
                url: link.to_string(),
                source: e,
            })?;

        if response.status >= 400 {
            return Err(DownloadError::HttpStatus {
                url: link.to_string(),
                status: response.status,
            });
        }

        let mut file =
            File::create(&partial_path)
                .await
                .map_err(|e| DownloadError::FileCreateFailed {
                    path: partial_path.clone(),
                    source: e,
                })?;

        let mut bytes_downloaded: u64 = 0;
        let mut stream = response.body;

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
                url: link.to_string(),
                source: e,
            })?;

            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: partial_path.clone(),
                    source: e,
                })?;

            bytes_downloaded += chunk.len() as u64;

            reporter.report(ProgressEvent::DownloadProgress {
                filename: context.filename.clone(),
                bytes_downloaded,
                total_bytes: response.content_length,
            });
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::FileWriteFailed {
                path: partial_path.clone(),
                source: e,
            })?;
        drop(file);

        tokio::fs::rename(&partial_path, &output_path)
            .await
            .map_err(|e| DownloadError::RenameFailed {
                from: partial_path,
                to: output_path,
                source: e,
            })?;

        Ok(file_name)
    }
}

/// Number of trailing stderr lines kept in [`DownloadError::CommandFailed`]
const STDERR_TAIL_LINES: usize = 5;

/// Last non-blank lines of a command's standard error, joined by `" | "`
fn stderr_tail(stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ")
}

/// Runs an external program that saves the media into the working directory.
///
/// The produced file is found by comparing the audio files present before
/// and after the program ran.
#[derive(Debug, Clone)]
pub struct CommandDownloader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDownloader {
    /// Create a downloader running `program` with `args`.
    ///
    /// Every `{url}` in the arguments is replaced by the item link; without a
    /// placeholder the link is appended as the last argument.
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Parse a whitespace-separated command line such as `"yt-dlp -x {url}"`
    pub fn from_command_line(command_line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args_for(&self, link: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, link))
            .collect();

        if !self.args.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) {
            args.push(link.to_string());
        }
        args
    }
}

impl Default for CommandDownloader {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROGRAM,
            DEFAULT_ARGS.iter().map(|arg| arg.to_string()).collect(),
            Duration::from_secs(60 * 60),
        )
    }
}

#[async_trait]
impl Downloader for CommandDownloader {
    async fn download(
        &self,
        link: &str,
        dir: &Path,
        _context: &DownloadContext,
        _reporter: &SharedProgressReporter,
    ) -> Result<String, DownloadError> {
        let scan_failed = |e| DownloadError::ScanFailed {
            path: dir.to_path_buf(),
            source: e,
        };
        let before = list_audio_files(dir).map_err(scan_failed)?;

        let mut command = Command::new(&self.program);
        command
            .args(self.args_for(link))
            .current_dir(dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| DownloadError::TimedOut {
                url: link.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|e| DownloadError::CommandSpawnFailed {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(DownloadError::CommandFailed {
                program: self.program.clone(),
                url: link.to_string(),
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }

        let after = list_audio_files(dir).map_err(scan_failed)?;
        let mut created: Vec<String> = after.difference(&before).cloned().collect();

        match created.len() {
            0 => Err(DownloadError::NoOutputFile {
                url: link.to_string(),
            }),
            1 => Ok(created.remove(0)),
            _ => Err(DownloadError::AmbiguousOutput {
                url: link.to_string(),
                files: created,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ByteStream, HttpResponse};
    use crate::progress::NoopReporter;
    use bytes::Bytes;

    use tempfile::tempdir;

    struct MockHttpClient {
        response_data: Vec<u8>,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.response_data.clone()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            let data = self.response_data.clone();
            let len = data.len() as u64;

            let stream: ByteStream =
                Box::pin(futures::stream::once(async move { Ok(Bytes::from(data)) }));

            Ok(HttpResponse {
                status: self.status,
                content_length: Some(len),
                body: stream,
            })
        }
    }

    fn context() -> DownloadContext {
        DownloadContext {
            filename: "Show - Ep 1.m4a".to_string(),
            index: 0,
            total: 1,
        }
    }

    #[tokio::test]
    async fn http_download_writes_file_named_after_link() {
        let dir = tempdir().unwrap();
        let downloader = HttpDownloader::new(MockHttpClient {
            response_data: b"test audio content".to_vec(),
            status: 200,
        });

        let name = downloader
            .download(
                "https://cdn.example.com/media/ep1.m4a?sig=abc",
                dir.path(),
                &context(),
                &NoopReporter::shared(),
            )
            .await
            .unwrap();

        assert_eq!(name, "ep1.m4a");
        let content = std::fs::read(dir.path().join("ep1.m4a")).unwrap();
        assert_eq!(content, b"test audio content");
        assert!(!dir.path().join("ep1.m4a.partial").exists());
    }

    #[tokio::test]
    async fn http_download_fails_on_http_error() {
        let dir = tempdir().unwrap();
        let downloader = HttpDownloader::new(MockHttpClient {
            response_data: b"Not Found".to_vec(),
            status: 404,
        });

        let result = downloader
            .download(
                "https://cdn.example.com/ep1.m4a",
                dir.path(),
                &context(),
                &NoopReporter::shared(),
            )
            .await;

        match result.unwrap_err() {
            DownloadError::HttpStatus { status, .. } => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
        assert!(!dir.path().join("ep1.m4a").exists());
    }

    #[tokio::test]
    async fn http_download_survives_slow_body_longer_than_timeout() {
        use crate::http::ReqwestClient;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // 30 bytes in three chunks, 600 ms apart: 1.8 s in total
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();

            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 30\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            for chunk in [b"0123456789", b"abcdefghij", b"ABCDEFGHIJ"] {
                tokio::time::sleep(Duration::from_millis(600)).await;
                socket.write_all(chunk).await.unwrap();
                socket.flush().await.unwrap();
            }
        });

        let dir = tempdir().unwrap();
        let client = ReqwestClient::with_timeout(Duration::from_secs(1)).unwrap();
        let name = HttpDownloader::new(client)
            .download(
                &format!("http://{addr}/ep.m4a"),
                dir.path(),
                &context(),
                &NoopReporter::shared(),
            )
            .await
            .unwrap();

        server.await.unwrap();
        assert_eq!(name, "ep.m4a");
        let content = std::fs::read(dir.path().join("ep.m4a")).unwrap();
        assert_eq!(content, b"0123456789abcdefghijABCDEFGHIJ");
    }

    #[test]
    fn file_name_from_link_rejects_links_without_file() {
        assert!(matches!(
            file_name_from_link("https://cdn.example.com/"),
            Err(DownloadError::InvalidLink(_))
        ));
        assert!(matches!(
            file_name_from_link("not a url"),
            Err(DownloadError::InvalidLink(_))
        ));
    }

    #[test]
    fn command_args_substitute_placeholder() {
        let downloader = CommandDownloader::new(
            "dl",
            vec!["-o".to_string(), "x".to_string(), "--url={url}".to_string()],
            Duration::from_secs(1),
        );
        assert_eq!(
            downloader.args_for("http://a/b"),
            ["-o", "x", "--url=http://a/b"]
        );
    }

    #[test]
    fn command_args_append_link_without_placeholder() {
        let downloader =
            CommandDownloader::from_command_line("dl -x", Duration::from_secs(1)).unwrap();
        assert_eq!(downloader.args_for("http://a/b"), ["-x", "http://a/b"]);
    }

    #[test]
    fn command_line_requires_program() {
        assert!(CommandDownloader::from_command_line("   ", Duration::from_secs(1)).is_none());
    }

    #[cfg(unix)]
    fn shell(script: &str, timeout: Duration) -> CommandDownloader {
        CommandDownloader::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_reports_created_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Existing.m4a"), b"old").unwrap();

        let downloader = shell("printf audio > 'Show - Ep 1 [x].m4a'", Duration::from_secs(10));
        let name = downloader
            .download(
                "https://www.mixcloud.com/show/ep-1/",
                dir.path(),
                &context(),
                &NoopReporter::shared(),
            )
            .await
            .unwrap();

        assert_eq!(name, "Show - Ep 1 [x].m4a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_fails_on_nonzero_exit() {
        let dir = tempdir().unwrap();
        let result = shell("exit 3", Duration::from_secs(10))
            .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
            .await;

        assert!(matches!(result, Err(DownloadError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_failure_carries_stderr_tail() {
        let dir = tempdir().unwrap();
        let result = shell(
            "for i in 1 2 3 4 5 6 7; do echo \"line $i\" >&2; done; echo 'ERROR: gone' >&2; exit 1",
            Duration::from_secs(10),
        )
        .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
        .await;

        match result {
            Err(DownloadError::CommandFailed { stderr, .. }) => {
                assert_eq!(stderr, "line 4 | line 5 | line 6 | line 7 | ERROR: gone");
            }
            other => panic!("Expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn stderr_tail_skips_blank_lines() {
        assert_eq!(stderr_tail(b"\n  first  \n\nsecond\n"), "first | second");
        assert_eq!(stderr_tail(b""), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_fails_without_new_file() {
        let dir = tempdir().unwrap();
        let result = shell("true", Duration::from_secs(10))
            .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
            .await;

        assert!(matches!(result, Err(DownloadError::NoOutputFile { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_rejects_several_new_files() {
        let dir = tempdir().unwrap();
        let result = shell("touch a.m4a b.m4a", Duration::from_secs(10))
            .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
            .await;

        match result {
            Err(DownloadError::AmbiguousOutput { files, .. }) => {
                assert_eq!(files, ["a.m4a", "b.m4a"]);
            }
            other => panic!("Expected AmbiguousOutput, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_download_times_out() {
        let dir = tempdir().unwrap();
        let result = shell("sleep 5", Duration::from_millis(100))
            .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
            .await;

        assert!(matches!(result, Err(DownloadError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn command_download_reports_missing_program() {
        let dir = tempdir().unwrap();
        let result = CommandDownloader::new(
            "podmirror-no-such-downloader",
            vec![],
            Duration::from_secs(10),
        )
        .download("http://a/b", dir.path(), &context(), &NoopReporter::shared())
        .await;

        assert!(matches!(result, Err(DownloadError::CommandSpawnFailed { .. })));
    }
}
