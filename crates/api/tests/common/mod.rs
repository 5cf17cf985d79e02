#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use rvc_api::config::ServerConfig;
use rvc_api::router::build_app_router;
use rvc_api::state::AppState;
use rvc_core::conversion::invoker::DEFAULT_PITCH_METHOD;
use rvc_core::conversion::Converter;
use rvc_core::job::JobState;

/// Bytes the fake conversion tool writes to its `--output` path.
pub const CONVERTED_BYTES: &[u8] = b"RIFF-converted";

/// Fake inference script run by `/bin/sh`: writes [`CONVERTED_BYTES`] to
/// the path following `--output`.
const FAKE_TOOL: &str = r#"
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "--output" ]; then out="$arg"; fi
  prev="$arg"
done
printf 'RIFF-converted' > "$out"
"#;

const BOUNDARY: &str = "rvc-test-boundary";

/// A running test application and the directories behind it.
pub struct TestApp {
    pub root: TempDir,
    pub config: ServerConfig,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    /// App backed by the real invoker with a fake tool, and one artist
    /// (`ArtistX`) that has exactly one `model.pth` and no index.
    pub fn new() -> Self {
        Self::with_tool(FAKE_TOOL)
    }

    /// Same layout as [`TestApp::new`], with a custom tool script body.
    pub fn with_tool(script_body: &str) -> Self {
        Self::configured(script_body, |_| {})
    }

    /// Same layout as [`TestApp::new`], with a shorter request timeout.
    pub fn with_request_timeout(secs: u64) -> Self {
        Self::configured(FAKE_TOOL, |config| config.request_timeout_secs = secs)
    }

    fn configured(script_body: &str, adjust: impl FnOnce(&mut ServerConfig)) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(root.path());
        adjust(&mut config);
        prepare_dirs(&config);
        std::fs::write(config.rvc_script.as_ref().unwrap(), script_body).unwrap();

        let state = AppState::new(config.clone());
        Self::assemble(root, config, state)
    }

    /// App whose jobs are executed by `converter` instead of a subprocess.
    pub fn with_converter(converter: Arc<dyn Converter>) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let config = test_config(root.path());
        prepare_dirs(&config);

        let state = AppState::with_converter(config.clone(), converter);
        Self::assemble(root, config, state)
    }

    fn assemble(root: TempDir, config: ServerConfig, state: AppState) -> Self {
        let router = build_app_router(state.clone(), &config);
        Self {
            root,
            config,
            state,
            router,
        }
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post_multipart(&self, uri: &str, parts: &[Part<'_>]) -> Response<Body> {
        self.post_multipart_body(uri, Body::from(multipart_body(parts)))
            .await
    }

    /// POST an already encoded multipart body (which may be streamed).
    pub async fn post_multipart_body(&self, uri: &str, body: Body) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(body)
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Submit `song.wav` for `artist` and return the job id.
    pub async fn submit(&self, artist: &str) -> String {
        let response = self
            .post_multipart(
                "/convert",
                &[
                    Part::File {
                        name: "file",
                        filename: "song.wav",
                        content: b"RIFF-original",
                    },
                    Part::Text {
                        name: "artist",
                        value: artist,
                    },
                ],
            )
            .await;
        assert_eq!(response.status(), 200);
        body_json(response).await["job_id"]
            .as_str()
            .expect("job_id string")
            .to_string()
    }

    /// Wait (up to 10s) until the job leaves `Processing`.
    pub async fn wait_for_terminal(&self, job_id: &str) -> JobState {
        for _ in 0..500 {
            let job = self.state.registry.get(job_id).await.expect("job exists");
            if job.state.is_terminal() {
                return job.state;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} did not finish in time");
    }

    /// Number of files left in the uploads directory.
    pub fn scratch_files(&self) -> usize {
        std::fs::read_dir(&self.config.uploads_dir).unwrap().count()
    }

    pub fn artist_dir(&self, artist: &str) -> PathBuf {
        self.config.models_dir.join(artist)
    }
}

/// Build a test `ServerConfig` rooted at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 10 * 1024 * 1024,
        models_dir: root.join("models"),
        uploads_dir: root.join("uploads"),
        outputs_dir: root.join("outputs"),
        static_dir: root.join("static"),
        rvc_python: PathBuf::from("/bin/sh"),
        rvc_script: Some(root.join("rvc_infer.sh")),
        pitch_method: DEFAULT_PITCH_METHOD.to_string(),
    }
}

fn prepare_dirs(config: &ServerConfig) {
    for dir in [
        &config.models_dir,
        &config.uploads_dir,
        &config.outputs_dir,
        &config.static_dir,
    ] {
        std::fs::create_dir_all(dir).unwrap();
    }
    let artist = config.models_dir.join("ArtistX");
    std::fs::create_dir_all(&artist).unwrap();
    std::fs::write(artist.join("model.pth"), b"weights").unwrap();
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text {
        name: &'a str,
        value: &'a str,
    },
    File {
        name: &'a str,
        filename: &'a str,
        content: &'a [u8],
    },
}

/// Opening of a `file` part: boundary and headers, without content or close.
pub fn file_part_head(filename: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: audio/wav\r\n\r\n"
    )
    .into_bytes()
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                content,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: audio/wav\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
