//! Minimal client for the daemon's REST API on the loopback admin port.

use crate::error::SupervisorError;
use serde::{Deserialize, Serialize};
use std::sync::Once;
use std::time::Duration;

pub const API_TIMEOUT: Duration = Duration::from_secs(5);

static CRYPTO_PROVIDER: Once = Once::new();

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SystemStatus {
    #[serde(rename = "myID")]
    pub my_id: String,
    /// Seconds
    pub uptime: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    pub version: String,
    pub os: String,
    pub arch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    pub id: String,
    pub label: String,
    pub path: String,
    pub paused: bool,
}

/// What `syncwarden status` shows about a live daemon.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime: Duration,
    pub folders: Vec<Folder>,
}

pub struct DaemonApi {
    base: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl DaemonApi {
    pub fn new(port: u16, api_key: &str) -> Result<Self, SupervisorError> {
        CRYPTO_PROVIDER.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });
        let client = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(api_error)?;
        let api_key = api_key.trim();
        Ok(Self {
            base: format!("http://127.0.0.1:{port}"),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base));
        if let Some(key) = &self.api_key {
            req = req.header("X-API-Key", key);
        }
        req
    }

    async fn send(&self, method: reqwest::Method, path: &str) -> Result<String, SupervisorError> {
        trace!("{method} {path}");
        let response = self.request(method, path).send().await.map_err(api_error)?;
        let status = response.status();
        let body = response.text().await.map_err(api_error)?;
        if !status.is_success() {
            return Err(SupervisorError::Api {
                message: format!("{path} returned {status}: {}", body.trim()),
            });
        }
        Ok(body)
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, SupervisorError> {
        let body = self.send(reqwest::Method::GET, path).await?;
        serde_json::from_str(&body).map_err(|e| SupervisorError::Api {
            message: format!("unexpected response from {path}: {e}"),
        })
    }

    /// Ask the daemon to rescan every folder.
    pub async fn scan(&self) -> Result<(), SupervisorError> {
        self.send(reqwest::Method::POST, "/rest/db/scan").await?;
        Ok(())
    }

    pub async fn system_status(&self) -> Result<SystemStatus, SupervisorError> {
        self.get("/rest/system/status").await
    }

    pub async fn version(&self) -> Result<Version, SupervisorError> {
        self.get("/rest/system/version").await
    }

    pub async fn folders(&self) -> Result<Vec<Folder>, SupervisorError> {
        self.get("/rest/config/folders").await
    }

    /// Unauthenticated liveness check.
    pub async fn health(&self) -> bool {
        self.send(reqwest::Method::GET, "/rest/noauth/health")
            .await
            .is_ok()
    }

    pub async fn daemon_status(&self) -> Result<DaemonStatus, SupervisorError> {
        let (status, version, folders) =
            tokio::try_join!(self.system_status(), self.version(), self.folders())?;
        Ok(DaemonStatus {
            version: version.version,
            uptime: Duration::from_secs(status.uptime),
            folders,
        })
    }
}

fn api_error(e: reqwest::Error) -> SupervisorError {
    SupervisorError::Api {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// Answers one request with `body` and hands back the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (u16, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap();
            tx.send(String::from_utf8_lossy(&buf[..n]).to_string())
                .unwrap();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
        });
        (port, rx)
    }

    #[tokio::test]
    async fn test_scan_posts_with_api_key() {
        let (port, rx) = serve_once("200 OK", "");
        let api = DaemonApi::new(port, "s3cret").unwrap();
        api.scan().await.unwrap();
        let request = rx.recv().unwrap();
        assert!(request.starts_with("POST /rest/db/scan "));
        assert!(request.to_lowercase().contains("x-api-key: s3cret"));
    }

    #[tokio::test]
    async fn test_no_api_key_header_when_unset() {
        let (port, rx) = serve_once("200 OK", "");
        DaemonApi::new(port, " ").unwrap().scan().await.unwrap();
        assert!(!rx.recv().unwrap().to_lowercase().contains("x-api-key"));
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let (port, _rx) = serve_once("403 Forbidden", "CSRF Error");
        let err = DaemonApi::new(port, "").unwrap().scan().await.unwrap_err();
        match err {
            SupervisorError::Api { message } => assert!(message.contains("403")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_parses_folders() {
        let (port, _rx) = serve_once(
            "200 OK",
            r#"[{"id":"abcd-1234","label":"Notes","path":"/home/me/notes","type":"sendreceive"}]"#,
        );
        let folders = DaemonApi::new(port, "").unwrap().folders().await.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].label, "Notes");
        assert!(!folders[0].paused);
    }

    #[tokio::test]
    async fn test_unreachable_daemon() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let api = DaemonApi::new(port, "").unwrap();
        assert!(!api.health().await);
        assert!(matches!(
            api.system_status().await,
            Err(SupervisorError::Api { .. })
        ));
    }
}
