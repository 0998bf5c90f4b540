use crate::app_config::TrackingConfig;
use crate::errors::AppError;
use crate::tracking::types::{
    ApiMessage, CreateTrackingRequest, CreateTrackingResponse, CreateWorkstationResponse,
    UpdateTrackingRequest, WorkstationInfo,
};
use crate::tracking::TrackingService;
use log::{debug, info};
use reqwest::blocking::{multipart, Client, Response};
use reqwest::StatusCode;
use std::path::Path;
use std::time::{Duration, Instant};

/// Blocking HTTP client for the tracking server. Meant to be called from the capture thread,
/// never from inside the async runtime.
pub struct TrackingClient {
    http: Client,
    api_base: String,
    workstation_id: Option<i64>,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl TrackingClient {
    pub fn new(config: &TrackingConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AppError::Tracking(format!("Failed to build HTTP client: {}", e)))?;
        Ok(TrackingClient {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            workstation_id: config.workstation_id,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub fn create_workstation(&self, info: &WorkstationInfo) -> Result<i64, AppError> {
        let response = self
            .http
            .post(self.url("/api/workstation/create"))
            .json(info)
            .timeout(self.request_timeout)
            .send()?;
        let response = expect_status(response, StatusCode::CREATED)?;
        let body: CreateWorkstationResponse = response.json()?;
        info!("🖥️ Workstation created: {}", body.workstation_id);
        Ok(body.workstation_id)
    }

    pub fn update_workstation(&self, workstation_id: i64, info: &WorkstationInfo) -> Result<(), AppError> {
        let response = self
            .http
            .put(self.url(&format!("/api/workstation/update/{}", workstation_id)))
            .json(info)
            .timeout(self.request_timeout)
            .send()?;
        expect_success(response)?;
        info!("🖥️ Workstation updated: {}", workstation_id);
        Ok(())
    }
}

impl TrackingService for TrackingClient {
    fn create_tracking(&self, start_marker: &str) -> Result<String, AppError> {
        let body = CreateTrackingRequest {
            bar_code_1: start_marker,
            ws_id: self.workstation_id,
        };
        let response = self
            .http
            .post(self.url("/api/packaging/create"))
            .json(&body)
            .timeout(self.request_timeout)
            .send()?;
        let response = expect_status(response, StatusCode::CREATED)?;
        let created: CreateTrackingResponse = response.json()?;
        Ok(created.packaging_id.to_string())
    }

    fn update_tracking(&self, tracking_id: &str, stop_marker: &str, end_time: &str) -> Result<(), AppError> {
        let body = UpdateTrackingRequest {
            bar_code_2: stop_marker,
            end_time,
        };
        let response = self
            .http
            .put(self.url(&format!("/api/packaging/update/{}", tracking_id)))
            .json(&body)
            .timeout(self.request_timeout)
            .send()?;
        expect_success(response)?;
        Ok(())
    }

    fn upload_artifact(&self, tracking_id: &str, artifact: &Path) -> Result<(), AppError> {
        let started = Instant::now();
        let form = multipart::Form::new().file("video", artifact).map_err(|e| {
            AppError::Upload(format!("Cannot read artifact '{}': {}", artifact.display(), e))
        })?;
        let response = self
            .http
            .post(self.url(&format!("/api/packaging/upload-video/{}", tracking_id)))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .map_err(|e| AppError::Upload(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(AppError::Upload(describe_failure(response)));
        }
        debug!("Upload of '{}' took {:?}", artifact.display(), started.elapsed());
        Ok(())
    }
}

fn expect_status(response: Response, expected: StatusCode) -> Result<Response, AppError> {
    if response.status() == expected {
        Ok(response)
    } else {
        Err(AppError::Tracking(describe_failure(response)))
    }
}

fn expect_success(response: Response) -> Result<Response, AppError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(AppError::Tracking(describe_failure(response)))
    }
}

fn describe_failure(response: Response) -> String {
    let status = response.status();
    let text = response.text().unwrap_or_default();
    let detail = serde_json::from_str::<ApiMessage>(&text)
        .map(|m| m.message)
        .unwrap_or(text);
    format!("HTTP {}: {}", status, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TrackingConfig {
        TrackingConfig {
            api_base: format!("{}/", server.uri()),
            workstation_id: Some(4),
            request_timeout_secs: 1,
            upload_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_tracking_returns_issued_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/packaging/create"))
            .and(body_json(json!({"bar_code_1": "A1", "ws_id": 4})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"packaging_id": 88})))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&server);
        let id = tokio::task::spawn_blocking(move || {
            TrackingClient::new(&cfg)?.create_tracking("A1")
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(id, "88");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_tracking_rejects_non_created_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/packaging/create"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Missing required field: bar_code_1"})))
            .mount(&server)
            .await;

        let cfg = config_for(&server);
        let err = tokio::task::spawn_blocking(move || {
            TrackingClient::new(&cfg)?.create_tracking("A1")
        })
        .await
        .unwrap()
        .unwrap_err();
        assert!(matches!(err, AppError::Tracking(ref m) if m.contains("Missing required field")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_tracking_sends_stop_marker_and_end_time() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/packaging/update/88"))
            .and(body_json(json!({"bar_code_2": "B2", "end_time": "2026-10-16T10:00:00"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&server);
        tokio::task::spawn_blocking(move || {
            TrackingClient::new(&cfg)?.update_tracking("88", "B2", "2026-10-16T10:00:00")
        })
        .await
        .unwrap()
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_server_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/packaging/create"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"packaging_id": 1}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let cfg = config_for(&server);
        let result = tokio::task::spawn_blocking(move || {
            TrackingClient::new(&cfg)?.create_tracking("A1")
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(AppError::Tracking(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_succeeds_only_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/packaging/upload-video/88"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/packaging/upload-video/99"))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("A1_to_B2_20261016_100000.mp4");
        std::fs::write(&artifact, b"fake video").unwrap();

        let cfg = config_for(&server);
        let (ok, failed) = tokio::task::spawn_blocking(move || {
            let client = TrackingClient::new(&cfg).unwrap();
            (
                client.upload_artifact("88", &artifact),
                client.upload_artifact("99", &artifact),
            )
        })
        .await
        .unwrap();
        assert!(ok.is_ok());
        assert!(matches!(failed, Err(AppError::Upload(ref m)) if m.contains("storage offline")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_of_missing_file_fails_locally() {
        let server = MockServer::start().await;
        let cfg = config_for(&server);
        let result = tokio::task::spawn_blocking(move || {
            TrackingClient::new(&cfg)?.upload_artifact("1", Path::new("/definitely/not/here.mp4"))
        })
        .await
        .unwrap();
        assert!(matches!(result, Err(AppError::Upload(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn workstation_registration_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workstation/create"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"workstation_id": 12})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/workstation/update/12"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = config_for(&server);
        let info = WorkstationInfo {
            workstation_name: "Line-A".into(),
            system_ip: "10.0.0.9".into(),
            rtsp_url: "0".into(),
            frame_rate: 30,
            pre_buffer_duration: 5,
            post_buffer_duration: 5,
            video_quality: "High".into(),
            video_save_path: "Videos".into(),
            api_base: cfg.api_base.clone(),
        };
        let id = tokio::task::spawn_blocking(move || {
            let client = TrackingClient::new(&cfg)?;
            let id = client.create_workstation(&info)?;
            client.update_workstation(id, &info)?;
            Ok::<_, AppError>(id)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(id, 12);
    }
}
