use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize)]
pub struct CreateTrackingRequest<'a> {
    pub bar_code_1: &'a str,
    pub ws_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UpdateTrackingRequest<'a> {
    pub bar_code_2: &'a str,
    pub end_time: &'a str,
}

/// Ids come back either as JSON numbers or strings depending on the server build.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTrackingResponse {
    pub packaging_id: RemoteId,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct WorkstationInfo {
    pub workstation_name: String,
    pub system_ip: String,
    pub rtsp_url: String,
    pub frame_rate: u32,
    pub pre_buffer_duration: u32,
    pub post_buffer_duration: u32,
    pub video_quality: String,
    pub video_save_path: String,
    pub api_base: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkstationResponse {
    pub workstation_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_from_numbers_and_strings() {
        let numeric: CreateTrackingResponse = serde_json::from_str(r#"{"packaging_id": 41}"#).unwrap();
        assert_eq!(numeric.packaging_id.to_string(), "41");
        let text: CreateTrackingResponse = serde_json::from_str(r#"{"packaging_id": "pkg-9"}"#).unwrap();
        assert_eq!(text.packaging_id.to_string(), "pkg-9");
    }

    #[test]
    fn create_request_shape() {
        let body = serde_json::to_value(CreateTrackingRequest { bar_code_1: "A1", ws_id: Some(3) }).unwrap();
        assert_eq!(body, serde_json::json!({"bar_code_1": "A1", "ws_id": 3}));
    }
}
