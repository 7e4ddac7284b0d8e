//! REST request/response payloads for the HealthLink backend.

use crate::{ChatMessage, Role, RoomSummary, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResendOtpRequest {
    pub email: String,
    pub role: Role,
}

/// Returned by `/auth/login` and `/auth/verify-otp`. `token` and `user`
/// are present only on success.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Returned by `GET /chat/:roomId`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Returned by `GET /chat/rooms?doctorId=|patientId=`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomsResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub rooms: Vec<RoomSummary>,
}

/// Returned by multipart `POST /upload`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_response_without_token_decodes() {
        let raw = r#"{ "success": false, "message": "Invalid credentials" }"#;
        let resp: AuthResponse = serde_json::from_str(raw).unwrap();

        assert!(!resp.success);
        assert!(resp.token.is_none());
        assert!(resp.user.is_none());
    }

    #[test]
    fn rooms_response_decodes_listing() {
        let raw = r#"{
            "success": true,
            "rooms": [{
                "roomId": "d1_p1",
                "doctorId": "d1",
                "doctorName": "Dr. Rao",
                "patientId": "p1",
                "patientName": "Asha"
            }]
        }"#;

        let resp: RoomsResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.success);
        assert_eq!(resp.rooms.len(), 1);
        assert_eq!(resp.rooms[0].doctor_name, "Dr. Rao");
    }

    #[test]
    fn upload_response_carries_file_url() {
        let raw = r#"{ "success": true, "fileUrl": "/uploads/scan.pdf" }"#;
        let resp: UploadResponse = serde_json::from_str(raw).unwrap();

        assert_eq!(resp.file_url.as_deref(), Some("/uploads/scan.pdf"));
    }
}
