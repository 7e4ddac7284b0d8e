//! Authenticated HTTP client for the HealthLink REST API.
//!
//! Covers the endpoints the chat subsystem needs: auth (login, register,
//! OTP), room listing, message history, and the out-of-band attachment
//! upload. A 401 anywhere maps to [`ClientError::Unauthorized`]; `success:
//! false` bodies map to [`ClientError::Api`].

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::upload::mime_for;
use healthlink_protocol::rest::{
    AuthResponse, HistoryResponse, LoginRequest, RegisterRequest, ResendOtpRequest,
    RoomsResponse, UploadResponse, VerifyOtpRequest,
};
use healthlink_protocol::{ChatMessage, RoomId, RoomSummary, UserId, UserProfile};
use reqwest::multipart;
use reqwest::StatusCode;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: config.api_base(),
            token: None,
        }
    }

    /// Resume with a persisted token instead of logging in again.
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        Ok(resp)
    }

    /// `POST /auth/login`. On success the token is retained for later
    /// calls and returned with the profile.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(String, UserProfile)> {
        let resp = self
            .http
            .post(format!("{}/auth/login", self.base))
            .json(&LoginRequest {
                email: email.to_owned(),
                password: password.to_owned(),
            })
            .send()
            .await?;
        let body: AuthResponse = Self::check_status(resp)?.json().await?;
        self.accept_auth(body, "login failed")
    }

    /// `POST /auth/register`. Returns the backend's message ("OTP sent").
    pub async fn register(&self, request: &RegisterRequest) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/auth/register", self.base))
            .json(request)
            .send()
            .await?;
        let body: AuthResponse = Self::check_status(resp)?.json().await?;
        if body.success {
            Ok(body.message.unwrap_or_default())
        } else {
            Err(ClientError::Api(
                body.message.unwrap_or_else(|| "registration failed".into()),
            ))
        }
    }

    /// `POST /auth/verify-otp`. Completes registration and logs in.
    pub async fn verify_otp(
        &mut self,
        request: &VerifyOtpRequest,
    ) -> Result<(String, UserProfile)> {
        let resp = self
            .http
            .post(format!("{}/auth/verify-otp", self.base))
            .json(request)
            .send()
            .await?;
        let body: AuthResponse = Self::check_status(resp)?.json().await?;
        self.accept_auth(body, "OTP verification failed")
    }

    /// `POST /auth/resend-otp`.
    pub async fn resend_otp(&self, request: &ResendOtpRequest) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/auth/resend-otp", self.base))
            .json(request)
            .send()
            .await?;
        let body: AuthResponse = Self::check_status(resp)?.json().await?;
        if body.success {
            Ok(body.message.unwrap_or_default())
        } else {
            Err(ClientError::Api(
                body.message.unwrap_or_else(|| "resend failed".into()),
            ))
        }
    }

    fn accept_auth(
        &mut self,
        body: AuthResponse,
        fallback: &str,
    ) -> Result<(String, UserProfile)> {
        match (body.success, body.token, body.user) {
            (true, Some(token), Some(user)) => {
                self.token = Some(token.clone());
                Ok((token, user))
            }
            _ => Err(ClientError::Api(
                body.message.unwrap_or_else(|| fallback.into()),
            )),
        }
    }

    /// `GET /chat/:roomId`, returned ascending by `created_at`.
    pub async fn history(&self, room: &RoomId) -> Result<Vec<ChatMessage>> {
        let resp = self
            .authed(self.http.get(format!("{}/chat/{room}", self.base)))
            .send()
            .await?;
        let body: HistoryResponse = Self::check_status(resp)?.json().await?;
        if !body.success {
            return Err(ClientError::Api(
                body.message.unwrap_or_else(|| "history fetch failed".into()),
            ));
        }
        let mut messages = body.messages;
        // Backend order is ascending already; sorting stably here costs
        // nothing and keeps the store's invariant independent of it.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    /// `GET /chat/rooms?doctorId=`.
    pub async fn rooms_for_doctor(&self, doctor: &UserId) -> Result<Vec<RoomSummary>> {
        self.rooms(&[("doctorId", doctor.as_str())]).await
    }

    /// `GET /chat/rooms?patientId=`. Best-effort on the backend side; the
    /// caller decides whether a failure matters.
    pub async fn rooms_for_patient(&self, patient: &UserId) -> Result<Vec<RoomSummary>> {
        self.rooms(&[("patientId", patient.as_str())]).await
    }

    async fn rooms(&self, query: &[(&str, &str)]) -> Result<Vec<RoomSummary>> {
        let resp = self
            .authed(self.http.get(format!("{}/chat/rooms", self.base)).query(query))
            .send()
            .await?;
        let body: RoomsResponse = Self::check_status(resp)?.json().await?;
        if !body.success {
            return Err(ClientError::Api(
                body.message.unwrap_or_else(|| "room listing failed".into()),
            ));
        }
        Ok(body.rooms)
    }

    /// Multipart `POST /upload`. Returns the server-assigned URL.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str(mime_for(file_name))?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .authed(self.http.post(format!("{}/upload", self.base)))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = Self::check_status(resp)?.json().await?;
        match (body.success, body.file_url) {
            (true, Some(url)) if !url.is_empty() => Ok(url),
            _ => Err(ClientError::Upload(
                body.message.unwrap_or_else(|| "no file URL returned".into()),
            )),
        }
    }
}
