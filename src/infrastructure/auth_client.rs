use crate::domain::models::Credentials;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::failure::Unauthorized;
use crate::infrastructure::http::{endpoint_url, network_error, parse_json, read_body};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEndpoint {
    Session,
    Login,
    Logout,
    Signup,
    Confirm,
    ForgotPassword,
    ResetPassword,
}

impl AuthEndpoint {
    pub fn segments(self) -> [&'static str; 2] {
        let leaf = match self {
            Self::Session => "session",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Signup => "signup",
            Self::Confirm => "confirm",
            Self::ForgotPassword => "forgot-password",
            Self::ResetPassword => "reset-password",
        };
        ["auth", leaf]
    }

    pub fn failure_label(self) -> &'static str {
        match self {
            Self::Session => "Session check failed",
            Self::Login => "Login failed",
            Self::Logout => "Logout failed",
            Self::Signup => "Signup failed",
            Self::Confirm => "Confirmation failed",
            Self::ForgotPassword => "Failed to send reset code",
            Self::ResetPassword => "Password reset failed",
        }
    }

    fn on_unauthorized(self) -> Unauthorized {
        match self {
            Self::Session => Unauthorized::SessionExpired,
            Self::Login => Unauthorized::BadCredentials,
            _ => Unauthorized::Rejected,
        }
    }
}

/// Success payload of the auth endpoints: a message plus whatever user
/// fields the backend chose to include.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmSignupRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn session(&self) -> Result<AuthResponse, InfraError>;

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, InfraError>;

    async fn logout(&self) -> Result<(), InfraError>;

    async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, InfraError>;

    async fn confirm_signup(
        &self,
        request: &ConfirmSignupRequest,
    ) -> Result<AuthResponse, InfraError>;

    async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<AuthResponse, InfraError>;

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<AuthResponse, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAuthClient {
    client: Client,
    base_url: Url,
}

impl ReqwestAuthClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: AuthEndpoint,
        body: &B,
    ) -> Result<String, InfraError> {
        let url = endpoint_url(&self.base_url, &endpoint.segments())?;
        let action = format!("calling {}", url.path());
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| network_error(&action, error))?;

        read_body(
            response,
            &action,
            endpoint.on_unauthorized(),
            endpoint.failure_label(),
        )
        .await
    }

    async fn post_for_response<B: Serialize + Sync>(
        &self,
        endpoint: AuthEndpoint,
        body: &B,
    ) -> Result<AuthResponse, InfraError> {
        let body = self.post(endpoint, body).await?;
        parse_auth_response(&body, endpoint)
    }
}

fn parse_auth_response(body: &str, endpoint: AuthEndpoint) -> Result<AuthResponse, InfraError> {
    if body.trim().is_empty() {
        return Ok(AuthResponse::default());
    }
    parse_json(body, &format!("reading /{} response", endpoint.segments().join("/")))
}

#[async_trait]
impl AuthApi for ReqwestAuthClient {
    async fn session(&self) -> Result<AuthResponse, InfraError> {
        let endpoint = AuthEndpoint::Session;
        let url = endpoint_url(&self.base_url, &endpoint.segments())?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| network_error("checking session", error))?;

        let body = read_body(
            response,
            "checking session",
            endpoint.on_unauthorized(),
            endpoint.failure_label(),
        )
        .await?;
        parse_auth_response(&body, endpoint)
    }

    async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, InfraError> {
        self.post_for_response(AuthEndpoint::Login, credentials).await
    }

    async fn logout(&self) -> Result<(), InfraError> {
        self.post(AuthEndpoint::Logout, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn signup(&self, credentials: &Credentials) -> Result<AuthResponse, InfraError> {
        self.post_for_response(AuthEndpoint::Signup, credentials).await
    }

    async fn confirm_signup(
        &self,
        request: &ConfirmSignupRequest,
    ) -> Result<AuthResponse, InfraError> {
        self.post_for_response(AuthEndpoint::Confirm, request).await
    }

    async fn forgot_password(
        &self,
        request: &ForgotPasswordRequest,
    ) -> Result<AuthResponse, InfraError> {
        self.post_for_response(AuthEndpoint::ForgotPassword, request)
            .await
    }

    async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<AuthResponse, InfraError> {
        self.post_for_response(AuthEndpoint::ResetPassword, request)
            .await
    }
}
