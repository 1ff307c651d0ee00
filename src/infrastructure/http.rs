use crate::infrastructure::config::ClientConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::failure::{Unauthorized, classify_failure, parse_retry_after_header};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

/// One client per process: the cookie jar carries the backend's session
/// cookies, so auth and resource calls must share it.
pub fn build_http_client(config: &ClientConfig) -> Result<Client, InfraError> {
    Client::builder()
        .cookie_store(true)
        .timeout(config.request_timeout)
        .build()
        .map_err(|error| InfraError::InvalidConfig(format!("failed to build http client: {error}")))
}

/// Appends path segments to the base URL. An empty trailing segment yields
/// a trailing slash (`/tasks/`), which the backend's collection routes use.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, InfraError> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            InfraError::InvalidConfig(format!("api base url cannot be a base: {base}"))
        })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

pub fn network_error(action: &str, error: reqwest::Error) -> InfraError {
    if error.is_timeout() {
        InfraError::Network(format!("timed out while {action}"))
    } else {
        InfraError::Network(format!("network error while {action}: {error}"))
    }
}

/// Reads the body and returns it for 2xx, otherwise the classified failure.
pub async fn read_body(
    response: Response,
    action: &str,
    on_unauthorized: Unauthorized,
    fallback_detail: &str,
) -> Result<String, InfraError> {
    let status = response.status();
    let retry_after = parse_retry_after_header(
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok()),
    );
    let body = response
        .text()
        .await
        .map_err(|error| network_error(&format!("reading response of {action}"), error))?;

    if !status.is_success() {
        return Err(classify_failure(
            on_unauthorized,
            fallback_detail,
            status.as_u16(),
            &body,
            retry_after,
        ));
    }
    Ok(body)
}

pub fn parse_json<T: DeserializeOwned>(body: &str, action: &str) -> Result<T, InfraError> {
    serde_json::from_str(body).map_err(|error| InfraError::Server {
        status: 200,
        detail: format!("invalid payload while {action}: {error}; body={body}"),
    })
}
