//! Typed HTTP client for the `/api/v1` endpoints.

use async_trait::async_trait;
use cirrus_core::task::{TaskHandle, TaskStatusReport};
use cirrus_core::types::DbId;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::poll::StatusSource;

/// `{ "data": T }` envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// `{ "error": ..., "code": ... }` envelope.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// A target the server skipped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Warning {
    pub target_id: DbId,
    pub message: String,
}

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Receipt {
    pub task_handle: Option<TaskHandle>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
struct FormBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ems_id: Option<&'a str>,
    button: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteBody<'a> {
    ids: &'a [DbId],
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api/v1{path}", self.base_url))
            .bearer_auth(&self.token)
    }

    /// Submit the create form. `ems_id` is `"<ems>"` or `"<ems>:<parent tenant>"`.
    pub async fn create_tenant(&self, name: &str, ems_id: &str) -> Result<Receipt, ClientError> {
        let body = FormBody {
            name: Some(name),
            ems_id: Some(ems_id),
            button: "add",
        };
        let response = self.request(Method::POST, "/tenants").json(&body).send().await?;
        decode(response).await
    }

    /// Submit the edit form with only the fields to change.
    pub async fn update_tenant(
        &self,
        id: DbId,
        name: Option<&str>,
        ems_id: Option<&str>,
    ) -> Result<Receipt, ClientError> {
        let body = FormBody {
            name,
            ems_id,
            button: "save",
        };
        let response = self
            .request(Method::PUT, &format!("/tenants/{id}"))
            .json(&body)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn delete_tenants(&self, ids: &[DbId]) -> Result<Receipt, ClientError> {
        let response = self
            .request(Method::POST, "/tenants/delete")
            .json(&DeleteBody { ids })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn task_status(&self, handle: &TaskHandle) -> Result<TaskStatusReport, ClientError> {
        let response = self
            .request(Method::GET, &format!("/tasks/{handle}"))
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatusReport, ClientError> {
        self.task_status(handle).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status.is_success() {
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        return Ok(envelope.data);
    }

    match serde_json::from_slice::<ErrorBody>(&bytes) {
        Ok(body) => Err(ClientError::Api {
            status: status.as_u16(),
            code: body.code,
            message: body.error,
        }),
        Err(_) => Err(ClientError::Api {
            status: status.as_u16(),
            code: "HTTP_ERROR".into(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
        }),
    }
}
