//! HTTP/JSON gateway to a remote Task Store, built on `reqwest`.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tasksync_proto::api::{self, ErrorBody, IdentifyRequest, StoreConfig};
use tasksync_proto::message::{EditMessageRequest, Message, MessageId, SendMessageRequest, SentMessage};
use tasksync_proto::task::{CreateTaskRequest, CreatedTask, Task, TaskId, TaskListQuery, UpdateTaskRequest};
use url::Url;

use super::{GatewayError, StoreGateway};
use crate::identity::Credentials;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`StoreGateway`] over HTTP.
///
/// `base_url` is the store origin (e.g. `http://127.0.0.1:8000`); API paths
/// are resolved against it.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base: Url,
}

impl HttpGateway {
    /// Builds a gateway with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if `base_url` is not a valid URL
    /// or the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid store url {base_url}: {e}")))?;
        // The store keys the identified user name to a session cookie.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(map_reqwest)?;
        Ok(Self { client, base })
    }

    /// Base URL this gateway talks to.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        creds: &Credentials,
    ) -> Result<RequestBuilder, GatewayError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| GatewayError::Transport(format!("invalid path {path}: {e}")))?;
        Ok(self
            .client
            .request(method, url)
            .header(api::API_KEY_HEADER, &creds.api_key))
    }
}

/// Sends the request and maps non-success statuses.
async fn execute(req: RequestBuilder) -> Result<Response, GatewayError> {
    let resp = req.send().await.map_err(map_reqwest)?;
    let status = resp.status();
    match status {
        s if s.is_success() => Ok(resp),
        StatusCode::UNAUTHORIZED => Err(GatewayError::Unauthorized),
        StatusCode::NOT_FOUND => Err(GatewayError::NotFound),
        _ => {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.message.unwrap_or(body.error))
                .unwrap_or(text);
            tracing::warn!(status = status.as_u16(), %detail, "store rejected request");
            Err(GatewayError::Status {
                status: status.as_u16(),
                detail,
            })
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, GatewayError> {
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

fn map_reqwest(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_decode() {
        GatewayError::Decode(e.to_string())
    } else {
        GatewayError::Transport(e.to_string())
    }
}

impl StoreGateway for HttpGateway {
    async fn list_tasks(
        &self,
        creds: &Credentials,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, GatewayError> {
        let req = self.request(Method::GET, api::TASKS, creds)?.query(query);
        decode(execute(req).await?).await
    }

    async fn get_task(&self, creds: &Credentials, id: TaskId) -> Result<Task, GatewayError> {
        let req = self.request(Method::GET, &api::task(id), creds)?;
        decode(execute(req).await?).await
    }

    async fn create_task(
        &self,
        creds: &Credentials,
        req: &CreateTaskRequest,
    ) -> Result<CreatedTask, GatewayError> {
        let req = self.request(Method::POST, api::TASKS, creds)?.json(req);
        decode(execute(req).await?).await
    }

    async fn update_task(
        &self,
        creds: &Credentials,
        id: TaskId,
        req: &UpdateTaskRequest,
    ) -> Result<(), GatewayError> {
        let req = self.request(Method::PUT, &api::task(id), creds)?.json(req);
        execute(req).await.map(drop)
    }

    async fn delete_task(&self, creds: &Credentials, id: TaskId) -> Result<(), GatewayError> {
        let req = self.request(Method::DELETE, &api::task(id), creds)?;
        execute(req).await.map(drop)
    }

    async fn list_messages(
        &self,
        creds: &Credentials,
        task: TaskId,
    ) -> Result<Vec<Message>, GatewayError> {
        let req = self.request(Method::GET, &api::task_messages(task), creds)?;
        decode(execute(req).await?).await
    }

    async fn send_message(
        &self,
        creds: &Credentials,
        task: TaskId,
        req: &SendMessageRequest,
    ) -> Result<SentMessage, GatewayError> {
        let req = self
            .request(Method::POST, &api::task_messages(task), creds)?
            .json(req);
        decode(execute(req).await?).await
    }

    async fn edit_message(
        &self,
        creds: &Credentials,
        id: MessageId,
        req: &EditMessageRequest,
    ) -> Result<(), GatewayError> {
        let req = self.request(Method::PUT, &api::message(id), creds)?.json(req);
        execute(req).await.map(drop)
    }

    async fn delete_message(&self, creds: &Credentials, id: MessageId) -> Result<(), GatewayError> {
        let req = self.request(Method::DELETE, &api::message(id), creds)?;
        execute(req).await.map(drop)
    }

    async fn store_config(&self, creds: &Credentials) -> Result<StoreConfig, GatewayError> {
        let req = self.request(Method::GET, api::CONFIG, creds)?;
        decode(execute(req).await?).await
    }

    async fn identify(&self, creds: &Credentials) -> Result<(), GatewayError> {
        let body = IdentifyRequest {
            name: creds.user_name.clone(),
        };
        let req = self.request(Method::POST, api::IDENTIFY, creds)?.json(&body);
        execute(req).await.map(drop)
    }
}
