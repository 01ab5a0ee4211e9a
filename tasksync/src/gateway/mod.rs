//! Remote store gateway: the request/response boundary to the Task Store.
//!
//! Defines the [`StoreGateway`] trait the sync engine talks to.
//! Implementations:
//! - [`http::HttpGateway`] speaks the HTTP/JSON contract with `reqwest`
//! - [`memory::MemoryGateway`] keeps everything in process and can be
//!   scripted to fail or hang, for tests and offline demo mode

pub mod http;
pub mod memory;

use std::future::Future;

use tasksync_proto::api::StoreConfig;
use tasksync_proto::message::{EditMessageRequest, Message, MessageId, SendMessageRequest, SentMessage};
use tasksync_proto::task::{CreateTaskRequest, CreatedTask, Task, TaskId, TaskListQuery, UpdateTaskRequest};

use crate::identity::Credentials;

/// Errors surfaced by gateway calls.
///
/// [`GatewayError::Unauthorized`] is kept distinct from every other failure
/// because it triggers identity teardown instead of local handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The access credential was missing or rejected (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// No identity is available to authenticate the call.
    #[error("not signed in")]
    MissingCredentials,

    /// The addressed task or message does not exist (HTTP 404).
    #[error("not found")]
    NotFound,

    /// The store answered with another non-success status.
    #[error("store returned status {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error detail from the body, if any.
        detail: String,
    },

    /// The call did not complete within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether this failure must tear down the identity.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::MissingCredentials)
    }
}

/// Async gateway to the Task Store.
///
/// Every call carries the caller's [`Credentials`]; the gateway itself is
/// stateless with respect to identity. Calls may take arbitrarily long and
/// the engine never awaits them inline: they run on spawned tasks and
/// report back through the engine's event channel.
pub trait StoreGateway: Send + Sync {
    /// `GET /api/tasks?status=..[&search=..]`.
    fn list_tasks(
        &self,
        creds: &Credentials,
        query: &TaskListQuery,
    ) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    /// `GET /api/tasks/{id}`.
    fn get_task(
        &self,
        creds: &Credentials,
        id: TaskId,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// `POST /api/tasks`.
    fn create_task(
        &self,
        creds: &Credentials,
        req: &CreateTaskRequest,
    ) -> impl Future<Output = Result<CreatedTask, GatewayError>> + Send;

    /// `PUT /api/tasks/{id}` with any subset of title, description, status.
    fn update_task(
        &self,
        creds: &Credentials,
        id: TaskId,
        req: &UpdateTaskRequest,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// `DELETE /api/tasks/{id}`.
    fn delete_task(
        &self,
        creds: &Credentials,
        id: TaskId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// `GET /api/tasks/{id}/messages`, oldest first.
    fn list_messages(
        &self,
        creds: &Credentials,
        task: TaskId,
    ) -> impl Future<Output = Result<Vec<Message>, GatewayError>> + Send;

    /// `POST /api/tasks/{id}/messages`.
    fn send_message(
        &self,
        creds: &Credentials,
        task: TaskId,
        req: &SendMessageRequest,
    ) -> impl Future<Output = Result<SentMessage, GatewayError>> + Send;

    /// `PUT /api/messages/{id}`.
    fn edit_message(
        &self,
        creds: &Credentials,
        id: MessageId,
        req: &EditMessageRequest,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// `DELETE /api/messages/{id}`.
    fn delete_message(
        &self,
        creds: &Credentials,
        id: MessageId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// `GET /api/config`.
    fn store_config(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = Result<StoreConfig, GatewayError>> + Send;

    /// `POST /api/identify` with the credential's user name.
    fn identify(
        &self,
        creds: &Credentials,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
