//! In-process gateway for tests and offline demo mode.
//!
//! [`MemoryGateway`] mirrors the Task Store semantics (status partitions,
//! search over titles, descriptions and message content, cascade delete)
//! and adds scripting hooks:
//! - [`fail_next`](MemoryGateway::fail_next) queues an error for the next
//!   call of an [`Op`]
//! - [`hold`](MemoryGateway::hold) parks every call of an [`Op`] until
//!   [`release`](MemoryGateway::release), simulating a call that never
//!   settles
//! - [`calls`](MemoryGateway::calls) returns the log of received calls

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tasksync_proto::api::StoreConfig;
use tasksync_proto::message::{EditMessageRequest, Message, MessageId, SendMessageRequest, SentMessage};
use tasksync_proto::task::{
    CreateTaskRequest, CreatedTask, Task, TaskId, TaskListQuery, TaskStatus, UpdateTaskRequest,
    matches_search,
};
use tokio::sync::watch;

use super::{GatewayError, StoreGateway};
use crate::identity::Credentials;

/// Gateway operation kind, used to script failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `list_tasks`
    ListTasks,
    /// `get_task`
    GetTask,
    /// `create_task`
    CreateTask,
    /// `update_task`
    UpdateTask,
    /// `delete_task`
    DeleteTask,
    /// `list_messages`
    ListMessages,
    /// `send_message`
    SendMessage,
    /// `edit_message`
    EditMessage,
    /// `delete_message`
    DeleteMessage,
    /// `store_config`
    StoreConfig,
    /// `identify`
    Identify,
}

/// A call as received by the gateway, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list_tasks(query)`
    ListTasks(TaskListQuery),
    /// `get_task(id)`
    GetTask(TaskId),
    /// `create_task(req)`
    CreateTask(CreateTaskRequest),
    /// `update_task(id, req)`
    UpdateTask(TaskId, UpdateTaskRequest),
    /// `delete_task(id)`
    DeleteTask(TaskId),
    /// `list_messages(task)`
    ListMessages(TaskId),
    /// `send_message(task, req)`
    SendMessage(TaskId, SendMessageRequest),
    /// `edit_message(id, req)`
    EditMessage(MessageId, EditMessageRequest),
    /// `delete_message(id)`
    DeleteMessage(MessageId),
    /// `store_config()`
    StoreConfig,
    /// `identify()` with the credential's user name.
    Identify(String),
}

impl Call {
    /// Operation kind of this call.
    #[must_use]
    pub const fn op(&self) -> Op {
        match self {
            Self::ListTasks(_) => Op::ListTasks,
            Self::GetTask(_) => Op::GetTask,
            Self::CreateTask(_) => Op::CreateTask,
            Self::UpdateTask(..) => Op::UpdateTask,
            Self::DeleteTask(_) => Op::DeleteTask,
            Self::ListMessages(_) => Op::ListMessages,
            Self::SendMessage(..) => Op::SendMessage,
            Self::EditMessage(..) => Op::EditMessage,
            Self::DeleteMessage(_) => Op::DeleteMessage,
            Self::StoreConfig => Op::StoreConfig,
            Self::Identify(_) => Op::Identify,
        }
    }
}

struct State {
    api_key: String,
    ai_available: bool,
    tasks: Vec<Task>,
    messages: Vec<Message>,
    next_task_id: i64,
    next_message_id: i64,
    clock: DateTime<Utc>,
    failures: HashMap<Op, VecDeque<GatewayError>>,
    calls: Vec<Call>,
}

impl State {
    /// Logical clock: every insert is one minute after the previous one so
    /// ordering by creation time is deterministic.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += Duration::minutes(1);
        self.clock
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, GatewayError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(GatewayError::NotFound)
    }
}

/// In-memory, scriptable [`StoreGateway`].
pub struct MemoryGateway {
    state: Mutex<State>,
    held: watch::Sender<HashSet<Op>>,
}

impl MemoryGateway {
    /// Creates an empty store accepting `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let epoch = Utc
            .with_ymd_and_hms(2024, 1, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        let (held, _) = watch::channel(HashSet::new());
        Self {
            state: Mutex::new(State {
                api_key: api_key.into(),
                ai_available: true,
                tasks: Vec::new(),
                messages: Vec::new(),
                next_task_id: 1,
                next_message_id: 1,
                clock: epoch,
                failures: HashMap::new(),
                calls: Vec::new(),
            }),
            held,
        }
    }

    /// A small pre-populated store for offline demo mode.
    #[must_use]
    pub fn demo(api_key: impl Into<String>) -> Self {
        let gw = Self::new(api_key);
        let login = gw.seed_task("Fix bug", "Login fails on Safari after the redirect");
        gw.seed_message(login, "alice", "Reproduced on Safari 17, Chrome is fine.");
        gw.seed_message(login, "bob", "Looks like the session cookie is dropped.");
        let docs = gw.seed_task("Write release notes", "");
        gw.seed_message(docs, "alice", "Draft is in the wiki.");
        let done = gw.seed_task("Rotate staging keys", "Quarterly rotation");
        let _ = gw.set_status(done, TaskStatus::Completed);
        gw
    }

    /// Inserts an open task directly, bypassing the call log.
    pub fn seed_task(&self, title: &str, description: &str) -> TaskId {
        let mut st = self.state.lock();
        let id = TaskId::new(st.next_task_id);
        st.next_task_id += 1;
        let created_at = st.tick();
        st.tasks.push(Task {
            id,
            title: title.to_string(),
            description: description.to_string(),
            status: TaskStatus::Open,
            created_by: "seed".to_string(),
            created_at,
            completed_at: None,
        });
        id
    }

    /// Inserts a message directly, bypassing the call log.
    pub fn seed_message(&self, task_id: TaskId, author: &str, content: &str) -> MessageId {
        let mut st = self.state.lock();
        let id = MessageId::new(st.next_message_id);
        st.next_message_id += 1;
        let created_at = st.tick();
        st.messages.push(Message {
            id,
            task_id,
            user_name: author.to_string(),
            content: content.to_string(),
            is_edited: false,
            created_at,
        });
        id
    }

    /// Sets a task's status directly, keeping the completion invariant.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] for an unknown task.
    pub fn set_status(&self, id: TaskId, status: TaskStatus) -> Result<(), GatewayError> {
        let mut st = self.state.lock();
        let now = st.tick();
        apply_status(st.task_mut(id)?, status, now);
        Ok(())
    }

    /// Current stored copy of a task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.state.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Current stored messages of a task, oldest first.
    #[must_use]
    pub fn messages(&self, task_id: TaskId) -> Vec<Message> {
        let st = self.state.lock();
        sorted_messages(&st.messages, task_id)
    }

    /// Queues `err` as the result of the next call of `op`.
    pub fn fail_next(&self, op: Op, err: GatewayError) {
        self.state.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Parks every call of `op` until [`release`](Self::release).
    pub fn hold(&self, op: Op) {
        self.held.send_modify(|held| {
            held.insert(op);
        });
    }

    /// Lets parked and future calls of `op` proceed.
    pub fn release(&self, op: Op) {
        self.held.send_modify(|held| {
            held.remove(&op);
        });
    }

    /// Replaces the accepted access key; calls with the old one get 401.
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        self.state.lock().api_key = api_key.into();
    }

    /// Sets the `ai_available` flag reported by `store_config`.
    pub fn set_ai_available(&self, available: bool) {
        self.state.lock().ai_available = available;
    }

    /// Snapshot of every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Calls of one kind received so far.
    #[must_use]
    pub fn calls_of(&self, op: Op) -> Vec<Call> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Forgets the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Logs the call, waits out any hold, then applies auth and scripted
    /// failures.
    async fn enter(&self, call: Call, creds: &Credentials) -> Result<(), GatewayError> {
        let op = call.op();
        self.state.lock().calls.push(call);

        let mut held = self.held.subscribe();
        let released = held.wait_for(|held| !held.contains(&op)).await.is_ok();
        if !released {
            return Err(GatewayError::Transport("gateway dropped".to_string()));
        }

        let mut st = self.state.lock();
        if creds.api_key != st.api_key {
            return Err(GatewayError::Unauthorized);
        }
        if let Some(err) = st.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            tracing::debug!(?op, %err, "scripted failure");
            return Err(err);
        }
        Ok(())
    }
}

fn apply_status(task: &mut Task, status: TaskStatus, now: DateTime<Utc>) {
    task.status = status;
    task.completed_at = match status {
        TaskStatus::Completed => Some(now),
        TaskStatus::Open => None,
    };
}

fn sorted_messages(messages: &[Message], task_id: TaskId) -> Vec<Message> {
    let mut out: Vec<Message> = messages
        .iter()
        .filter(|m| m.task_id == task_id)
        .cloned()
        .collect();
    out.sort_by_key(|m| (m.created_at, m.id));
    out
}

impl StoreGateway for MemoryGateway {
    async fn list_tasks(
        &self,
        creds: &Credentials,
        query: &TaskListQuery,
    ) -> Result<Vec<Task>, GatewayError> {
        self.enter(Call::ListTasks(query.clone()), creds).await?;
        let st = self.state.lock();
        let needle = query.search.as_deref().unwrap_or_default();
        let mut out: Vec<Task> = st
            .tasks
            .iter()
            .filter(|t| t.status == query.status)
            .filter(|t| {
                let contents = st
                    .messages
                    .iter()
                    .filter(|m| m.task_id == t.id)
                    .map(|m| m.content.as_str());
                matches_search(t, contents, needle)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn get_task(&self, creds: &Credentials, id: TaskId) -> Result<Task, GatewayError> {
        self.enter(Call::GetTask(id), creds).await?;
        let st = self.state.lock();
        st.tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn create_task(
        &self,
        creds: &Credentials,
        req: &CreateTaskRequest,
    ) -> Result<CreatedTask, GatewayError> {
        self.enter(Call::CreateTask(req.clone()), creds).await?;
        let mut st = self.state.lock();
        let id = TaskId::new(st.next_task_id);
        st.next_task_id += 1;
        let created_at = st.tick();
        st.tasks.push(Task {
            id,
            title: req.title.clone(),
            description: req.description.clone(),
            status: TaskStatus::Open,
            created_by: creds.user_name.clone(),
            created_at,
            completed_at: None,
        });
        Ok(CreatedTask {
            id,
            title: req.title.clone(),
            description: req.description.clone(),
        })
    }

    async fn update_task(
        &self,
        creds: &Credentials,
        id: TaskId,
        req: &UpdateTaskRequest,
    ) -> Result<(), GatewayError> {
        self.enter(Call::UpdateTask(id, req.clone()), creds).await?;
        let mut st = self.state.lock();
        let now = st.tick();
        let task = st.task_mut(id)?;
        if let Some(title) = &req.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &req.description {
            task.description.clone_from(description);
        }
        if let Some(status) = req.status {
            apply_status(task, status, now);
        }
        Ok(())
    }

    async fn delete_task(&self, creds: &Credentials, id: TaskId) -> Result<(), GatewayError> {
        self.enter(Call::DeleteTask(id), creds).await?;
        let mut st = self.state.lock();
        let before = st.tasks.len();
        st.tasks.retain(|t| t.id != id);
        if st.tasks.len() == before {
            return Err(GatewayError::NotFound);
        }
        st.messages.retain(|m| m.task_id != id);
        Ok(())
    }

    async fn list_messages(
        &self,
        creds: &Credentials,
        task: TaskId,
    ) -> Result<Vec<Message>, GatewayError> {
        self.enter(Call::ListMessages(task), creds).await?;
        let st = self.state.lock();
        Ok(sorted_messages(&st.messages, task))
    }

    async fn send_message(
        &self,
        creds: &Credentials,
        task: TaskId,
        req: &SendMessageRequest,
    ) -> Result<SentMessage, GatewayError> {
        self.enter(Call::SendMessage(task, req.clone()), creds).await?;
        let mut st = self.state.lock();
        if !st.tasks.iter().any(|t| t.id == task) {
            return Err(GatewayError::NotFound);
        }
        let id = MessageId::new(st.next_message_id);
        st.next_message_id += 1;
        let created_at = st.tick();
        st.messages.push(Message {
            id,
            task_id: task,
            user_name: creds.user_name.clone(),
            content: req.content.clone(),
            is_edited: false,
            created_at,
        });
        Ok(SentMessage {
            id,
            content: req.content.clone(),
            original_content: req.content.clone(),
        })
    }

    async fn edit_message(
        &self,
        creds: &Credentials,
        id: MessageId,
        req: &EditMessageRequest,
    ) -> Result<(), GatewayError> {
        self.enter(Call::EditMessage(id, req.clone()), creds).await?;
        let mut st = self.state.lock();
        let msg = st
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(GatewayError::NotFound)?;
        msg.content.clone_from(&req.content);
        msg.is_edited = true;
        Ok(())
    }

    async fn delete_message(&self, creds: &Credentials, id: MessageId) -> Result<(), GatewayError> {
        self.enter(Call::DeleteMessage(id), creds).await?;
        let mut st = self.state.lock();
        let before = st.messages.len();
        st.messages.retain(|m| m.id != id);
        if st.messages.len() == before {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }

    async fn store_config(&self, creds: &Credentials) -> Result<StoreConfig, GatewayError> {
        self.enter(Call::StoreConfig, creds).await?;
        Ok(StoreConfig {
            ai_available: self.state.lock().ai_available,
        })
    }

    async fn identify(&self, creds: &Credentials) -> Result<(), GatewayError> {
        self.enter(Call::Identify(creds.user_name.clone()), creds).await
    }
}
