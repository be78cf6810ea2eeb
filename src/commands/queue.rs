/*!
 * Command scheduling with undo and redo history.
 *
 * The queue owns a single worker task that takes commands in submission
 * order. Blocking commands run alone: the worker waits for running commands
 * to drain, then runs the blocking command on its own task and waits for it.
 * Non-blocking commands are spawned onto a `JoinSet`, at most `max_workers`
 * at a time. A command that panics is reported as failed.
 *
 * Undo and redo requests travel through the same channel and are served in
 * order with commands, once nothing else is running.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio::time::timeout;
use uuid::Uuid;

use crate::app_config::QueueConfig;
use crate::errors::{CommandError, QueueError, UndoError};
use crate::model_update::ModelUpdate;

use super::{AbortHandle, Command, CommandContext};

/// Notifications sent by the queue as commands progress
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Started {
        id: Uuid,
        name: &'static str,
    },
    Completed {
        id: Uuid,
        name: &'static str,
        updates: Vec<ModelUpdate>,
    },
    /// Execution failed or was aborted. Updates made before the failure are
    /// still reported.
    Failed {
        id: Uuid,
        name: &'static str,
        error: CommandError,
        updates: Vec<ModelUpdate>,
    },
    Undone {
        id: Uuid,
        name: &'static str,
        updates: Vec<ModelUpdate>,
    },
    Redone {
        id: Uuid,
        name: &'static str,
        updates: Vec<ModelUpdate>,
    },
}

impl QueueEvent {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Started { id, .. }
            | Self::Completed { id, .. }
            | Self::Failed { id, .. }
            | Self::Undone { id, .. }
            | Self::Redone { id, .. } => *id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { name, .. }
            | Self::Completed { name, .. }
            | Self::Failed { name, .. }
            | Self::Undone { name, .. }
            | Self::Redone { name, .. } => name,
        }
    }

    /// Model updates carried by the event
    pub fn updates(&self) -> &[ModelUpdate] {
        match self {
            Self::Started { .. } => &[],
            Self::Completed { updates, .. }
            | Self::Failed { updates, .. }
            | Self::Undone { updates, .. }
            | Self::Redone { updates, .. } => updates,
        }
    }
}

/// Names of the commands on the undo and redo stacks, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueHistory {
    pub undo: Vec<&'static str>,
    pub redo: Vec<&'static str>,
}

type UndoReply = oneshot::Sender<Result<&'static str, UndoError>>;
type Finished = (Box<dyn Command>, Result<(), CommandError>);
type AbortRegistry = Arc<Mutex<HashMap<Uuid, AbortHandle>>>;

enum Message {
    Execute(Box<dyn Command>),
    Undo(UndoReply),
    Redo(UndoReply),
    WaitIdle(oneshot::Sender<()>),
    History(oneshot::Sender<QueueHistory>),
    Stop,
}

/// Work waiting for its turn
enum Queued {
    Command(Box<dyn Command>),
    Undo(UndoReply),
    Redo(UndoReply),
    Stop,
}

enum Step {
    Joined(Result<(task::Id, Finished), JoinError>),
    Received(Option<Message>),
    Closed,
}

struct Worker {
    context: CommandContext,
    max_workers: usize,
    receiver: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<QueueEvent>,
    pending: VecDeque<Queued>,
    running: JoinSet<Finished>,
    /// Command id and name of each running task
    tasks: HashMap<task::Id, (Uuid, &'static str)>,
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    idle_waiters: Vec<oneshot::Sender<()>>,
    aborts: AbortRegistry,
    blocking: Arc<AtomicBool>,
    closed: bool,
}

impl Worker {
    async fn run(mut self) {
        debug!("Command queue started with {} workers", self.max_workers);

        loop {
            self.start_ready().await;

            if self.pending.is_empty() && self.running.is_empty() {
                for waiter in self.idle_waiters.drain(..) {
                    let _ = waiter.send(());
                }
            }

            if matches!(self.pending.front(), Some(Queued::Stop)) && self.running.is_empty() {
                break;
            }

            let has_running = !self.running.is_empty();
            let open = !self.closed;
            let step = tokio::select! {
                Some(joined) = self.running.join_next_with_id(), if has_running => Step::Joined(joined),
                message = self.receiver.recv(), if open => Step::Received(message),
                else => Step::Closed,
            };

            match step {
                Step::Joined(Ok((task_id, (command, result)))) => {
                    self.tasks.remove(&task_id);
                    self.complete(command, result);
                }
                Step::Joined(Err(join_error)) => match self.tasks.remove(&join_error.id()) {
                    Some((id, name)) => self.crashed(id, name, join_error),
                    None => error!("Command task failed: {}", join_error),
                },
                Step::Received(Some(message)) => self.receive(message),
                Step::Received(None) => {
                    self.closed = true;
                    self.pending.push_back(Queued::Stop);
                }
                Step::Closed => break,
            }
        }

        let dropped = self
            .pending
            .iter()
            .filter(|queued| matches!(queued, Queued::Command(_)))
            .count();
        if dropped > 0 {
            warn!("Command queue stopped with {} commands not executed", dropped);
        }
        info!("Command queue stopped");
    }

    fn receive(&mut self, message: Message) {
        match message {
            Message::Execute(command) => {
                debug!("Queued {} ({})", command.name(), command.state().id);
                self.pending.push_back(Queued::Command(command));
            }
            Message::Undo(reply) => self.pending.push_back(Queued::Undo(reply)),
            Message::Redo(reply) => self.pending.push_back(Queued::Redo(reply)),
            Message::WaitIdle(waiter) => {
                if self.pending.is_empty() && self.running.is_empty() {
                    let _ = waiter.send(());
                } else {
                    self.idle_waiters.push(waiter);
                }
            }
            Message::History(reply) => {
                let _ = reply.send(self.history());
            }
            Message::Stop => self.pending.push_back(Queued::Stop),
        }
    }

    fn history(&self) -> QueueHistory {
        QueueHistory {
            undo: self.undo_stack.iter().map(|c| c.name()).collect(),
            redo: self.redo_stack.iter().map(|c| c.name()).collect(),
        }
    }

    /// Start everything at the front of the queue that may start now
    async fn start_ready(&mut self) {
        loop {
            let ready = match self.pending.front() {
                None | Some(Queued::Stop) => return,
                Some(Queued::Command(command)) if command.state().is_blocking => self.running.is_empty(),
                Some(Queued::Command(_)) => self.running.len() < self.max_workers,
                Some(Queued::Undo(_)) | Some(Queued::Redo(_)) => self.running.is_empty(),
            };
            if !ready {
                return;
            }

            match self.pending.pop_front() {
                Some(Queued::Command(command)) if command.state().is_blocking => {
                    self.run_blocking(command).await
                }
                Some(Queued::Command(command)) => self.spawn(command),
                Some(Queued::Undo(reply)) => {
                    let _ = reply.send(self.undo());
                }
                Some(Queued::Redo(reply)) => {
                    let result = self.redo().await;
                    let _ = reply.send(result);
                }
                Some(Queued::Stop) | None => return,
            }
        }
    }

    fn started(&self, command: &dyn Command) {
        let id = command.state().id;
        self.aborts.lock().insert(id, command.state().abort_handle());
        debug!("Starting {} ({})", command.name(), id);
        self.emit(QueueEvent::Started {
            id,
            name: command.name(),
        });
    }

    fn spawn(&mut self, mut command: Box<dyn Command>) {
        self.started(command.as_ref());
        let (id, name) = (command.state().id, command.name());
        let context = self.context.clone();
        let handle = self.running.spawn(async move {
            let result = command.execute(&context).await;
            (command, result)
        });
        self.tasks.insert(handle.id(), (id, name));
    }

    async fn run_blocking(&mut self, command: Box<dyn Command>) {
        self.started(command.as_ref());
        let (id, name) = (command.state().id, command.name());
        self.blocking.store(true, Ordering::SeqCst);
        let joined = Self::execute_isolated(self.context.clone(), command).await;
        self.blocking.store(false, Ordering::SeqCst);
        match joined {
            Ok((command, result)) => self.complete(command, result),
            Err(join_error) => self.crashed(id, name, join_error),
        }
    }

    /// Execute on a separate task. A panic comes back as a `JoinError`.
    async fn execute_isolated(context: CommandContext, mut command: Box<dyn Command>) -> Result<Finished, JoinError> {
        tokio::spawn(async move {
            let result = command.execute(&context).await;
            (command, result)
        })
        .await
    }

    /// Report a command whose task panicked. The command is gone with its task.
    fn crashed(&mut self, id: Uuid, name: &'static str, join_error: JoinError) {
        self.aborts.lock().remove(&id);
        let error = CommandError::Failed {
            command: name,
            message: format!("command task failed: {}", join_error),
        };
        error!("{}", error);
        self.emit(QueueEvent::Failed {
            id,
            name,
            error,
            updates: Vec::new(),
        });
    }

    fn complete(&mut self, mut command: Box<dyn Command>, result: Result<(), CommandError>) {
        let id = command.state().id;
        let name = command.name();
        self.aborts.lock().remove(&id);

        let updates = command.state_mut().take_model_updates();
        let follow_ons = command.state_mut().take_follow_ons();

        match result {
            Ok(()) => {
                debug!("{} completed with {} updates", name, updates.len());
                self.emit(QueueEvent::Completed { id, name, updates });
                self.enqueue_follow_ons(follow_ons);

                if !command.state().skip_undo {
                    self.undo_stack.push(command);
                    self.redo_stack.clear();
                }
            }
            Err(error) => {
                let aborted = matches!(error, CommandError::Aborted { .. });
                if aborted {
                    info!("{} was aborted", name);
                    command.on_abort();
                } else {
                    error!("{}", error);
                }
                self.emit(QueueEvent::Failed {
                    id,
                    name,
                    error,
                    updates,
                });

                if aborted || command.state().terminal {
                    if !follow_ons.is_empty() {
                        warn!("Dropping {} follow-on commands of {}", follow_ons.len(), name);
                    }
                } else {
                    self.enqueue_follow_ons(follow_ons);
                }
            }
        }
    }

    /// Follow-ons run next, ahead of anything submitted later
    fn enqueue_follow_ons(&mut self, follow_ons: Vec<Box<dyn Command>>) {
        for command in follow_ons.into_iter().rev() {
            self.pending.push_front(Queued::Command(command));
        }
    }

    fn undo(&mut self) -> Result<&'static str, UndoError> {
        let command = self.undo_stack.last().ok_or(UndoError::NothingToUndo)?;
        if !command.state().can_undo {
            return Err(UndoError::NotUndoable(command.name()));
        }
        let mut command = self.undo_stack.pop().ok_or(UndoError::NothingToUndo)?;
        let (id, name) = (command.state().id, command.name());

        match command.undo(&self.context) {
            Ok(()) => {
                debug!("Undid {}", name);
                let updates = command.state_mut().take_model_updates();
                self.emit(QueueEvent::Undone { id, name, updates });
                self.redo_stack.push(command);
                Ok(name)
            }
            Err(error) => {
                warn!("Undo of {} failed: {}", name, error);
                command.state_mut().take_model_updates();
                self.undo_stack.push(command);
                Err(error)
            }
        }
    }

    async fn redo(&mut self) -> Result<&'static str, UndoError> {
        let mut command = self.redo_stack.pop().ok_or(UndoError::NothingToRedo)?;
        command.state_mut().reset();
        let (id, name) = (command.state().id, command.name());

        self.aborts.lock().insert(id, command.state().abort_handle());
        let joined = Self::execute_isolated(self.context.clone(), command).await;
        self.aborts.lock().remove(&id);

        let (mut command, result) = match joined {
            Ok(finished) => finished,
            Err(join_error) => {
                error!("Redo of {} failed: {}", name, join_error);
                return Err(UndoError::Redo(CommandError::Failed {
                    command: name,
                    message: format!("command task failed: {}", join_error),
                }));
            }
        };

        match result {
            Ok(()) => {
                debug!("Redid {}", name);
                let updates = command.state_mut().take_model_updates();
                let follow_ons = command.state_mut().take_follow_ons();
                if !follow_ons.is_empty() {
                    debug!("Ignoring {} follow-on commands of redone {}", follow_ons.len(), name);
                }
                self.emit(QueueEvent::Redone { id, name, updates });
                self.undo_stack.push(command);
                Ok(name)
            }
            Err(error) => {
                error!("Redo of {} failed: {}", name, error);
                Err(UndoError::Redo(error))
            }
        }
    }

    fn emit(&self, event: QueueEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

/// Handle to the command worker.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct CommandQueue {
    sender: mpsc::UnboundedSender<Message>,
    worker: JoinHandle<()>,
    aborts: AbortRegistry,
    blocking: Arc<AtomicBool>,
    stop_timeout: Duration,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execute(command) => write!(f, "Execute({})", command.name()),
            Self::Undo(_) => write!(f, "Undo"),
            Self::Redo(_) => write!(f, "Redo"),
            Self::WaitIdle(_) => write!(f, "WaitIdle"),
            Self::History(_) => write!(f, "History"),
            Self::Stop => write!(f, "Stop"),
        }
    }
}

impl CommandQueue {
    /// Start the worker and return the queue with its event stream
    pub fn new(context: CommandContext, config: &QueueConfig) -> (Self, mpsc::UnboundedReceiver<QueueEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (events, event_receiver) = mpsc::unbounded_channel();
        let aborts = AbortRegistry::default();
        let blocking = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            context,
            max_workers: config.max_workers.max(1),
            receiver,
            events,
            pending: VecDeque::new(),
            running: JoinSet::new(),
            tasks: HashMap::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            idle_waiters: Vec::new(),
            aborts: Arc::clone(&aborts),
            blocking: Arc::clone(&blocking),
            closed: false,
        };

        let queue = Self {
            sender,
            worker: tokio::spawn(worker.run()),
            aborts,
            blocking,
            stop_timeout: config.stop_timeout(),
        };
        (queue, event_receiver)
    }

    /// Queue a command, returning its id
    pub fn submit(&self, command: Box<dyn Command>) -> Result<Uuid, QueueError> {
        let id = command.state().id;
        self.sender
            .send(Message::Execute(command))
            .map_err(|_| QueueError::Stopped)?;
        Ok(id)
    }

    /// Undo the most recent command, returning its name
    pub async fn undo(&self) -> Result<&'static str, UndoError> {
        if self.is_blocking_running() {
            return Err(UndoError::Busy);
        }
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Undo(reply))
            .map_err(|_| UndoError::QueueStopped)?;
        response.await.map_err(|_| UndoError::QueueStopped)?
    }

    /// Re-execute the most recently undone command, returning its name
    pub async fn redo(&self) -> Result<&'static str, UndoError> {
        if self.is_blocking_running() {
            return Err(UndoError::Busy);
        }
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Redo(reply))
            .map_err(|_| UndoError::QueueStopped)?;
        response.await.map_err(|_| UndoError::QueueStopped)?
    }

    /// Wait until nothing is pending or running
    pub async fn wait_idle(&self) -> Result<(), QueueError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::WaitIdle(reply))
            .map_err(|_| QueueError::Stopped)?;
        response.await.map_err(|_| QueueError::Stopped)
    }

    pub async fn history(&self) -> Result<QueueHistory, QueueError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::History(reply))
            .map_err(|_| QueueError::Stopped)?;
        response.await.map_err(|_| QueueError::Stopped)
    }

    pub fn is_blocking_running(&self) -> bool {
        self.blocking.load(Ordering::SeqCst)
    }

    /// Ask every running command to abort, returning how many were asked
    pub fn abort_all(&self) -> usize {
        let aborts = self.aborts.lock();
        for handle in aborts.values() {
            handle.abort();
        }
        aborts.len()
    }

    /// Stop after the commands already queued have run.
    ///
    /// If the worker does not finish within the stop timeout, running
    /// commands are aborted and given one more timeout to wind down.
    pub async fn stop(self) -> Result<(), QueueError> {
        let Self {
            sender,
            mut worker,
            aborts,
            stop_timeout,
            ..
        } = self;

        let _ = sender.send(Message::Stop);
        drop(sender);

        if timeout(stop_timeout, &mut worker).await.is_ok() {
            return Ok(());
        }

        warn!("Command queue did not stop in time, aborting running commands");
        for handle in aborts.lock().values() {
            handle.abort();
        }
        if timeout(stop_timeout, &mut worker).await.is_ok() {
            return Ok(());
        }

        worker.abort();
        Err(QueueError::StopTimeout(stop_timeout.as_millis() as u64))
    }
}
