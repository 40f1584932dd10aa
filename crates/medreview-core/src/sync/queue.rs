//! Reconciling save queue.
//!
//! Edits arrive on an unbounded channel and are grouped by question id. Each
//! group has one pending event and a deadline; a newer edit replaces the
//! pending event and restarts the quiet window. When the window elapses the
//! event is planned against the store and, unless it is a no-op, sent to the
//! backend. At most one call per question is in flight; edits arriving
//! meanwhile wait until it completes. Different questions proceed
//! concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{self, JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;

use super::{plan_save, AnswerBackend, EditEvent, SaveNotice, SavePlan};
use crate::config::ReviewConfig;
use crate::models::ReviewContext;
use crate::store::{read_store, write_store, SharedAnswerStore};

/// Idle sleep when nothing is pending.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

enum Command {
    Edit(EditEvent),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running save queue.
///
/// Dropping the handle stops new edits; pending edits are sent immediately
/// and in-flight calls are allowed to finish.
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<Command>,
    notices: broadcast::Sender<SaveNotice>,
    worker: JoinHandle<()>,
}

impl SaveQueue {
    /// Start the dispatcher. Must be called from within a tokio runtime.
    pub fn start<B: AnswerBackend>(
        context: ReviewContext,
        backend: Arc<B>,
        store: SharedAnswerStore,
        config: &ReviewConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(config.notification_capacity.max(1));

        let dispatcher = Dispatcher {
            context,
            backend,
            store,
            quiet_window: config.quiet_window(),
            notices: notices.clone(),
            pending: HashMap::new(),
            in_flight: HashSet::new(),
            running: HashMap::new(),
            flush_waiters: Vec::new(),
        };
        let worker = tokio::spawn(dispatcher.run(rx));

        Self {
            tx,
            notices,
            worker,
        }
    }

    /// Queue an edit. Never fails; a stopped queue only logs.
    pub fn enqueue(&self, event: EditEvent) {
        let question_id = event.question_id.clone();
        if self.tx.send(Command::Edit(event)).is_err() {
            tracing::warn!(%question_id, "Save queue stopped, edit dropped");
        }
    }

    /// Subscribe to save outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<SaveNotice> {
        self.notices.subscribe()
    }

    /// Send every pending edit now and wait until all calls have completed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Stop accepting edits, send what is pending and wait for completion.
    pub async fn shutdown(self) {
        let SaveQueue { tx, worker, .. } = self;
        drop(tx);
        if let Err(e) = worker.await {
            tracing::warn!(error = %e, "Save dispatcher ended abnormally");
        }
    }
}

struct Pending {
    event: EditEvent,
    deadline: Instant,
}

struct Dispatcher<B> {
    context: ReviewContext,
    backend: Arc<B>,
    store: SharedAnswerStore,
    quiet_window: Duration,
    notices: broadcast::Sender<SaveNotice>,
    pending: HashMap<String, Pending>,
    in_flight: HashSet<String>,
    /// Question saved by each running task
    running: HashMap<task::Id, String>,
    flush_waiters: Vec<oneshot::Sender<()>>,
}

impl<B: AnswerBackend> Dispatcher<B> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        let mut tasks: JoinSet<SaveNotice> = JoinSet::new();
        let mut open = true;

        loop {
            self.dispatch_due(&mut tasks);
            self.notify_flushed();

            if !open && self.pending.is_empty() && tasks.is_empty() {
                break;
            }

            let wake_at = self
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + IDLE_SLEEP);

            tokio::select! {
                command = rx.recv(), if open => match command {
                    Some(Command::Edit(event)) => self.accept(event),
                    Some(Command::Flush(waiter)) => {
                        self.expedite();
                        self.flush_waiters.push(waiter);
                    }
                    None => {
                        open = false;
                        self.expedite();
                    }
                },
                _ = tokio::time::sleep_until(wake_at) => {}
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => self.complete(joined),
            }
        }

        tracing::debug!(review_id = %self.context.review_id, "Save dispatcher stopped");
    }

    /// Coalesce an edit into the pending group of its question.
    fn accept(&mut self, event: EditEvent) {
        let deadline = Instant::now() + self.quiet_window;
        match self.pending.get_mut(&event.question_id) {
            Some(pending) => {
                tracing::trace!(question_id = %event.question_id, "Coalesced edit");
                pending.event.merge(event);
                pending.deadline = deadline;
            }
            None => {
                self.pending
                    .insert(event.question_id.clone(), Pending { event, deadline });
            }
        }
    }

    /// Make every pending group due now.
    fn expedite(&mut self) {
        let now = Instant::now();
        for pending in self.pending.values_mut() {
            pending.deadline = now;
        }
    }

    /// Earliest deadline among groups not blocked by an in-flight call.
    fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .iter()
            .filter(|(id, _)| !self.in_flight.contains(*id))
            .map(|(_, pending)| pending.deadline)
            .min()
    }

    fn dispatch_due(&mut self, tasks: &mut JoinSet<SaveNotice>) {
        let now = Instant::now();
        let mut due: Vec<(String, Instant)> = self
            .pending
            .iter()
            .filter(|(id, pending)| pending.deadline <= now && !self.in_flight.contains(*id))
            .map(|(id, pending)| (id.clone(), pending.deadline))
            .collect();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (question_id, _) in due {
            let Some(Pending { event, .. }) = self.pending.remove(&question_id) else {
                continue;
            };

            let plan = plan_save(read_store(&self.store).get(&question_id), &event);
            if plan == SavePlan::Skip {
                tracing::debug!(%question_id, "Answer unchanged, save skipped");
                self.publish(SaveNotice::Skipped { question_id });
                continue;
            }

            self.in_flight.insert(question_id.clone());
            let context = self.context.clone();
            let backend = Arc::clone(&self.backend);
            let store = Arc::clone(&self.store);
            let task_question = question_id.clone();
            let handle = tasks.spawn(async move {
                execute(&context, backend.as_ref(), &store, &task_question, plan).await
            });
            self.running.insert(handle.id(), question_id);
        }
    }

    fn complete(&mut self, joined: Result<(task::Id, SaveNotice), JoinError>) {
        let task_id = match &joined {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let Some(question_id) = self.running.remove(&task_id) else {
            tracing::error!(?task_id, "Completed save task was not tracked");
            return;
        };
        self.in_flight.remove(&question_id);

        match joined {
            Ok((_, notice)) => self.publish(notice),
            Err(e) => {
                tracing::error!(%question_id, error = %e, "Save task failed to complete");
                self.publish(SaveNotice::Failed {
                    question_id,
                    error: e.to_string(),
                });
            }
        }
    }

    fn publish(&self, notice: SaveNotice) {
        let _ = self.notices.send(notice);
    }

    fn notify_flushed(&mut self) {
        if self.flush_waiters.is_empty() || !self.pending.is_empty() || !self.in_flight.is_empty() {
            return;
        }
        for waiter in self.flush_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Run one planned save and record the confirmed answer.
async fn execute<B: AnswerBackend>(
    context: &ReviewContext,
    backend: &B,
    store: &SharedAnswerStore,
    question_id: &str,
    plan: SavePlan,
) -> SaveNotice {
    let review_id = &context.review_id;
    let result = match plan {
        SavePlan::Skip => {
            return SaveNotice::Skipped {
                question_id: question_id.to_string(),
            }
        }
        SavePlan::Create(new_answer) => backend
            .create_answer(review_id, new_answer)
            .await
            .map(SaveNotice::Created),
        SavePlan::Update(patch) => backend
            .update_answer(review_id, question_id, patch)
            .await
            .map(SaveNotice::Updated),
    };

    match result {
        Ok(notice) => {
            if let SaveNotice::Created(answer) | SaveNotice::Updated(answer) = &notice {
                write_store(store).record_confirmed(answer.clone());
            }
            tracing::debug!(%review_id, %question_id, "Answer saved");
            notice
        }
        Err(e) => {
            tracing::warn!(%review_id, %question_id, error = %e, "Answer save failed");
            SaveNotice::Failed {
                question_id: question_id.to_string(),
                error: e.to_string(),
            }
        }
    }
}
