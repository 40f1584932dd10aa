//! In-process backend, for tests and offline use.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{AnswerBackend, BackendError, BackendResult};
use crate::models::{Answer, AnswerPatch, NewAnswer, ReviewId};

/// A backend call, as recorded by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Load,
    Create(NewAnswer),
    Update { question_id: String, patch: AnswerPatch },
}

impl BackendCall {
    pub fn question_id(&self) -> Option<&str> {
        match self {
            BackendCall::Load => None,
            BackendCall::Create(answer) => Some(&answer.question_id),
            BackendCall::Update { question_id, .. } => Some(question_id),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    answers: HashMap<(String, String), Answer>,
    calls: Vec<BackendCall>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    fail_load: bool,
    latency: Duration,
}

/// Answer backend kept in memory, recording every call.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate answers for a review.
    pub fn with_answers(review_id: &ReviewId, answers: Vec<Answer>) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.lock();
            for answer in answers {
                state
                    .answers
                    .insert((review_id.to_string(), answer.question_id.clone()), answer);
            }
        }
        backend
    }

    /// Make saves of `question_id` fail until [`recover`](Self::recover) is called.
    pub fn fail_saves_for(&self, question_id: &str) {
        self.lock().failing.insert(question_id.to_string());
    }

    pub fn recover(&self, question_id: &str) {
        self.lock().failing.remove(question_id);
    }

    /// Make bulk loads fail.
    pub fn fail_loads(&self, fail: bool) {
        self.lock().fail_load = fail;
    }

    /// Make saves of `question_id` panic inside the save task.
    pub fn panic_saves_for(&self, question_id: &str) {
        self.lock().panicking.insert(question_id.to_string());
    }

    /// Delay every create and update by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Create/update calls made for one question.
    pub fn calls_for(&self, question_id: &str) -> Vec<BackendCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.question_id() == Some(question_id))
            .cloned()
            .collect()
    }

    pub fn stored(&self, review_id: &ReviewId, question_id: &str) -> Option<Answer> {
        self.lock()
            .answers
            .get(&(review_id.to_string(), question_id.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a save call, then apply latency and injected failures.
    async fn begin_save(&self, call: BackendCall) -> BackendResult<()> {
        let question_id = call.question_id().unwrap_or_default().to_string();
        let (latency, panics, fails) = {
            let mut state = self.lock();
            state.calls.push(call);
            (
                state.latency,
                state.panicking.contains(&question_id),
                state.failing.contains(&question_id),
            )
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if panics {
            panic!("injected panic saving {}", question_id);
        }
        if fails {
            return Err(BackendError::Unavailable(format!("save {}", question_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AnswerBackend for MemoryBackend {
    async fn load_answers(&self, review_id: &ReviewId) -> BackendResult<Vec<Answer>> {
        let mut state = self.lock();
        state.calls.push(BackendCall::Load);
        if state.fail_load {
            return Err(BackendError::Unavailable("load failed".into()));
        }
        let mut answers: Vec<Answer> = state
            .answers
            .iter()
            .filter(|((review, _), _)| review == review_id.as_str())
            .map(|(_, answer)| answer.clone())
            .collect();
        answers.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(answers)
    }

    async fn create_answer(&self, review_id: &ReviewId, answer: NewAnswer) -> BackendResult<Answer> {
        self.begin_save(BackendCall::Create(answer.clone())).await?;

        let mut state = self.lock();
        let key = (review_id.to_string(), answer.question_id.clone());
        if state.answers.contains_key(&key) {
            return Err(BackendError::Conflict(answer.question_id));
        }
        let created = Answer::from(answer);
        state.answers.insert(key, created.clone());
        Ok(created)
    }

    async fn update_answer(
        &self,
        review_id: &ReviewId,
        question_id: &str,
        patch: AnswerPatch,
    ) -> BackendResult<Answer> {
        self.begin_save(BackendCall::Update {
            question_id: question_id.to_string(),
            patch: patch.clone(),
        })
        .await?;

        let mut state = self.lock();
        let key = (review_id.to_string(), question_id.to_string());
        let answer = state
            .answers
            .get_mut(&key)
            .ok_or_else(|| BackendError::NotFound(question_id.to_string()))?;
        patch.apply(answer);
        Ok(answer.clone())
    }
}
