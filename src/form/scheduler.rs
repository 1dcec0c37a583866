use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedSender};
use futures::executor::block_on;
use futures_timer::Delay;
use tracing::{debug, warn};

use super::controller::{
    FormController, FormId, FormResult, FormState, ValidationMode, ValidationTicket, write_lock,
};
use super::validation::{FieldErrors, FieldLens, Schema, ValidationError};

pub type ValidationTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs debounced validation tasks on some executor.
pub trait Spawn: Send + Sync + 'static {
    fn spawn(&self, task: ValidationTask);
}

impl<F> Spawn for F
where
    F: Fn(ValidationTask) + Send + Sync + 'static,
{
    fn spawn(&self, task: ValidationTask) {
        (self)(task)
    }
}

/// Drives every task of one form on a single long-lived worker thread.
///
/// Tasks run concurrently on that thread, so superseded runs wait on timers
/// instead of holding threads. The worker exits once every clone is dropped
/// and the queued tasks have finished.
#[derive(Clone, Debug)]
pub struct ThreadSpawner {
    tasks: UnboundedSender<ValidationTask>,
}

impl ThreadSpawner {
    pub fn new() -> Self {
        let (tasks, queue) = mpsc::unbounded::<ValidationTask>();
        let spawned = thread::Builder::new()
            .name("calmform-validation".into())
            .spawn(move || block_on(queue.for_each_concurrent(None, |task| task)));
        if let Err(error) = spawned {
            warn!(%error, "failed to spawn validation worker, validations dropped");
        }
        Self { tasks }
    }
}

impl Default for ThreadSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawn for ThreadSpawner {
    fn spawn(&self, task: ValidationTask) {
        if self.tasks.unbounded_send(task).is_err() {
            warn!("validation worker is gone, run dropped");
        }
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// Writes the value and, in `OnChange` mode, waits for the debounced
    /// validation inline instead of handing it to the spawner.
    pub async fn set_async<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        self.write_value(lens, value)?;
        if self.options.validate_mode == ValidationMode::OnChange {
            self.debounced_validation()?.execute().await;
        }
        Ok(())
    }

    /// Validates the current values right away and supersedes any pending run.
    pub fn validate_now(&self) -> FormResult<bool> {
        let (form_id, model) = {
            let mut state = write_lock(&self.state, "starting immediate validation")?;
            state.ticket = state.ticket.next();
            state.validation_pending = false;
            (state.id, state.model.clone())
        };
        let errors = self.schema.validate(&model).into_errors();
        let is_valid = errors.is_none();

        let mut state = write_lock(&self.state, "applying immediate validation")?;
        state.errors = errors;
        debug!(form = %form_id, is_valid, "immediate validation applied");
        Ok(is_valid)
    }

    pub(super) fn schedule_validation(&self) -> FormResult<()> {
        let run = self.debounced_validation()?;
        self.spawner.spawn(Box::pin(run.execute()));
        Ok(())
    }

    /// Claims a fresh ticket, superseding whatever run is still pending, and
    /// returns the run for it.
    fn debounced_validation(&self) -> FormResult<DebouncedRun<T, E>> {
        let (form_id, ticket) = {
            let mut state = write_lock(&self.state, "scheduling validation")?;
            state.ticket = state.ticket.next();
            state.validation_pending = true;
            (state.id, state.ticket)
        };
        debug!(form = %form_id, ticket = ticket.0, "validation scheduled");

        Ok(DebouncedRun {
            form_id,
            ticket,
            delay: self.options.debounce,
            state: Arc::downgrade(&self.state),
            schema: self.schema.clone(),
        })
    }
}

struct DebouncedRun<T, E> {
    form_id: FormId,
    ticket: ValidationTicket,
    delay: Duration,
    state: Weak<RwLock<FormState<T, E>>>,
    schema: Arc<dyn Schema<T, E>>,
}

impl<T, E> DebouncedRun<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    async fn execute(self) {
        if !self.delay.is_zero() {
            Delay::new(self.delay).await;
        }

        let Some(state) = self.state.upgrade() else {
            debug!(form = %self.form_id, "form dropped, validation skipped");
            return;
        };
        let Some(model) = self.latest_model(&state) else {
            return;
        };
        let errors = self.schema.validate(&model).into_errors();
        self.apply(&state, errors);
    }

    fn latest_model(&self, state: &RwLock<FormState<T, E>>) -> Option<T> {
        let Ok(state) = state.read() else {
            warn!(form = %self.form_id, "form state poisoned, validation skipped");
            return None;
        };
        if state.ticket != self.ticket {
            debug!(
                form = %self.form_id,
                ticket = self.ticket.0,
                latest = state.ticket.0,
                "validation superseded"
            );
            return None;
        }
        Some(state.model.clone())
    }

    fn apply(&self, state: &RwLock<FormState<T, E>>, errors: Option<FieldErrors<E>>) {
        let Ok(mut state) = state.write() else {
            warn!(form = %self.form_id, "form state poisoned, validation result dropped");
            return;
        };
        if state.ticket != self.ticket {
            debug!(form = %self.form_id, ticket = self.ticket.0, "stale validation result dropped");
            return;
        }
        let error_count = errors.as_ref().map_or(0, FieldErrors::len);
        state.errors = errors;
        state.validation_pending = false;
        debug!(form = %self.form_id, ticket = self.ticket.0, error_count, "validation applied");
    }
}
