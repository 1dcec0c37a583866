use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::controller::{
    FormController, FormResult, FormState, SubmitState, read_lock, transition_submit_state,
    write_lock,
};
use super::remote::{FailureCode, RemoteFailure};
use super::validation::ValidationError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome<R> {
    /// Validation passed and the callback ran.
    Submitted(R),
    /// Validation failed; the callback was not invoked.
    Invalid,
    /// The remote side refused the values.
    Rejected(Option<FailureCode>),
}

impl<R> SubmitOutcome<R> {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted(_))
    }

    pub fn into_submitted(self) -> Option<R> {
        match self {
            SubmitOutcome::Submitted(output) => Some(output),
            _ => None,
        }
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// Marks the form submitted, validates synchronously, and calls `f` with
    /// the values only when they pass. Errors are left untouched on success.
    pub fn submit<R>(&self, f: impl FnOnce(&T) -> R) -> FormResult<SubmitOutcome<R>> {
        let Some((model, generation)) = self.begin_submit()? else {
            return Ok(SubmitOutcome::Invalid);
        };
        let output = f(&model);
        self.settle_submit(generation, SubmitState::Succeeded)?;
        Ok(SubmitOutcome::Submitted(output))
    }

    /// Like [`FormController::submit`] for a remote call. A failure is folded
    /// into the error map and reported as [`SubmitOutcome::Rejected`].
    ///
    /// Overlapping calls share one disabled window: the form is disabled when
    /// the first call goes out and restored when the last one settles or is
    /// dropped.
    pub async fn submit_async<F, Fut, R>(&self, f: F) -> FormResult<SubmitOutcome<R>>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = Result<R, RemoteFailure<E>>>,
    {
        let Some((model, generation)) = self.begin_submit()? else {
            return Ok(SubmitOutcome::Invalid);
        };

        let _in_flight = InFlightSubmit::enter(
            self.state.clone(),
            self.options.disable_while_submitting,
        )?;
        let result = f(model).await;

        match result {
            Ok(output) => {
                self.settle_submit(generation, SubmitState::Succeeded)?;
                Ok(SubmitOutcome::Submitted(output))
            }
            Err(failure) => {
                let code = failure.code;
                if self.is_current_submit(generation)? {
                    self.apply_remote_failure(failure)?;
                    self.settle_submit(generation, SubmitState::Failed)?;
                }
                Ok(SubmitOutcome::Rejected(code))
            }
        }
    }

    /// Returns the values to submit with the submit generation they belong
    /// to, or `None` after storing the errors that block submission.
    fn begin_submit(&self) -> FormResult<Option<(T, u64)>> {
        let (form_id, model, generation) = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            state.submitted = true;
            state.submit_count = state.submit_count.saturating_add(1);
            transition_submit_state(&mut state, SubmitState::Validating)?;
            (state.id, state.model.clone(), state.submit_generation)
        };

        let errors = self.schema.validate(&model).into_errors();
        let mut state = write_lock(&self.state, "applying submit validation")?;
        match errors {
            Some(errors) => {
                debug!(form = %form_id, error_count = errors.len(), "submit blocked by validation");
                state.errors = Some(errors);
                transition_submit_state(&mut state, SubmitState::Failed)?;
                Ok(None)
            }
            None => {
                debug!(form = %form_id, "submit validated");
                transition_submit_state(&mut state, SubmitState::Submitting)?;
                Ok(Some((model, generation)))
            }
        }
    }

    fn is_current_submit(&self, generation: u64) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit generation")?.submit_generation == generation)
    }

    fn settle_submit(&self, generation: u64, next: SubmitState) -> FormResult<()> {
        let mut state = write_lock(&self.state, "completing submit")?;
        if state.submit_generation != generation {
            debug!(form = %state.id, state = ?next, "submit settled after reset, state kept");
            return Ok(());
        }
        transition_submit_state(&mut state, next)?;
        debug!(form = %state.id, state = ?next, "submit settled");
        Ok(())
    }
}

/// Counts one remote submission in flight for as long as it lives.
struct InFlightSubmit<T, E> {
    state: Arc<RwLock<FormState<T, E>>>,
    disable: bool,
}

impl<T, E> InFlightSubmit<T, E> {
    fn enter(state: Arc<RwLock<FormState<T, E>>>, disable: bool) -> FormResult<Self> {
        {
            let mut guard = write_lock(&state, "entering submit")?;
            if guard.submits_in_flight == 0 && disable {
                guard.disabled_before_submit = guard.disabled;
                guard.disabled = true;
            }
            guard.submits_in_flight = guard.submits_in_flight.saturating_add(1);
        }
        Ok(Self { state, disable })
    }
}

impl<T, E> Drop for InFlightSubmit<T, E> {
    fn drop(&mut self) {
        let Ok(mut state) = self.state.write() else {
            warn!("form state poisoned, in-flight submit not released");
            return;
        };
        state.submits_in_flight = state.submits_in_flight.saturating_sub(1);
        if state.submits_in_flight > 0 {
            return;
        }
        if self.disable {
            state.disabled = state.disabled_before_submit;
        }
        if state.submit_state == SubmitState::Submitting {
            debug!(form = %state.id, "submit abandoned before settling");
            state.submit_state = SubmitState::Idle;
        }
    }
}
