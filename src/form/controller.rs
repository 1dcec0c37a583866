use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use super::scheduler::{Spawn, ThreadSpawner};
use super::validation::{ErrorKey, FieldErrors, FieldLens, Schema, ValidationError};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

impl Display for FormId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Generation counter for validation runs. Only the latest ticket may write errors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

impl ValidationTicket {
    pub(super) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    /// Debounced re-validation after every change.
    OnChange,
    /// Immediate validation when a field loses focus.
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    pub debounce: Duration,
    pub disable_while_submitting: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnChange,
            debounce: Duration::from_millis(100),
            disable_while_submitting: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FormSnapshot<T, E> {
    pub id: FormId,
    pub model: T,
    pub errors: Option<FieldErrors<E>>,
    pub touched: BTreeSet<FieldKey>,
    pub is_submitted: bool,
    pub submit_count: u32,
    pub submit_state: SubmitState,
    pub disabled: bool,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub validation_pending: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("invalid submit state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: SubmitState, to: SubmitState },
    #[error("field binding has no form controller")]
    MissingForm,
    #[error("field binding has no field")]
    MissingField,
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FormState<T, E> {
    pub(super) id: FormId,
    pub(super) initial_model: T,
    pub(super) model: T,
    pub(super) errors: Option<FieldErrors<E>>,
    pub(super) touched: BTreeSet<FieldKey>,
    pub(super) dirty_fields: BTreeSet<FieldKey>,
    pub(super) submitted: bool,
    pub(super) submit_count: u32,
    pub(super) submit_state: SubmitState,
    pub(super) disabled: bool,
    pub(super) ticket: ValidationTicket,
    pub(super) validation_pending: bool,
    /// Bumped by resets so submissions started earlier settle silently.
    pub(super) submit_generation: u64,
    pub(super) submits_in_flight: u32,
    pub(super) disabled_before_submit: bool,
}

impl<T, E> FormState<T, E> {
    /// Applies `f` to the error map, keeping the "no errors means `None`" rule.
    pub(super) fn update_errors(&mut self, f: impl FnOnce(&mut FieldErrors<E>)) {
        let mut errors = self.errors.take().unwrap_or_default();
        f(&mut errors);
        self.errors = errors.into_option();
    }

    fn error_visible(&self, key: ErrorKey) -> bool {
        let Some(errors) = &self.errors else {
            return false;
        };
        if !errors.contains(key) {
            return false;
        }
        match key {
            ErrorKey::Root => self.submitted,
            ErrorKey::Field(field) => self.submitted || self.touched.contains(&field),
        }
    }
}

/// Owns one form instance: values, touched flags, errors, and submission state.
///
/// Handles are cheap clones sharing the same state. When the last handle is
/// dropped, pending debounced validations become no-ops.
///
/// Each operation locks the state on its own and multi-step operations such
/// as submit are not atomic. Drive one form from one logical thread.
#[derive(Clone)]
pub struct FormController<T, E = String>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub(super) options: FormOptions,
    pub(super) schema: Arc<dyn Schema<T, E>>,
    pub(super) spawner: Arc<dyn Spawn>,
    pub(super) state: Arc<RwLock<FormState<T, E>>>,
    pub(super) required_fields: Arc<RwLock<BTreeSet<FieldKey>>>,
    pub(super) field_descriptions: Arc<RwLock<BTreeMap<FieldKey, String>>>,
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub fn new(schema: impl Schema<T, E> + 'static, initial: T, options: FormOptions) -> Self {
        Self::with_spawner(schema, initial, options, ThreadSpawner::new())
    }

    /// Like [`FormController::new`], with debounced validations handed to `spawner`.
    pub fn with_spawner(
        schema: impl Schema<T, E> + 'static,
        initial: T,
        options: FormOptions,
        spawner: impl Spawn,
    ) -> Self {
        let controller = Self {
            options,
            schema: Arc::new(schema),
            spawner: Arc::new(spawner),
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_model: initial.clone(),
                model: initial,
                errors: None,
                touched: BTreeSet::new(),
                dirty_fields: BTreeSet::new(),
                submitted: false,
                submit_count: 0,
                submit_state: SubmitState::Idle,
                disabled: false,
                ticket: ValidationTicket::default(),
                validation_pending: false,
                submit_generation: 0,
                submits_in_flight: 0,
                disabled_before_submit: false,
            })),
            required_fields: Arc::new(RwLock::new(BTreeSet::new())),
            field_descriptions: Arc::new(RwLock::new(BTreeMap::new())),
        };

        if options.validate_mode == ValidationMode::OnChange {
            drop(controller.schedule_validation());
        }
        controller
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn value<L>(&self, lens: L) -> FormResult<L::Value>
    where
        L: FieldLens<T>,
    {
        Ok(lens
            .get(&read_lock(&self.state, "reading field value")?.model)
            .clone())
    }

    pub fn model(&self) -> FormResult<T> {
        Ok(read_lock(&self.state, "reading form model")?.model.clone())
    }

    pub fn set<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        self.write_value(lens, value)?;
        if self.options.validate_mode == ValidationMode::OnChange {
            self.schedule_validation()?;
        }
        Ok(())
    }

    pub fn touch<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.touched.insert(lens.key());
        }
        if self.options.validate_mode == ValidationMode::OnBlur {
            let _ = self.validate_now()?;
        }
        Ok(())
    }

    pub fn is_touched<L>(&self, lens: L) -> FormResult<bool>
    where
        L: FieldLens<T>,
    {
        Ok(read_lock(&self.state, "reading touched fields")?
            .touched
            .contains(&lens.key()))
    }

    /// Replaces the whole error map. An empty map is stored as `None`.
    pub fn set_errors(&self, errors: Option<FieldErrors<E>>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "replacing errors")?;
        state.errors = errors.and_then(FieldErrors::into_option);
        Ok(())
    }

    /// Replaces the messages of a single key and keeps every other entry.
    pub fn set_error(&self, key: impl Into<ErrorKey>, messages: Vec<E>) -> FormResult<()> {
        let key = key.into();
        let mut state = write_lock(&self.state, "merging field error")?;
        state.update_errors(|errors| errors.insert(key, messages));
        Ok(())
    }

    pub fn errors(&self) -> FormResult<Option<FieldErrors<E>>> {
        Ok(read_lock(&self.state, "reading errors")?.errors.clone())
    }

    pub fn field_errors(&self, key: impl Into<ErrorKey>) -> FormResult<Vec<E>> {
        let key = key.into();
        Ok(read_lock(&self.state, "reading field errors")?
            .errors
            .as_ref()
            .and_then(|errors| errors.get(key))
            .map(<[E]>::to_vec)
            .unwrap_or_default())
    }

    pub fn first_error(&self) -> FormResult<Option<ErrorKey>> {
        Ok(read_lock(&self.state, "reading first error key")?
            .errors
            .as_ref()
            .and_then(FieldErrors::first_key))
    }

    /// Whether the stored errors for `key` should be shown: fields once touched
    /// or after the first submit, root errors after the first submit.
    pub fn is_error_visible(&self, key: impl Into<ErrorKey>) -> FormResult<bool> {
        let key = key.into();
        Ok(read_lock(&self.state, "reading error visibility")?.error_visible(key))
    }

    pub fn visible_errors(&self, key: impl Into<ErrorKey>) -> FormResult<Vec<E>> {
        let key = key.into();
        let state = read_lock(&self.state, "reading visible errors")?;
        if !state.error_visible(key) {
            return Ok(Vec::new());
        }
        Ok(state
            .errors
            .as_ref()
            .and_then(|errors| errors.get(key))
            .map(<[E]>::to_vec)
            .unwrap_or_default())
    }

    pub fn field_error_for_display<L>(&self, lens: L) -> FormResult<Option<String>>
    where
        L: FieldLens<T>,
    {
        Ok(join_messages(&self.visible_errors(lens.key())?))
    }

    /// Flips the form into the submitted state. There is no way back.
    pub fn mark_submitted(&self) -> FormResult<()> {
        write_lock(&self.state, "marking form submitted")?.submitted = true;
        Ok(())
    }

    pub fn is_submitted(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submitted flag")?.submitted)
    }

    pub fn set_disabled(&self, disabled: bool) -> FormResult<()> {
        write_lock(&self.state, "writing disabled flag")?.disabled = disabled;
        Ok(())
    }

    pub fn is_disabled(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading disabled flag")?.disabled)
    }

    pub fn register_required_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut required = write_lock(&self.required_fields, "registering required field")?;
        required.insert(lens.key());
        Ok(())
    }

    pub fn unregister_required_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut required = write_lock(&self.required_fields, "unregistering required field")?;
        required.remove(&lens.key());
        Ok(())
    }

    pub fn is_required<L>(&self, lens: L) -> FormResult<bool>
    where
        L: FieldLens<T>,
    {
        Ok(read_lock(&self.required_fields, "reading required fields")?.contains(&lens.key()))
    }

    pub fn register_field_description<L>(
        &self,
        lens: L,
        description: impl Into<String>,
    ) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut descriptions =
            write_lock(&self.field_descriptions, "registering field description")?;
        descriptions.insert(lens.key(), description.into());
        Ok(())
    }

    pub fn clear_field_description<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let mut descriptions = write_lock(&self.field_descriptions, "clearing field description")?;
        descriptions.remove(&lens.key());
        Ok(())
    }

    pub fn field_description<L>(&self, lens: L) -> FormResult<Option<String>>
    where
        L: FieldLens<T>,
    {
        Ok(
            read_lock(&self.field_descriptions, "reading field description")?
                .get(&lens.key())
                .cloned(),
        )
    }

    /// Restores the initial values and forgets touched, dirty and error state.
    /// The submitted flag survives. Submissions still in flight settle without
    /// touching the submit state or the errors.
    pub fn reset_to_initial(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "resetting form")?;
            state.model = state.initial_model.clone();
            state.dirty_fields.clear();
            state.touched.clear();
            state.errors = None;
            state.ticket = state.ticket.next();
            state.validation_pending = false;
            state.submit_generation = state.submit_generation.wrapping_add(1);
            transition_submit_state(&mut state, SubmitState::Idle)?;
            debug!(form = %state.id, "form reset to initial values");
        }
        if self.options.validate_mode == ValidationMode::OnChange {
            self.schedule_validation()?;
        }
        Ok(())
    }

    pub fn reset_field<L>(&self, lens: L) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        {
            let mut state = write_lock(&self.state, "resetting field")?;
            let initial_value = lens.get(&state.initial_model).clone();
            lens.set(&mut state.model, initial_value);
            state.dirty_fields.remove(&key);
            state.touched.remove(&key);
            state.update_errors(|errors| {
                errors.remove(key);
            });
        }
        if self.options.validate_mode == ValidationMode::OnChange {
            self.schedule_validation()?;
        }
        Ok(())
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        write_lock(&self.state, "clearing all errors")?.errors = None;
        Ok(())
    }

    pub fn clear_field_errors(&self, key: impl Into<ErrorKey>) -> FormResult<()> {
        let key = key.into();
        let mut state = write_lock(&self.state, "clearing field errors")?;
        state.update_errors(|errors| {
            errors.remove(key);
        });
        Ok(())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot<T, E>> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            id: state.id,
            model: state.model.clone(),
            errors: state.errors.clone(),
            touched: state.touched.clone(),
            is_submitted: state.submitted,
            submit_count: state.submit_count,
            submit_state: state.submit_state,
            disabled: state.disabled,
            is_dirty: !state.dirty_fields.is_empty(),
            is_valid: state.errors.is_none(),
            validation_pending: state.validation_pending,
        })
    }

    pub(super) fn write_value<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let mut state = write_lock(&self.state, "writing form model")?;
        lens.set(&mut state.model, value);
        let is_dirty = lens.get(&state.model) != lens.get(&state.initial_model);
        if is_dirty {
            state.dirty_fields.insert(key);
        } else {
            state.dirty_fields.remove(&key);
        }
        Ok(())
    }
}

/// Re-submitting is allowed from any state, including while a previous
/// submission is still in flight; the last one to settle wins.
pub(super) fn transition_submit_state<T, E>(
    state: &mut FormState<T, E>,
    next: SubmitState,
) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (_, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (
                SubmitState::Submitting | SubmitState::Succeeded | SubmitState::Failed,
                SubmitState::Succeeded | SubmitState::Failed
            )
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

pub(super) fn join_messages<E: ValidationError>(errors: &[E]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }
    Some(
        errors
            .iter()
            .map(|error| error.message().into_owned())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
