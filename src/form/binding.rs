use std::sync::Arc;

use super::controller::{FieldKey, FormController, FormError, FormResult, join_messages, read_lock};
use super::validation::{FieldLens, ValidationError};
use crate::contracts::{Disableable, FieldLike, Valued};

type ChangeHook<V> = Arc<dyn Fn(&V) + Send + Sync>;
type BlurHook = Arc<dyn Fn() + Send + Sync>;

/// Everything a control needs to render one bound field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldProps<V, E> {
    pub id: String,
    pub name: FieldKey,
    pub description_id: String,
    pub value: V,
    pub disabled: bool,
    pub invalid: bool,
    pub errors: Vec<E>,
    pub required: bool,
    pub description: Option<String>,
}

/// Builder for a [`FieldBinding`]. Both a form and a field are mandatory.
pub struct FieldBinder<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    form: Option<FormController<T, E>>,
    field: Option<L>,
    id: Option<String>,
    on_change: Option<ChangeHook<L::Value>>,
    on_blur: Option<BlurHook>,
}

impl<T, E, L> Default for FieldBinder<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    fn default() -> Self {
        Self {
            form: None,
            field: None,
            id: None,
            on_change: None,
            on_blur: None,
        }
    }
}

impl<T, E, L> FieldBinder<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn form(mut self, form: &FormController<T, E>) -> Self {
        self.form = Some(form.clone());
        self
    }

    pub fn field(mut self, lens: L) -> Self {
        self.field = Some(lens);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn on_change(mut self, handler: impl Fn(&L::Value) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(handler));
        self
    }

    pub fn on_blur(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_blur = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> FormResult<FieldBinding<T, E, L>> {
        let form = self.form.ok_or(FormError::MissingForm)?;
        let lens = self.field.ok_or(FormError::MissingField)?;
        let id = match self.id {
            Some(id) => id,
            None => format!("form-{}-{}", form.form_id()?, lens.key()),
        };
        Ok(FieldBinding {
            form,
            lens,
            id,
            on_change: self.on_change,
            on_blur: self.on_blur,
        })
    }
}

/// One field of a form wired to a control.
///
/// Change and blur events update the form first, then run the caller's
/// handlers.
pub struct FieldBinding<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    form: FormController<T, E>,
    lens: L,
    id: String,
    on_change: Option<ChangeHook<L::Value>>,
    on_blur: Option<BlurHook>,
}

impl<T, E, L> Clone for FieldBinding<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    fn clone(&self) -> Self {
        Self {
            form: self.form.clone(),
            lens: self.lens,
            id: self.id.clone(),
            on_change: self.on_change.clone(),
            on_blur: self.on_blur.clone(),
        }
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    pub fn bind<L>(&self, lens: L) -> FormResult<FieldBinding<T, E, L>>
    where
        L: FieldLens<T>,
    {
        FieldBinder::new().form(self).field(lens).build()
    }
}

impl<T, E, L> FieldBinding<T, E, L>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
    L: FieldLens<T>,
{
    pub fn key(&self) -> FieldKey {
        self.lens.key()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description_id(&self) -> String {
        format!("description-{}", self.id)
    }

    pub fn form(&self) -> &FormController<T, E> {
        &self.form
    }

    pub fn value(&self) -> FormResult<L::Value> {
        self.form.value(self.lens)
    }

    pub fn change(&self, value: L::Value) -> FormResult<()> {
        match &self.on_change {
            Some(handler) => {
                self.form.set(self.lens, value.clone())?;
                handler(&value);
            }
            None => self.form.set(self.lens, value)?,
        }
        Ok(())
    }

    pub fn blur(&self) -> FormResult<()> {
        self.form.touch(self.lens)?;
        if let Some(handler) = &self.on_blur {
            handler();
        }
        Ok(())
    }

    pub fn is_disabled(&self) -> FormResult<bool> {
        self.form.is_disabled()
    }

    pub fn is_error_visible(&self) -> FormResult<bool> {
        self.form.is_error_visible(self.key())
    }

    pub fn visible_errors(&self) -> FormResult<Vec<E>> {
        self.form.visible_errors(self.key())
    }

    pub fn error_message(&self) -> FormResult<Option<String>> {
        Ok(join_messages(&self.visible_errors()?))
    }

    pub fn props(&self) -> FormResult<FieldProps<L::Value, E>> {
        let key = self.key();
        let (value, disabled) = {
            let state = read_lock(&self.form.state, "reading field props")?;
            (self.lens.get(&state.model).clone(), state.disabled)
        };
        let errors = self.visible_errors()?;
        Ok(FieldProps {
            id: self.id.clone(),
            name: key,
            description_id: self.description_id(),
            value,
            disabled,
            invalid: !errors.is_empty(),
            errors,
            required: self.form.is_required(self.lens)?,
            description: self.form.field_description(self.lens)?,
        })
    }

    /// Pushes the current props into `component`.
    pub fn present<C>(&self, component: C) -> FormResult<C>
    where
        C: FieldLike + Disableable + Valued<L::Value>,
    {
        let props = self.props()?;
        let mut component = component
            .id(props.id)
            .name(props.name.as_str())
            .value(props.value)
            .disabled(props.disabled)
            .invalid(props.invalid)
            .required(props.required);

        if let Some(description) = props.description {
            component = component
                .description(description)
                .described_by(props.description_id);
        }
        if let Some(error) = join_messages(&props.errors) {
            component = component.error(error);
        }
        Ok(component)
    }
}
