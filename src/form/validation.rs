use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use super::controller::FieldKey;

pub trait ValidationError: Clone + Send + Sync + 'static {
    fn message(&self) -> Cow<'_, str>;
}

impl ValidationError for String {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl ValidationError for &'static str {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

impl ValidationError for Cow<'static, str> {
    fn message(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_ref())
    }
}

pub trait FieldLens<T>: Copy + Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

pub trait FormModel: Clone + Send + Sync + 'static {
    type Fields;

    fn fields() -> Self::Fields;
}

/// Where a stored error belongs. `Root` sorts before every field.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorKey {
    Root,
    Field(FieldKey),
}

impl From<FieldKey> for ErrorKey {
    fn from(key: FieldKey) -> Self {
        Self::Field(key)
    }
}

impl Display for ErrorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKey::Root => f.write_str("root"),
            ErrorKey::Field(key) => Display::fmt(key, f),
        }
    }
}

/// Error messages keyed by field (or root). Never holds an empty list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldErrors<E> {
    entries: BTreeMap<ErrorKey, Vec<E>>,
}

impl<E> Default for FieldErrors<E> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<E> FieldErrors<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<ErrorKey>, messages: Vec<E>) -> Self {
        self.insert(key, messages);
        self
    }

    /// Replaces the messages for `key`. An empty list removes the entry.
    pub fn insert(&mut self, key: impl Into<ErrorKey>, messages: Vec<E>) {
        let key = key.into();
        if messages.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, messages);
        }
    }

    pub fn push(&mut self, key: impl Into<ErrorKey>, message: E) {
        self.entries.entry(key.into()).or_default().push(message);
    }

    pub fn remove(&mut self, key: impl Into<ErrorKey>) -> Option<Vec<E>> {
        self.entries.remove(&key.into())
    }

    pub fn get(&self, key: impl Into<ErrorKey>) -> Option<&[E]> {
        self.entries.get(&key.into()).map(Vec::as_slice)
    }

    pub fn contains(&self, key: impl Into<ErrorKey>) -> bool {
        self.entries.contains_key(&key.into())
    }

    pub fn root(&self) -> Option<&[E]> {
        self.get(ErrorKey::Root)
    }

    pub fn first_key(&self) -> Option<ErrorKey> {
        self.entries.keys().next().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = ErrorKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKey, &[E])> + '_ {
        self.entries
            .iter()
            .map(|(key, messages)| (*key, messages.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `None` when nothing is stored, which is how the form represents "no known errors".
    pub fn into_option(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

impl<E> FromIterator<(ErrorKey, Vec<E>)> for FieldErrors<E> {
    fn from_iter<I: IntoIterator<Item = (ErrorKey, Vec<E>)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (key, messages) in iter {
            errors.insert(key, messages);
        }
        errors
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationResult<E> {
    Valid,
    Invalid {
        fields: BTreeMap<FieldKey, Vec<E>>,
        root: Vec<E>,
    },
}

impl<E> ValidationResult<E> {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    /// Flattens into the form's error map. Empty lists are dropped and an
    /// `Invalid` without any message collapses to `None`.
    pub fn into_errors(self) -> Option<FieldErrors<E>> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { fields, root } => std::iter::once((ErrorKey::Root, root))
                .chain(
                    fields
                        .into_iter()
                        .map(|(key, messages)| (ErrorKey::Field(key), messages)),
                )
                .collect::<FieldErrors<E>>()
                .into_option(),
        }
    }
}

pub trait Schema<T, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &T) -> ValidationResult<E>;
}

impl<T, E, F> Schema<T, E> for F
where
    E: ValidationError,
    F: Fn(&T) -> ValidationResult<E> + Send + Sync,
{
    fn validate(&self, model: &T) -> ValidationResult<E> {
        (self)(model)
    }
}

pub trait FieldValidator<T, L, E>: Send + Sync
where
    L: FieldLens<T>,
    E: ValidationError,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E>;
}

impl<T, L, E, F> FieldValidator<T, L, E> for F
where
    L: FieldLens<T>,
    E: ValidationError,
    F: for<'a> Fn(&'a T, &'a L::Value) -> Result<(), E> + Send + Sync,
{
    fn validate(&self, model: &T, value: &L::Value) -> Result<(), E> {
        (self)(model, value)
    }
}

pub trait FormValidator<T, E>: Send + Sync
where
    E: ValidationError,
{
    fn validate(&self, model: &T) -> Vec<(ErrorKey, E)>;
}

impl<T, E, F> FormValidator<T, E> for F
where
    E: ValidationError,
    F: Fn(&T) -> Vec<(ErrorKey, E)> + Send + Sync,
{
    fn validate(&self, model: &T) -> Vec<(ErrorKey, E)> {
        (self)(model)
    }
}

type FieldRuleFn<T, E> = Arc<dyn Fn(&T) -> Result<(), E> + Send + Sync>;
type RefineFn<T, E> = Arc<dyn Fn(&T) -> Vec<(ErrorKey, E)> + Send + Sync>;

/// A schema assembled from per-field rules and cross-field refinements.
///
/// Every failing rule contributes its message, in registration order, so a
/// field can report several problems at once.
pub struct RuleSchema<T, E> {
    rules: Vec<(FieldKey, FieldRuleFn<T, E>)>,
    refinements: Vec<RefineFn<T, E>>,
}

impl<T, E> Clone for RuleSchema<T, E> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            refinements: self.refinements.clone(),
        }
    }
}

impl<T, E> Default for RuleSchema<T, E> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            refinements: Vec::new(),
        }
    }
}

impl<T, E> RuleSchema<T, E>
where
    T: 'static,
    E: ValidationError,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<L, V>(mut self, lens: L, rule: V) -> Self
    where
        L: FieldLens<T>,
        V: FieldValidator<T, L, E> + 'static,
    {
        let rule = Arc::new(rule);
        let wrapped: FieldRuleFn<T, E> =
            Arc::new(move |model: &T| rule.validate(model, lens.get(model)));
        self.rules.push((lens.key(), wrapped));
        self
    }

    pub fn refine<V>(mut self, validator: V) -> Self
    where
        V: FormValidator<T, E> + 'static,
    {
        let validator = Arc::new(validator);
        self.refinements
            .push(Arc::new(move |model: &T| validator.validate(model)));
        self
    }
}

impl<T, E> Schema<T, E> for RuleSchema<T, E>
where
    T: 'static,
    E: ValidationError,
{
    fn validate(&self, model: &T) -> ValidationResult<E> {
        let mut fields = BTreeMap::<FieldKey, Vec<E>>::new();
        let mut root = Vec::new();

        for (key, rule) in &self.rules {
            if let Err(error) = rule(model) {
                fields.entry(*key).or_default().push(error);
            }
        }

        for refinement in &self.refinements {
            for (key, error) in refinement(model) {
                match key {
                    ErrorKey::Root => root.push(error),
                    ErrorKey::Field(key) => fields.entry(key).or_default().push(error),
                }
            }
        }

        if fields.is_empty() && root.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid { fields, root }
        }
    }
}

/// Text rules usable with [`RuleSchema::field`] on any field whose value is `AsRef<str>`.
/// Lengths count chars, not bytes.
pub mod rules {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{FieldLens, FieldValidator, ValidationError};

    macro_rules! text_rule {
        ($(#[$meta:meta])* $rule:ident $(, $field:ident: $ty:ty)* => |$this:ident, $value:ident| $accepts:expr) => {
            $(#[$meta])*
            #[derive(Clone, Debug, Eq, PartialEq)]
            pub struct $rule<E> {
                $($field: $ty,)*
                error: E,
            }

            impl<T, L, E> FieldValidator<T, L, E> for $rule<E>
            where
                L: FieldLens<T>,
                L::Value: AsRef<str>,
                E: ValidationError,
            {
                fn validate(&self, _model: &T, value: &L::Value) -> Result<(), E> {
                    let $this = self;
                    let $value: &str = value.as_ref();
                    if $accepts { Ok(()) } else { Err(self.error.clone()) }
                }
            }
        };
    }

    text_rule!(
        /// Rejects blank values.
        Required => |_rule, value| !value.trim().is_empty()
    );
    text_rule!(MinLen, min: usize => |rule, value| value.chars().count() >= rule.min);
    text_rule!(MaxLen, max: usize => |rule, value| value.chars().count() <= rule.max);
    text_rule!(
        /// ASCII letters and digits only; empty values fail.
        Alphanumeric => |_rule, value| {
            !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
        }
    );
    text_rule!(
        StartsWithLetter => |_rule, value| value.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
    );
    text_rule!(
        /// Loose shape check: one `@`, non-empty local part, dotted domain.
        Email => |_rule, value| looks_like_email(value)
    );
    text_rule!(DecimalText => |_rule, value| Decimal::from_str(value.trim()).is_ok());

    pub fn required<E>(error: E) -> Required<E> {
        Required { error }
    }

    pub fn min_len<E>(min: usize, error: E) -> MinLen<E> {
        MinLen { min, error }
    }

    pub fn max_len<E>(max: usize, error: E) -> MaxLen<E> {
        MaxLen { max, error }
    }

    pub fn alphanumeric<E>(error: E) -> Alphanumeric<E> {
        Alphanumeric { error }
    }

    pub fn starts_with_letter<E>(error: E) -> StartsWithLetter<E> {
        StartsWithLetter { error }
    }

    pub fn email<E>(error: E) -> Email<E> {
        Email { error }
    }

    pub fn decimal<E>(error: E) -> DecimalText<E> {
        DecimalText { error }
    }

    fn looks_like_email(value: &str) -> bool {
        if value.chars().any(char::is_whitespace) {
            return false;
        }
        let Some((local, domain)) = value.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && !domain.contains('@')
            && !domain.ends_with('.')
            && domain
                .split_once('.')
                .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
    }
}
