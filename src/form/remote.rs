use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use tracing::warn;

use super::controller::{FieldKey, FormController, FormResult, write_lock};
use super::validation::{ErrorKey, ValidationError};

/// Categorical reason a remote submission was refused.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FailureCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl Display for FailureCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FailureCode::BadRequest => "BAD_REQUEST",
            FailureCode::Unauthorized => "UNAUTHORIZED",
            FailureCode::Forbidden => "FORBIDDEN",
            FailureCode::NotFound => "NOT_FOUND",
            FailureCode::Conflict => "CONFLICT",
            FailureCode::Internal => "INTERNAL_SERVER_ERROR",
        })
    }
}

/// A structured failure returned by the remote side of a submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteFailure<E> {
    pub code: Option<FailureCode>,
    pub message: Option<E>,
    pub fields: BTreeMap<FieldKey, Vec<E>>,
}

impl<E> Default for RemoteFailure<E> {
    fn default() -> Self {
        Self {
            code: None,
            message: None,
            fields: BTreeMap::new(),
        }
    }
}

impl<E> RemoteFailure<E> {
    pub fn new(code: FailureCode) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn message(mut self, message: E) -> Self {
        self.message = Some(message);
        self
    }

    pub fn field(mut self, key: FieldKey, message: E) -> Self {
        self.fields.entry(key).or_default().push(message);
        self
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: ValidationError,
{
    /// Folds a remote failure into the error map without discarding errors of
    /// other fields. The message lands in the root errors.
    pub fn apply_remote_failure(&self, failure: RemoteFailure<E>) -> FormResult<()> {
        let RemoteFailure {
            code,
            message,
            fields,
        } = failure;

        let mut state = write_lock(&self.state, "applying remote failure")?;
        let field_count = fields.len();
        state.update_errors(|errors| {
            for (key, messages) in fields {
                errors.insert(key, messages);
            }
            if let Some(message) = message {
                errors.push(ErrorKey::Root, message);
            }
        });
        warn!(
            form = %state.id,
            code = ?code,
            field_count,
            "remote submission failed"
        );
        Ok(())
    }
}
