pub use crate::contracts::{Disableable, FieldLike, Valued};
pub use crate::form::{
    ErrorKey, FailureCode, FieldBinder, FieldBinding, FieldErrors, FieldKey, FieldLens,
    FormController, FormError, FormModel, FormOptions, FormResult, FormValues, RemoteFailure,
    RuleSchema, Schema, SubmitOutcome, ValidationMode, ValidationResult, field, rules,
};
