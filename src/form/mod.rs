mod binding;
mod controller;
mod remote;
mod scheduler;
mod submit;
mod validation;
mod values;


pub use calmform_derive::FormModel;
pub use binding::{FieldBinder, FieldBinding, FieldProps};
pub use controller::{
    FieldKey, FormController, FormError, FormId, FormOptions, FormResult, FormSnapshot,
    SubmitState, ValidationMode, ValidationTicket,
};
pub use remote::{FailureCode, RemoteFailure};
pub use scheduler::{Spawn, ThreadSpawner, ValidationTask};
pub use submit::SubmitOutcome;
pub use validation::{
    ErrorKey, FieldErrors, FieldLens, FieldValidator, FormModel, FormValidator, RuleSchema,
    Schema, ValidationError, ValidationResult, rules,
};
pub use values::{FormValues, ValueLens, field};
