/// A control that renders as a labelled form field.
pub trait FieldLike: Sized {
    fn id(self, value: impl Into<String>) -> Self;
    fn name(self, value: impl Into<String>) -> Self;
    fn description(self, value: impl Into<String>) -> Self;
    /// Id of the element describing this control.
    fn described_by(self, value: impl Into<String>) -> Self;
    fn error(self, value: impl Into<String>) -> Self;
    fn invalid(self, value: bool) -> Self;
    fn required(self, value: bool) -> Self;
}

pub trait Disableable: Sized {
    fn disabled(self, value: bool) -> Self;
}

/// A control that displays a value of type `V`.
pub trait Valued<V>: Sized {
    fn value(self, value: V) -> Self;
}
