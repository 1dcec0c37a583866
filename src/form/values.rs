use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;

use super::controller::FieldKey;
use super::validation::FieldLens;

static EMPTY: String = String::new();

/// String-valued form model for forms made of plain text inputs.
///
/// Reads are total: a field that was never written reads as `""`. Writes
/// insert, so a field never disappears once present.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormValues {
    values: BTreeMap<FieldKey, String>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(FieldKey::new(key), value.into());
        self
    }

    pub fn get(&self, key: FieldKey) -> &str {
        self.values.get(&key).map_or("", String::as_str)
    }

    pub fn set(&mut self, key: FieldKey, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn decimal(&self, key: FieldKey) -> Option<Decimal> {
        Decimal::from_str(self.get(key).trim()).ok()
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(&'static str, S)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (&'static str, S)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (FieldKey::new(key), value.into()))
                .collect(),
        }
    }
}

/// Lens over one named entry of [`FormValues`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValueLens(FieldKey);

impl ValueLens {
    pub const fn new(key: &'static str) -> Self {
        Self(FieldKey::new(key))
    }
}

pub const fn field(key: &'static str) -> ValueLens {
    ValueLens::new(key)
}

impl FieldLens<FormValues> for ValueLens {
    type Value = String;

    fn key(self) -> FieldKey {
        self.0
    }

    fn get<'a>(self, model: &'a FormValues) -> &'a Self::Value {
        model.values.get(&self.0).unwrap_or(&EMPTY)
    }

    fn set(self, model: &mut FormValues, value: Self::Value) {
        model.values.insert(self.0, value);
    }
}
