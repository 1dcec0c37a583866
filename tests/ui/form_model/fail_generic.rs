#![allow(dead_code)]

use calmform::form::FormModel;

#[derive(Clone, FormModel)]
struct GenericForm<T> {
    value: T,
}

fn main() {}
