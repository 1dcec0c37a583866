#![allow(dead_code)]

use calmform::form::FormModel;

#[derive(Clone, FormModel)]
struct TupleForm(String);

fn main() {}
