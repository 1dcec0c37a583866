#![allow(dead_code)]

use calmform::form::FormModel;

#[derive(Clone, FormModel)]
enum ChoiceForm {
    Login,
    Register,
}

fn main() {}
