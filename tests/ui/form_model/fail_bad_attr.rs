#![allow(dead_code)]

use calmform::form::FormModel;

#[derive(Clone, FormModel)]
struct LoginForm {
    #[form(rename = "user")]
    login: String,
}

fn main() {}
