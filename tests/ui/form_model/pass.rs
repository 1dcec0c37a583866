use calmform::form::{FieldLens, FormModel};

#[derive(Clone, calmform::form::FormModel)]
struct DemoForm {
    email: String,
    #[form(name = "displayName")]
    display_name: String,
}

fn main() {
    let fields = DemoForm::fields();
    let lens = fields.email();
    let mut model = DemoForm {
        email: "a@calm.form".to_string(),
        display_name: String::new(),
    };
    lens.set(&mut model, "b@calm.form".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@calm.form");
    assert_eq!(fields.display_name().key().as_str(), "displayName");
    assert_eq!(fields.keys().len(), 2);
}
