mod form;

pub use form::{CreateForm, Form, FormFile};
