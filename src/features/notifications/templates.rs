//! Email body templates (Jinja2 syntax), compiled into the binary.

use minijinja::{Environment, Value};
use std::sync::OnceLock;
use thiserror::Error;

pub const SURVEY_INVITATION: &str = "survey_invitation.jinja";
pub const PERMISSION_CHANGE: &str = "permission_change.jinja";

const TEMPLATES: [(&str, &str); 2] = [
    (
        SURVEY_INVITATION,
        include_str!("../../../templates/email/survey_invitation.jinja"),
    ),
    (
        PERMISSION_CHANGE,
        include_str!("../../../templates/email/permission_change.jinja"),
    ),
];

static TEMPLATE_ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Failed to render template: {0}")]
    RenderError(String),
}

fn init_environment() -> Environment<'static> {
    let mut env = Environment::new();

    for (name, source) in TEMPLATES {
        if let Err(e) = env.add_template(name, source) {
            tracing::warn!("Failed to load template {}: {}", name, e);
        }
    }

    env
}

fn get_environment() -> &'static Environment<'static> {
    TEMPLATE_ENV.get_or_init(init_environment)
}

/// Render one of the email templates with the given context
pub fn render_template(template_name: &str, ctx: Value) -> Result<String, TemplateError> {
    let template = get_environment()
        .get_template(template_name)
        .map_err(|_| TemplateError::NotFound(template_name.to_string()))?;

    template
        .render(ctx)
        .map_err(|e| TemplateError::RenderError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_survey_invitation() {
        let body = render_template(
            SURVEY_INVITATION,
            context! { form_link => "https://forms.example/r/1" },
        )
        .unwrap();
        assert_eq!(body, "Encuesta: https://forms.example/r/1");
    }

    #[test]
    fn test_permission_change_lists_one_line_per_file() {
        let files = vec![
            context! { name => "contrato.pdf", url => "https://drive.example/1" },
            context! { name => "nomina.xlsx", url => "https://drive.example/2" },
        ];
        let body = render_template(PERMISSION_CHANGE, context! { files => files }).unwrap();

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("cambie los permisos a privados."));
        assert_eq!(lines[1], "contrato.pdf https://drive.example/1");
        assert_eq!(lines[2], "nomina.xlsx https://drive.example/2");
    }

    #[test]
    fn test_unknown_template() {
        let result = render_template("nope.jinja", context! {});
        assert!(matches!(result, Err(TemplateError::NotFound(_))));
    }
}
