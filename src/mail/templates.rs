use minijinja::Environment;

use crate::error::Result;

/// A mail template and the fixed subject it is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    pub subject: &'static str,
}

pub const PASSWORD_CHANGE_REQUEST: Template = Template {
    name: "password_change_request.html",
    subject: "Password Change Request",
};

/// Embedded HTML templates. `.html` names are auto-escaped.
#[derive(Debug)]
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Load the embedded templates.
    ///
    /// # Errors
    /// Returns a template error when an embedded template fails to parse.
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("layout.html", include_str!("../../templates/layout.html"))?;
        env.add_template(
            PASSWORD_CHANGE_REQUEST.name,
            include_str!("../../templates/password_change_request.html"),
        )?;
        Ok(Self { env })
    }

    /// Render `template` against `context`.
    ///
    /// # Errors
    /// Returns a template error when the template is unknown or rendering fails.
    pub fn render(&self, template: Template, context: minijinja::Value) -> Result<String> {
        Ok(self.env.get_template(template.name)?.render(context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn escapes_html_in_payload() -> anyhow::Result<()> {
        let templates = Templates::new()?;
        let html = templates.render(
            PASSWORD_CHANGE_REQUEST,
            context! {
                firstName => "<script>",
                passwordChangeURL => "https://warden.example.org/password_change/abc",
            },
        )?;
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("<title>Password Change Request</title>"));
        Ok(())
    }
}
