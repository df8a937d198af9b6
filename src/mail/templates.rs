use super::TemplateVars;

const WELCOME: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h1>Welcome, {{user_name}}!</h1>
    <p>Thanks for signing up. Please confirm your account by clicking this link:</p>
    <a href="{{link}}">Confirm account</a>
    <p>The link expires in 24 hours.</p>
  </body>
</html>
"#;

const RESEND_ACTIVATION: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h1>Hello, {{user_name}}</h1>
    <p>You asked us to resend your activation link.</p>
    <p>Please confirm your account by clicking this link:</p>
    <a href="{{link}}">Confirm account</a>
    <p>If you did not request this, just ignore this email.</p>
  </body>
</html>
"#;

const RESET_PASSWORD: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h2>Hello {{user_name}}</h2>
    <p>We received a request to reset your password.</p>
    <p><a href="{{link}}" target="_blank">Reset password</a></p>
    <p>This link expires in 15 minutes.</p>
    <p>If you did not request this change, you can ignore this email.</p>
  </body>
</html>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Welcome,
    ResendActivation,
    ResetPassword,
}

impl Template {
    fn source(self) -> &'static str {
        match self {
            Template::Welcome => WELCOME,
            Template::ResendActivation => RESEND_ACTIVATION,
            Template::ResetPassword => RESET_PASSWORD,
        }
    }

    /// Replaces every `{{name}}` placeholder with its HTML-escaped value from `vars`.
    pub fn render(self, vars: &TemplateVars) -> String {
        vars.iter().fold(self.source().to_string(), |html, (key, value)| {
            html.replace(&format!("{{{{{key}}}}}"), &escape_html(value))
        })
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_all_placeholders() {
        let mut vars = TemplateVars::new();
        vars.insert("user_name", "Ada".into());
        vars.insert("link", "https://app.test/activate?token=abc".into());
        let html = Template::Welcome.render(&vars);
        assert!(html.contains("Welcome, Ada!"));
        assert!(html.contains(r#"href="https://app.test/activate?token=abc""#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn user_supplied_values_are_escaped() {
        let mut vars = TemplateVars::new();
        vars.insert("user_name", r#"<script>alert("x")</script> & O'Brien"#.into());
        vars.insert("link", "https://app.test/activate?token=abc".into());
        let html = Template::Welcome.render(&vars);
        assert!(!html.contains("<script>"));
        assert!(html.contains(
            "Welcome, &lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; O&#x27;Brien!"
        ));
        assert!(html.contains(r#"href="https://app.test/activate?token=abc""#));
    }

    #[test]
    fn reset_template_mentions_expiry() {
        let mut vars = TemplateVars::new();
        vars.insert("user_name", "Ada".into());
        vars.insert("link", "https://app.test/reset-password?token=t".into());
        let html = Template::ResetPassword.render(&vars);
        assert!(html.contains("15 minutes"));
        assert!(html.contains("reset-password?token=t"));
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let html = Template::ResendActivation.render(&TemplateVars::new());
        assert!(html.contains("{{user_name}}"));
    }
}
