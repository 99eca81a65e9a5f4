//! HTML pages for the web interface.
//!
//! Templates are compiled into the binary and rendered with handlebars, which
//! escapes every interpolated value.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde_json::json;

use crate::messages::{Messages, Notice};
use crate::store::{GrantType, UserRecord};

const LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{{labels.page_title}}</title>
    <link rel="stylesheet" href="/static/style.css">
    <style>
        body { font-family: -apple-system, "Segoe UI", Roboto, Arial, sans-serif; max-width: 480px; margin: 40px auto; padding: 0 20px; background: #f5f5f5; }
        .container { background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .form-group { margin: 15px 0; }
        label { display: block; font-weight: bold; margin-bottom: 5px; }
        input, select { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; box-sizing: border-box; }
        button { background: #0066cc; color: white; padding: 10px 20px; border: none; border-radius: 4px; cursor: pointer; }
        .link { background: none; color: #0066cc; padding: 0; }
        .error { color: #d9534f; background: #f2dede; padding: 10px; border-radius: 4px; }
        .success { color: #3c763d; background: #dff0d8; padding: 10px; border-radius: 4px; }
    </style>
</head>
<body>
<div class="container">
{{#if notice}}<div class="{{#if notice.error}}error{{else}}success{{/if}}">{{notice.text}}</div>{{/if}}
{{> body}}
</div>
</body>
</html>
"#;

const REGISTER: &str = r#"{{#*inline "body"}}
<h1>{{labels.register_title}}</h1>
<form method="post" action="/register">
    <div class="form-group">
        <label for="full_name">{{labels.full_name}}</label>
        <input type="text" id="full_name" name="full_name" required>
    </div>
    <div class="form-group">
        <label for="grant_type">{{labels.grant_type}}</label>
        <select id="grant_type" name="grant_type">
        {{#each grant_types}}<option value="{{this}}">{{this}}</option>{{/each}}
        </select>
    </div>
    <div class="form-group">
        <label for="username">{{labels.username}}</label>
        <input type="text" id="username" name="username" required>
    </div>
    <div class="form-group">
        <label for="password">{{labels.password}}</label>
        <input type="password" id="password" name="password" required>
    </div>
    <button type="submit">{{labels.register_button}}</button>
</form>
<form method="post" action="/show-login">
    <button type="submit" class="link">{{labels.switch_to_login}}</button>
</form>
{{/inline}}{{> layout}}"#;

const LOGIN: &str = r#"{{#*inline "body"}}
<h1>{{labels.login_title}}</h1>
<form method="post" action="/login">
    <div class="form-group">
        <label for="username">{{labels.username}}</label>
        <input type="text" id="username" name="username" required>
    </div>
    <div class="form-group">
        <label for="password">{{labels.password}}</label>
        <input type="password" id="password" name="password" required>
    </div>
    <button type="submit">{{labels.login_button}}</button>
</form>
<form method="post" action="/show-register">
    <button type="submit" class="link">{{labels.switch_to_register}}</button>
</form>
{{/inline}}{{> layout}}"#;

const DASHBOARD: &str = r#"{{#*inline "body"}}
<form method="post" action="/logout" style="float: right">
    <button type="submit">{{labels.logout_button}}</button>
</form>
<h1>{{labels.dashboard_title}}</h1>
<p><strong>{{user.full_name}}</strong> ({{username}})</p>
<p>{{labels.grant_type}}: {{user.grant_type}}</p>
<p>{{labels.member_since}}: {{user.created_at}}</p>
{{/inline}}{{> layout}}"#;

/// Renders the registration, login and dashboard pages in the configured
/// language.
pub struct PageRenderer {
    registry: Handlebars<'static>,
    messages: Messages,
}

impl PageRenderer {
    /// Compile the page templates
    ///
    /// # Arguments
    /// * `messages` - Message table used for every label and notice
    ///
    /// # Returns
    /// * `Result<PageRenderer, TemplateError>` - The renderer, or the template
    ///   that failed to compile
    pub fn new(messages: Messages) -> Result<Self, TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_partial("layout", LAYOUT)?;
        registry.register_template_string("register", REGISTER)?;
        registry.register_template_string("login", LOGIN)?;
        registry.register_template_string("dashboard", DASHBOARD)?;

        Ok(PageRenderer { registry, messages })
    }

    /// Render the registration form with an optional notice
    pub fn register_page(&self, notice: Option<&Notice>) -> Result<String, RenderError> {
        let grant_types: Vec<&str> = GrantType::ALL.iter().map(|g| g.label()).collect();
        self.registry.render(
            "register",
            &json!({
                "labels": self.messages.labels,
                "notice": self.notice_data(notice),
                "grant_types": grant_types,
            }),
        )
    }

    /// Render the login form with an optional notice
    pub fn login_page(&self, notice: Option<&Notice>) -> Result<String, RenderError> {
        self.registry.render(
            "login",
            &json!({
                "labels": self.messages.labels,
                "notice": self.notice_data(notice),
            }),
        )
    }

    /// Landing page for a logged-in user, greeting them by name.
    pub fn dashboard_page(
        &self,
        username: &str,
        user: &UserRecord,
    ) -> Result<String, RenderError> {
        let greeting = Notice::LoginSuccess(user.full_name.clone());
        self.registry.render(
            "dashboard",
            &json!({
                "labels": self.messages.labels,
                "notice": self.notice_data(Some(&greeting)),
                "username": username,
                "user": {
                    "full_name": user.full_name,
                    "grant_type": user.grant_type.label(),
                    "created_at": user.created_at,
                },
            }),
        )
    }

    fn notice_data(&self, notice: Option<&Notice>) -> serde_json::Value {
        match notice {
            Some(notice) => json!({
                "text": self.messages.text(notice),
                "error": notice.is_error(),
            }),
            None => serde_json::Value::Null,
        }
    }
}
