// This file is part of the product Aka.
// SPDX-FileCopyrightText: 2025-2026 Fernworks Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use minijinja::{Environment, Value, default_auto_escape_callback};

pub trait TemplateEngine: Send + Sync {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error>;
}

pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.set_loader(embedded_template_loader);
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(template_name)?;
        tmpl.render(context)
    }
}

/// Template loader for minijinja that loads from embedded sources
fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let template_content = match name {
        // Member settings templates
        "rename/settings_home.html" => {
            Some(include_str!("../rename/templates/settings_home.html"))
        }
        "rename/change_username.html" => {
            Some(include_str!("../rename/templates/change_username.html"))
        }

        // Login shim template
        "login/login_page.html" => Some(include_str!("../login/templates/login_page.html")),

        _ => None,
    };

    Ok(template_content.map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn embedded_templates_resolve() {
        let engine = MiniJinjaEngine::new();
        for name in [
            "rename/settings_home.html",
            "rename/change_username.html",
            "login/login_page.html",
        ] {
            let rendered = engine.render(
                name,
                context! {
                    title => "Title",
                    nav => Vec::<Value>::new(),
                    current_label => "Current",
                    new_label => "New",
                    hint => "Hint",
                    submit_label => "Save",
                    login_label => "User name",
                    remember_label => "Remember",
                    current_login => "alice",
                    action_path => "/members/alice/settings/change-username/",
                    token => "token",
                },
            );
            assert!(rendered.is_ok(), "template {} failed: {:?}", name, rendered);
        }
    }

    #[test]
    fn unknown_templates_are_reported() {
        let engine = MiniJinjaEngine::new();
        assert!(engine.render("missing.html", context! {}).is_err());
    }

    #[test]
    fn form_values_are_escaped() {
        let engine = MiniJinjaEngine::new();
        let rendered = engine
            .render(
                "rename/change_username.html",
                context! {
                    title => "Change Username",
                    nav => Vec::<Value>::new(),
                    current_label => "Current",
                    new_label => "New",
                    hint => "Hint",
                    submit_label => "Save",
                    current_login => "<script>alert(1)</script>",
                    action_path => "/x/",
                    token => "token",
                },
            )
            .expect("render");
        assert!(!rendered.contains("<script>alert(1)</script>"));
    }
}
