//! Theme engine
//!
//! Template rendering using Tera.
//! - Default templates are embedded in the binary from `templates/`
//! - A theme directory from the configuration may override any of them
//! - Standard variables (`site_name`, `request_path`, `year`) are injected
//!   into every page

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

/// Templates shipped with the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct DefaultTemplates;

/// Theme engine for rendering templates
pub struct ThemeEngine {
    tera: Tera,
}

impl ThemeEngine {
    /// Create a theme engine from the embedded templates, overlaid with the
    /// `.html` files found under `override_path`.
    pub fn new(override_path: Option<&Path>) -> Result<Self> {
        let mut templates: BTreeMap<String, String> = BTreeMap::new();

        for name in DefaultTemplates::iter() {
            if let Some(file) = DefaultTemplates::get(&name) {
                let content = String::from_utf8(file.data.into_owned())
                    .map_err(|e| ThemeError::TemplateError(format!("{} is not UTF-8: {}", name, e)))?;
                templates.insert(name.to_string(), content);
            }
        }

        if let Some(dir) = override_path {
            if !dir.is_dir() {
                return Err(ThemeError::NotFound(dir.display().to_string()).into());
            }
            let mut overrides = Vec::new();
            collect_templates_from_dir(dir, dir, &mut overrides)?;
            for (name, content) in overrides {
                tracing::debug!("Template '{}' overridden from {:?}", name, dir);
                templates.insert(name, content);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .map_err(|e| ThemeError::TemplateError(describe_tera_error(&e)))?;

        tracing::info!(
            "Loaded {} template(s){}",
            tera.get_template_names().count(),
            override_path
                .map(|p| format!(" with overrides from {:?}", p))
                .unwrap_or_default()
        );

        Ok(Self { tera })
    }

    /// Render a template with the given context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!(
                "Failed to render '{}': {}",
                template,
                describe_tera_error(&e)
            ))
            .into()
        })
    }

    /// Render a template with standard variables added to `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);

        self.render(template, &full_context)
    }

    /// Render `error.html` for an HTTP error, falling back to a bare page if
    /// the template itself fails.
    pub fn render_error_page(
        &self,
        status: u16,
        message: &str,
        standard_vars: &StandardTemplateVars,
    ) -> String {
        let mut context = TeraContext::new();
        context.insert("status", &status);
        context.insert("error_message", message);

        match self.render_with_standard_vars("error.html", &context, standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error template: {}", e);
                Self::simple_error_page(status, message)
            }
        }
    }

    fn simple_error_page(status: u16, message: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>{status}</title></head>
<body><h1>{status}</h1><p>{message}</p></body>
</html>"#,
            status = status,
            message = tera::escape_html(message)
        )
    }
}

/// Collect `.html` files below `current_path`, named relative to `base_path`
fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(current_path)
        .with_context(|| format!("Failed to read theme directory: {:?}", current_path))?
    {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().map_or(false, |ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| ThemeError::TemplateError("Failed to get relative path".to_string()))?;
            let name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }

    Ok(())
}

/// Tera error message including its source chain
fn describe_tera_error(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    message
}

/// Variables every page template receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    /// Current request path
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }
}

#[cfg(test)]
mod tests;
