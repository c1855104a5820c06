//! Tests for the theme engine

use super::*;
use std::fs;
use tempfile::TempDir;
use tera::Context as TeraContext;

fn has_template(engine: &ThemeEngine, name: &str) -> bool {
    engine.tera.get_template_names().any(|t| t == name)
}

fn vars() -> StandardTemplateVars {
    StandardTemplateVars::new("Test Blog", "/")
}

#[test]
fn test_embedded_templates_load() {
    let engine = ThemeEngine::new(None).unwrap();

    for name in [
        "base.html",
        "index.html",
        "post-details.html",
        "posts-list.html",
        "contacts.html",
        "error.html",
    ] {
        assert!(has_template(&engine, name), "missing embedded template {}", name);
    }
}

#[test]
fn test_standard_vars_injected() {
    let engine = ThemeEngine::new(None).unwrap();

    let html = engine
        .render_with_standard_vars("contacts.html", &TeraContext::new(), &vars())
        .unwrap();
    assert!(html.contains("Test Blog"));
    assert!(html.contains(&vars().year.to_string()));
}

#[test]
fn test_override_directory_replaces_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("contacts.html"),
        "<p>Write to {{ site_name }} by pigeon</p>",
    )
    .unwrap();

    let engine = ThemeEngine::new(Some(temp_dir.path())).unwrap();
    let html = engine
        .render_with_standard_vars("contacts.html", &TeraContext::new(), &vars())
        .unwrap();

    assert_eq!(html, "<p>Write to Test Blog by pigeon</p>");
    // Untouched templates still come from the binary
    assert!(has_template(&engine, "index.html"));
}

#[test]
fn test_override_in_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("partials")).unwrap();
    fs::write(temp_dir.path().join("partials/footer.html"), "footer").unwrap();

    let engine = ThemeEngine::new(Some(temp_dir.path())).unwrap();
    assert!(has_template(&engine, "partials/footer.html"));
}

#[test]
fn test_missing_override_directory() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope");

    let err = ThemeEngine::new(Some(&missing)).err().unwrap();
    assert!(matches!(err.downcast_ref::<ThemeError>(), Some(ThemeError::NotFound(_))));
}

#[test]
fn test_invalid_override_template() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("index.html"), "{% if %}").unwrap();

    assert!(ThemeEngine::new(Some(temp_dir.path())).is_err());
}

#[test]
fn test_render_unknown_template() {
    let engine = ThemeEngine::new(None).unwrap();
    let err = engine.render("missing.html", &TeraContext::new()).unwrap_err();
    assert!(err.to_string().contains("missing.html"));
}

#[test]
fn test_error_page() {
    let engine = ThemeEngine::new(None).unwrap();
    let html = engine.render_error_page(404, "Post not found", &vars());
    assert!(html.contains("404"));
    assert!(html.contains("Post not found"));
}

#[test]
fn test_simple_error_page_escapes_message() {
    let html = ThemeEngine::simple_error_page(500, "<script>");
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>"));
}
