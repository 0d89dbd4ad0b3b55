use jvpug::{Context, Engine, RenderOptions, TplError, context, render, render_file};
use std::path::{Path, PathBuf};
use std::sync::Once;

static INIT: Once = Once::new();

const TEMPLATES: &str = "tests/resources/templates";

fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    });
}

fn template(name: &str) -> PathBuf {
    Path::new(TEMPLATES).join(name)
}

#[test]
fn test_render_page_with_nested_includes() {
    init_logger();
    let ctx = context! {
        title => "Shop & Co",
        items => vec!["a", "b"],
        footer_html => "<small>2026</small>"
    };
    let html = render_file(template("page.jvpug"), &ctx).unwrap();
    let expected = "\
<!DOCTYPE html>
<html>
<head>
<title>Shop &amp; Co</title>
</head>
<body>
<h1>Shop &amp; Co</h1>
<nav>
<a href=\"/\">Home</a>
</nav>
<ul>
<li class=\"item\">a</li>
<li class=\"item\">b</li>
</ul>
<footer><small>2026</small></footer>
</body>
</html>
";
    assert_eq!(html, expected);
}

#[test]
fn test_include_params_do_not_leak() {
    init_logger();
    let html = render_file(template("scope.jvpug"), &Context::new()).unwrap();
    assert_eq!(html, "<p>Hello World</p>\n<p>gone</p>\n");
}

#[test]
fn test_include_params_override_caller_values() {
    init_logger();
    let ctx = context! { who => "caller", name => "Ann" };
    let base = template("partials");
    let html = render("include greet.jvpug who=name\np #{who}", &ctx, Some(base.as_path())).unwrap();
    assert_eq!(html, "<p>Hello Ann</p>\n<p>caller</p>\n");

    // a quoted path with an interpolated parameter
    let html = render(
        "include 'greet.jvpug' who=\"#{name} & co\"",
        &ctx,
        Some(base.as_path()),
    )
    .unwrap();
    assert_eq!(html, "<p>Hello Ann &amp; co</p>\n");
}

#[test]
fn test_include_absolute_path() {
    init_logger();
    let abs = std::fs::canonicalize(template("partials/greet.jvpug")).unwrap();
    let src = format!("include '{}' who='abs'", abs.display());
    let html = render(&src, &Context::new(), Some(Path::new("/nonexistent"))).unwrap();
    assert_eq!(html, "<p>Hello abs</p>\n");
}

#[test]
fn test_missing_include_aborts_render() {
    init_logger();
    let err = render_file(template("broken_include.jvpug"), &Context::new()).unwrap_err();
    match err {
        TplError::TemplateReadError { path, .. } => {
            assert_eq!(path, template("missing.jvpug"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_top_level_file() {
    init_logger();
    let err = render_file(template("nope.jvpug"), &Context::new()).unwrap_err();
    assert!(matches!(err, TplError::TemplateReadError { .. }));
    assert!(err.to_string().contains("nope.jvpug"));
}

#[test]
fn test_include_depth_limit() {
    init_logger();
    let engine = Engine::new(RenderOptions {
        max_include_depth: Some(3),
    });
    let err = engine
        .render_file(template("self_include.jvpug"), &Context::new())
        .unwrap_err();
    assert!(matches!(err, TplError::IncludeDepthExceeded(3)));
}

#[test]
fn test_include_within_loop_sees_loop_variable() {
    init_logger();
    let ctx = context! { people => vec!["Ann", "Bob"] };
    let html = render(
        "for who in people\n  include greet.jvpug",
        &ctx,
        Some(template("partials").as_path()),
    )
    .unwrap();
    assert_eq!(html, "<p>Hello Ann</p>\n<p>Hello Bob</p>\n");
}
