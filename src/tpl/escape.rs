use crate::tpl::expr::evaluate;
use crate::tpl::render_context::Context;
use crate::tpl::tokenizer::strip_quotes;
use crate::value::Value;

/// Escapes `& < > " '` for use in element text and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Escape {
    /// Element text: literal text and `#{}` are escaped, `!{}` is not.
    Html,
    /// Inside a quoted attribute literal: nothing is escaped here, the whole
    /// value is escaped once when the attribute is written.
    None,
}

/// Expands `#{expr}` and `!{expr}` markers in `text`.
///
/// A marker ends at the first `}`. A marker without a closing brace is kept
/// as literal text.
pub fn interpolate(text: &str, ctx: &Context, escape: Escape) -> String {
    let literal = |s: &str| match escape {
        Escape::Html => html_escape(s),
        Escape::None => s.to_string(),
    };

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = find_marker(rest) {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&literal(&rest[..start]));

        let raw = rest.as_bytes()[start] == b'!';
        let value = evaluate(&rest[start + 2..start + 2 + len], ctx).to_string();
        if raw || escape == Escape::None {
            out.push_str(&value);
        } else {
            out.push_str(&html_escape(&value));
        }
        rest = &rest[start + 2 + len + 1..];
    }
    out.push_str(&literal(rest));
    out
}

fn find_marker(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (0..bytes.len().saturating_sub(1))
        .find(|&i| matches!(bytes[i], b'#' | b'!') && bytes[i + 1] == b'{')
}

/// Evaluates a raw attribute value (also used for include parameters).
///
/// Quoted values are string literals with their markers expanded; `true`,
/// `false` and `null` are literals; anything else is an expression.
pub fn eval_attr_value(raw: &str, ctx: &Context) -> Value {
    let raw = raw.trim();
    let inner = strip_quotes(raw);
    if inner.len() != raw.len() {
        return Value::Str(interpolate(inner, ctx, Escape::None));
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => evaluate(raw, ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
        assert_eq!(html_escape("plain ünïcode"), "plain ünïcode");
    }

    #[test]
    fn test_interpolate_markers() {
        let ctx = context! { name => "<b>Jane</b>", n => 2 };
        assert_eq!(
            interpolate("Hi #{name}!", &ctx, Escape::Html),
            "Hi &lt;b&gt;Jane&lt;/b&gt;!"
        );
        assert_eq!(interpolate("Hi !{name}", &ctx, Escape::Html), "Hi <b>Jane</b>");
        assert_eq!(interpolate("#{n * 2} & #{$n}", &ctx, Escape::Html), "4 &amp; 2");
        assert_eq!(interpolate("#{missing}", &ctx, Escape::Html), "");
    }

    #[test]
    fn test_interpolate_unterminated_marker_is_literal() {
        let ctx = context! { a => 1 };
        assert_eq!(interpolate("x #{a", &ctx, Escape::Html), "x #{a");
        assert_eq!(interpolate("#{a} #{a", &ctx, Escape::Html), "1 #{a");
        assert_eq!(interpolate("# { } !", &ctx, Escape::Html), "# { } !");
    }

    #[test]
    fn test_interpolate_without_escaping() {
        let ctx = context! { q => "a&b" };
        assert_eq!(interpolate("<#{q}>", &ctx, Escape::None), "<a&b>");
    }

    #[test]
    fn test_eval_attr_value() {
        let ctx = context! { id => 7, cls => "big" };
        assert_eq!(eval_attr_value("\"item\"", &ctx), Value::Str("item".to_string()));
        assert_eq!(
            eval_attr_value("'row-#{id}'", &ctx),
            Value::Str("row-7".to_string())
        );
        assert_eq!(eval_attr_value("true", &ctx), Value::Bool(true));
        assert_eq!(eval_attr_value("FALSE", &ctx), Value::Bool(false));
        assert_eq!(eval_attr_value("null", &ctx), Value::Null);
        assert_eq!(eval_attr_value("$id + 1", &ctx), Value::Int(8));
        assert_eq!(eval_attr_value("cls", &ctx), Value::Str("big".to_string()));
        assert_eq!(eval_attr_value("nope", &ctx), Value::Null);
    }
}
