/// Splits a line remainder on unquoted spaces.
///
/// A single- or double-quoted run may contain spaces and stays in the token
/// with its quotes. Quotes do not nest; an unterminated quote swallows the
/// rest of the input into the current token.
pub fn tokenize(s: &str) -> Vec<&str> {
    split_unquoted(s, |c| c == ' ')
}

/// Like [`tokenize`] but with a caller-chosen separator set.
pub fn split_unquoted(s: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            start.get_or_insert(i);
            continue;
        }
        if is_sep(c) {
            if let Some(st) = start.take() {
                out.push(&s[st..i]);
            }
            continue;
        }
        start.get_or_insert(i);
    }
    if let Some(st) = start {
        out.push(&s[st..]);
    }
    out
}

/// Byte index of the `)` closing the `(` at the start of `s`, ignoring
/// quoted content and nested parentheses.
pub fn find_closing_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Removes one pair of matching surrounding quotes, if present.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
