//! JSONC comment stripping
//!
//! Manifests may carry `//` and `/* */` comments. The scanner is
//! string-aware: comment markers inside quoted strings (URLs are the
//! common case) are left alone. Stripped characters are replaced with
//! spaces and newlines are preserved so parser error positions still
//! point at the authored file.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    /// Inside a string, the previous character was a backslash
    InStringEscape,
    LineComment,
    BlockComment,
    /// Inside a block comment, the previous character was `*`
    BlockCommentStar,
}

/// Strip `//` and `/* */` comments from JSONC text
///
/// An unterminated block comment is tolerated and runs to end of input;
/// the JSON parser reports the real problem on what remains.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '"' => {
                    state = State::InString;
                    out.push(c);
                }
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        state = State::LineComment;
                        out.push_str("  ");
                    }
                    Some('*') => {
                        chars.next();
                        state = State::BlockComment;
                        out.push_str("  ");
                    }
                    _ => out.push(c),
                },
                _ => out.push(c),
            },
            State::InString => match c {
                '\\' => {
                    state = State::InStringEscape;
                    out.push(c);
                }
                '"' => {
                    state = State::Normal;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::InStringEscape => {
                state = State::InString;
                out.push(c);
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => match c {
                '*' => {
                    state = State::BlockCommentStar;
                    out.push(' ');
                }
                '\n' => out.push('\n'),
                _ => out.push(' '),
            },
            State::BlockCommentStar => match c {
                '/' => {
                    state = State::Normal;
                    out.push(' ');
                }
                '*' => out.push(' '),
                '\n' => {
                    state = State::BlockComment;
                    out.push('\n');
                }
                _ => {
                    state = State::BlockComment;
                    out.push(' ');
                }
            },
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let input = "{\n  \"a\": 1 // trailing\n}";
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
        assert!(!stripped.contains("trailing"));
    }

    #[test]
    fn strips_block_comments() {
        let input = "{ /* multi\nline */ \"a\": 1 }";
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], 1);
        // Newlines inside the comment survive for error positions
        assert_eq!(stripped.lines().count(), input.lines().count());
    }

    #[test]
    fn url_in_string_survives() {
        let input = r#"{ "homepage": "https://example.com/a//b" }"#;
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["homepage"], "https://example.com/a//b");
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        let input = r#"{ "a": "quote \" // not a comment" }"#;
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["a"], "quote \" // not a comment");
    }

    #[test]
    fn unterminated_block_comment_runs_to_eof() {
        let stripped = strip_comments("{} /* dangling");
        assert_eq!(stripped.trim(), "{}");
    }

    #[test]
    fn slash_not_followed_by_comment_marker() {
        let input = r#"{ "path": "a/b" }"#;
        assert_eq!(strip_comments(input), input);
    }
}
