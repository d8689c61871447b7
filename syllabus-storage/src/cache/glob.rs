//! Redis-compatible glob matching for the in-memory backend.
//!
//! Supports `*`, `?`, `[...]` / `[^...]` classes with ranges, and `\`
//! escapes, matching what `SCAN ... MATCH` accepts.

use regex::Regex;

/// Compile a Redis glob into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut re = String::from("(?s)^");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => push_literal(&mut re, escaped),
                None => push_literal(&mut re, '\\'),
            },
            '[' => {
                let mut class = String::from("[");
                if chars.peek() == Some(&'^') {
                    chars.next();
                    class.push('^');
                }
                let mut closed = false;
                let mut consumed = String::new();
                while let Some(n) = chars.next() {
                    consumed.push(n);
                    match n {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => {
                            if let Some(e) = chars.next() {
                                consumed.push(e);
                                class.push_str(&regex::escape(&e.to_string()));
                            }
                        }
                        '-' => class.push('-'),
                        other => class.push_str(&regex::escape(&other.to_string())),
                    }
                }
                if closed && class.len() > 1 && class != "[^" {
                    class.push(']');
                    re.push_str(&class);
                } else {
                    // Unterminated or empty class: Redis treats the bracket literally.
                    push_literal(&mut re, '[');
                    for lit in consumed.chars() {
                        push_literal(&mut re, lit);
                    }
                }
            }
            other => push_literal(&mut re, other),
        }
    }

    re.push('$');
    Regex::new(&re)
}

fn push_literal(re: &mut String, c: char) {
    re.push_str(&regex::escape(&c.to_string()));
}
