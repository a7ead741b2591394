//! Telegram MarkdownV2 escaping with a hard character ceiling.
//!
//! The output is a sequence of tokens: an escaped reserved character (`\.`),
//! an escaped backslash (`\\`), or a plain character. Re-escaping that
//! sequence reproduces it exactly, so `sanitize` is idempotent:
//!
//! - a run of backslashes before a reserved character collapses to one escape
//! - a run of `n` backslashes before anything else becomes `ceil(n/2)` pairs
//! - truncation drops whole tokens, never half an escape

/// Characters MarkdownV2 requires to be escaped outside code entities.
pub const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

pub fn is_reserved(c: char) -> bool {
    RESERVED.contains(&c)
}

/// Escape `text` for MarkdownV2 and cut it to at most `max_chars` characters.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max_chars * 4) + 8);
    let mut used = 0usize;

    let mut push = |token: &str, width: usize, out: &mut String| -> bool {
        if used + width > max_chars {
            return false;
        }
        out.push_str(token);
        used += width;
        true
    };

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        if c == '\\' {
            let run_start = i;
            while i < chars.len() && chars[i] == '\\' {
                i += 1;
            }
            let run = i - run_start;

            match chars.get(i) {
                Some(&next) if is_reserved(next) => {
                    let mut token = String::with_capacity(2);
                    token.push('\\');
                    token.push(next);
                    if !push(&token, 2, &mut out) {
                        break;
                    }
                    i += 1;
                }
                _ => {
                    let pairs = run.div_ceil(2);
                    let mut truncated = false;
                    for _ in 0..pairs {
                        if !push("\\\\", 2, &mut out) {
                            truncated = true;
                            break;
                        }
                    }
                    if truncated {
                        break;
                    }
                }
            }
            continue;
        }

        let fits = if is_reserved(c) {
            let mut token = String::with_capacity(2);
            token.push('\\');
            token.push(c);
            push(&token, 2, &mut out)
        } else {
            let mut buf = [0u8; 4];
            push(c.encode_utf8(&mut buf), 1, &mut out)
        };
        if !fits {
            break;
        }
        i += 1;
    }

    out
}
