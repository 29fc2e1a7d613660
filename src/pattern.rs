//! Redis-style glob matching for key patterns
//!
//! Supports the same syntax as `SCAN ... MATCH`: `*`, `?`, character classes
//! (`[abc]`, `[^abc]`, `[a-z]`) and `\` escapes. Matching is byte-wise, like
//! the server.

/// Returns true when `key` matches the glob `pattern`.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    match_bytes(pattern.as_bytes(), key.as_bytes())
}

fn match_bytes(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Position of the last `*` and the text offset it is currently absorbing up to
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    let (matched, width) = match_class(&pattern[p..], text[t]);
                    if matched {
                        p += width;
                        t += 1;
                        continue;
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }

    p == pattern.len()
}

/// Match one byte against the class starting at `pattern[0] == b'['`.
///
/// Returns whether it matched and the width of the class in the pattern. A
/// class that is never closed runs to the end of the pattern, and `x-y` is
/// a range whenever a byte follows the `-`, even if that byte is `]`.
fn match_class(pattern: &[u8], c: u8) -> (bool, usize) {
    let mut i = 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    loop {
        if i >= pattern.len() {
            // Unclosed: the last pattern byte ends the class
            return (matched != negate, pattern.len());
        }
        if pattern[i] == b'\\' && pattern.len() - i >= 2 {
            i += 1;
            if pattern[i] == c {
                matched = true;
            }
        } else if pattern[i] == b']' {
            return (matched != negate, i + 1);
        } else if pattern.len() - i >= 3 && pattern[i + 1] == b'-' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            if (lo..=hi).contains(&c) {
                matched = true;
            }
            i += 2;
        } else if pattern[i] == c {
            matched = true;
        }
        i += 1;
    }
}
