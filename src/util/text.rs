use std::borrow::Cow;

fn is_stripped_control(c: char) -> bool {
    c == '\u{7f}' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r'))
}

/// Strip terminal control characters and ANSI escape sequences.
///
/// Titles, descriptions and extracts come from a public wiki and end up
/// printed to a terminal, so they must not be able to move the cursor,
/// recolor output or retitle the window.
///
/// Removes C0 controls (except tab, newline, carriage return), DEL, CSI
/// sequences (`ESC [` up to a final byte in `@`..=`~`), OSC sequences
/// (`ESC ]` up to BEL or `ESC \`) and any other bare ESC.
///
/// Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped_control) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\u{7}' {
                            break;
                        }
                        if c == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            c if is_stripped_control(c) => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}

/// Owned variant for fields decoded from the network.
pub fn sanitize(s: String) -> String {
    if let Cow::Owned(cleaned) = strip_control_chars(&s) {
        return cleaned;
    }
    s
}
