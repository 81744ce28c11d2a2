//! Player name handling
//!
//! Names arrive from the server with trailing NUL padding and with a small
//! set of escape sequences standing in for characters the server reserves.
//! Colour codes (`^0`..`^9`) are part of a display name and are only removed
//! when writing to the console.

/// Decodes escape sequences and trims padding from a server-reported name
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim_end_matches('\0');
    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '^' {
            out.push(c);
            continue;
        }

        let decoded = match chars.peek() {
            Some('v') => Some('|'),
            Some('a') => Some('*'),
            Some('c') => Some(':'),
            Some('d') => Some('\\'),
            Some('s') => Some('/'),
            Some('q') => Some('?'),
            Some('t') => Some('"'),
            Some('l') => Some('<'),
            Some('r') => Some('>'),
            Some('h') => Some('#'),
            Some('^') => Some('^'),
            _ => None,
        };

        match decoded {
            Some(replacement) => {
                chars.next();
                out.push(replacement);
            }
            None => out.push(c),
        }
    }

    out
}

/// Removes colour codes so a message reads cleanly in a terminal
pub fn strip_colours(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '^' {
            if let Some(next) = chars.peek() {
                if next.is_ascii_digit() {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }

    out
}
