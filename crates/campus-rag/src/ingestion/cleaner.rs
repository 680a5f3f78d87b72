//! Text normalization applied to every loaded document

/// Non-blank lines kept per document
pub const MAX_LINES: usize = 1000;

/// C0 and C1 control characters, replaced by a space
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// Normalize extracted text.
///
/// Each source line has its control characters replaced by spaces and its
/// whitespace runs collapsed; blank lines are dropped, the first
/// [`MAX_LINES`] survivors are kept and joined with a single space.
/// The result is a single trimmed line, so cleaning is idempotent.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for line in text.split('\n').map(normalize_line).filter(|l| !l.is_empty()).take(MAX_LINES) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&line);
    }

    out
}

fn normalize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;

    for c in line.chars() {
        if is_stripped_control(c) || c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}
