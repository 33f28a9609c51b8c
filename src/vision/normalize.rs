//! Text cleanup for recognized lines
//!
//! Cleanup is applied to each line independently; line breaks carry the
//! reading order and are never merged, dropped or reordered.

const SOFT_HYPHEN: char = '\u{00AD}';
const NO_BREAK_SPACE: char = '\u{00A0}';

/// Join cleaned lines with `\n`
pub fn normalize_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(|line| normalize_line(line.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Clean a single recognized line.
///
/// Soft hyphens are removed, no-break spaces become spaces, runs of spaces
/// and tabs collapse to one space and the ends are trimmed. A line that
/// itself contains line breaks is cleaned per sub-line.
pub fn normalize_line(line: &str) -> String {
    if line.contains('\n') {
        return line
            .split('\n')
            .map(clean_segment)
            .collect::<Vec<_>>()
            .join("\n");
    }
    clean_segment(line)
}

fn clean_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut in_run = false;

    for c in segment.chars() {
        let c = match c {
            SOFT_HYPHEN => continue,
            NO_BREAK_SPACE => ' ',
            other => other,
        };
        if c == ' ' || c == '\t' {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    out.trim_matches(is_horizontal_whitespace).to_string()
}

/// Whitespace that does not break a line
fn is_horizontal_whitespace(c: char) -> bool {
    c.is_whitespace()
        && !matches!(
            c,
            '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
        )
}
