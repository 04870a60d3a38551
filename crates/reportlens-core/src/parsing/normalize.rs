use regex::Regex;
use std::sync::LazyLock;

/// Token that App Store Connect's info-glyph lines are normalized to.
pub const PLACEHOLDER: &str = "?";

static THOUSANDS_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d{3})\b").expect("valid thousands regex"));

static DASH_BEFORE_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{2212}\u{2013}\u{2014}](\d)").expect("valid dash regex"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Canonicalize raw report text before any pattern matching.
///
/// Steps:
/// 1. `\r\n` and lone `\r` become `\n`
/// 2. Each line has its horizontal whitespace collapsed to single spaces and trimmed
/// 3. Lines holding only an info glyph become the [`PLACEHOLDER`] token
/// 4. Runs of 3+ newlines collapse to 2
/// 5. Unicode minus and dashes in front of digits become `-`
/// 6. Thousands-separator commas between digits are removed
pub fn normalize_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = unified.split('\n').map(normalize_line).collect();
    let joined = lines.join("\n");

    let collapsed = EXCESS_NEWLINES.replace_all(joined.trim_matches('\n'), "\n\n");
    let dashed = DASH_BEFORE_DIGIT.replace_all(&collapsed, "-$1");

    strip_thousands_separators(&dashed)
}

fn normalize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;
    for c in line.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    if is_placeholder_glyph(&out) {
        PLACEHOLDER.to_string()
    } else {
        out
    }
}

fn is_placeholder_glyph(s: &str) -> bool {
    matches!(s, "?" | "\u{24D8}" | "\u{FFFD}" | "\u{2139}" | "\u{2139}\u{FE0F}")
}

/// Remove commas used as thousands separators. `1,234,567` needs two passes
/// because adjacent groups share a digit.
fn strip_thousands_separators(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let next = THOUSANDS_COMMA.replace_all(&current, "$1$2").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  \n\t "), "");
    }

    #[test]
    fn crlf_becomes_lf() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn whitespace_runs_collapse_within_lines() {
        assert_eq!(
            normalize_text("  Page   Views:\t 2000  "),
            "Page Views: 2000"
        );
    }

    #[test]
    fn excess_blank_lines_collapse() {
        assert_eq!(normalize_text("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn placeholder_lines_are_kept_as_token() {
        let text = "Impressions\n  ?  \n2.91M\n+12%";
        assert_eq!(normalize_text(text), "Impressions\n?\n2.91M\n+12%");
        assert_eq!(normalize_text("Sessions\n\u{24D8}\n1.2K"), "Sessions\n?\n1.2K");
    }

    #[test]
    fn question_mark_inside_prose_is_untouched() {
        assert_eq!(normalize_text("Why did it drop?"), "Why did it drop?");
    }

    #[test]
    fn thousands_commas_are_removed() {
        assert_eq!(normalize_text("Downloads: 10,245"), "Downloads: 10245");
        assert_eq!(normalize_text("1,234,567 units"), "1234567 units");
        assert_eq!(normalize_text("$12,345.67"), "$12345.67");
    }

    #[test]
    fn list_commas_survive() {
        assert_eq!(
            normalize_text("United States, Germany, 12 more"),
            "United States, Germany, 12 more"
        );
    }

    #[test]
    fn unicode_minus_before_digit() {
        assert_eq!(normalize_text("Crashes 45 (\u{2212}3%)"), "Crashes 45 (-3%)");
    }
}
