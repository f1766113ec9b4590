//! Output sanitizer: best-effort repair of supplementation Markdown.
//!
//! The prompt forbids JSON inside the Markdown, yet models still leak parts
//! of the response envelope into the text:
//!
//! - the whole answer wrapped in `{"supplementedPoints": "..."}` with
//!   escaped newlines, sometimes *inside* the already-parsed field value
//! - tails such as `, "points": [{"point":` or `"}]}` on their own line
//! - keys like `"title": "Photosynthesis",` in place of a heading
//! - stray emphasis markers (`some * text`, `text *`)
//!
//! Every rule is a pure `&str → String` pass, kept apart from the stage call
//! so it can be strengthened and tested on its own. Clean Markdown comes out
//! unchanged, and rules 4 to 7 never touch fenced code blocks, where braces,
//! quoted keys and `*` are legitimate content. The sanitizer does not
//! guarantee a clean result; callers can check the remainder with
//! [`find_leaks`].

use crate::types::SupplementationResponse;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all repair rules to the raw supplementation Markdown.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Unwrap a whole-payload `{"supplementedPoints": "..."}` envelope
/// 4. Strip known structured-data fragments
/// 5. Replace lines that are a single `"key": "value"` pair by the value, then
///    drop remaining inline keys
/// 6. Drop lines made only of JSON punctuation
/// 7. Remove stray emphasis markers
/// 8. Trim trailing whitespace, collapse blank lines, remove invisible Unicode
///
/// Rules 4–7 run on prose only; fenced code is copied through as is.
pub fn sanitize_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = unwrap_envelope(&s);
    let s = map_prose(&s, repair_prose);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

/// Internal field identifiers that must never appear in displayed Markdown.
pub const FIELD_NAMES: [&str; 7] = [
    "supplementedPoints",
    "revisionPoints",
    "topic",
    "points",
    "point",
    "title",
    "summary",
];

static RE_LEAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(supplementedPoints|revisionPoints|topic|points|point|title|summary)"\s*:|\b(supplementedPoints|revisionPoints)\b"#)
        .unwrap()
});

/// Field-name leaks still present in `markdown`, in order of appearance.
///
/// A leak is a quoted field name used as a JSON key, or one of the camelCase
/// envelope identifiers anywhere in the prose. Plain words such as "title"
/// are not leaks, and neither is anything inside a fenced code block.
pub fn find_leaks(markdown: &str) -> Vec<&'static str> {
    split_fenced(markdown)
        .into_iter()
        .filter(|block| !block.fenced)
        .flat_map(|block| {
            let prose = block.lines.join("\n");
            let leaks: Vec<&'static str> = RE_LEAK
                .captures_iter(&prose)
                .filter_map(|caps| {
                    let name = caps.get(1).or_else(|| caps.get(2))?.as_str();
                    FIELD_NAMES.iter().copied().find(|f| *f == name)
                })
                .collect();
            leaks
        })
        .collect()
}

// ── Fenced code blocks ───────────────────────────────────────────────────────

/// A run of consecutive lines, either inside a code fence (fence lines
/// included) or outside of one.
struct Block<'a> {
    fenced: bool,
    lines: Vec<&'a str>,
}

fn is_fence_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("```") || t.starts_with("~~~")
}

/// Split `input` into prose and fenced blocks. An unterminated fence runs
/// to the end of the text.
fn split_fenced(input: &str) -> Vec<Block<'_>> {
    let mut blocks: Vec<Block<'_>> = Vec::new();
    let mut in_fence = false;
    for line in input.split('\n') {
        let opens = !in_fence && is_fence_line(line);
        let fenced = in_fence || opens;
        let continues = !opens && blocks.last().is_some_and(|b| b.fenced == fenced);
        match blocks.last_mut() {
            Some(block) if continues => block.lines.push(line),
            _ => blocks.push(Block {
                fenced,
                lines: vec![line],
            }),
        }
        if opens {
            in_fence = true;
        } else if in_fence && is_fence_line(line) {
            in_fence = false;
        }
    }
    blocks
}

/// Apply `rule` to every prose block, leaving fenced blocks untouched.
fn map_prose(input: &str, rule: fn(&str) -> String) -> String {
    split_fenced(input)
        .into_iter()
        .map(|block| {
            let text = block.lines.join("\n");
            if block.fenced {
                text
            } else {
                rule(&text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rules 4–7 on one prose block.
fn repair_prose(prose: &str) -> String {
    let s = strip_known_fragments(prose);
    let s = strip_field_keys(&s);
    let s = drop_punctuation_lines(&s);
    repair_stray_emphasis(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Unwrap a whole-payload envelope ──────────────────────────────────

static RE_ENVELOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)^\{\s*"supplementedPoints"\s*:\s*"(.*)"\s*\}$"#).unwrap());

fn unwrap_envelope(input: &str) -> String {
    let trimmed = input.trim();
    if !RE_ENVELOPE.is_match(trimmed) {
        return input.to_string();
    }
    // Proper JSON first; the regex fallback handles envelopes with raw
    // newlines or unescaped quotes that serde rejects.
    if let Ok(resp) = serde_json::from_str::<SupplementationResponse>(trimmed) {
        return resp.supplemented_points;
    }
    match RE_ENVELOPE.captures(trimmed) {
        Some(caps) => unescape(&caps[1]),
        None => input.to_string(),
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ── Rule 4: Strip known structured-data fragments ────────────────────────────

static RE_POINTS_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#",\s*"points"\s*:\s*\[\s*\{\s*"point"\s*:"#).unwrap());

static RE_TOPIC_HEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[\s*\{\s*"topic"\s*:\s*".*?"\s*,\s*"points"\s*:\s*\[\s*\{\s*"point"\s*:"#).unwrap()
});

// The head also contains a points tail, so it must go first.
fn strip_known_fragments(input: &str) -> String {
    let s = RE_TOPIC_HEAD.replace_all(input, "");
    RE_POINTS_TAIL.replace_all(&s, "\n\n").to_string()
}

// ── Rule 5: Strip leaked field keys ──────────────────────────────────────────

static RE_KEY_VALUE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*[\[{,]*[ \t]*"(?:title|summary|point|points|topic|supplementedPoints|revisionPoints)"[ \t]*:[ \t]*"(.*?)"[ \t,}\]]*$"#,
    )
    .unwrap()
});

static RE_INLINE_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:title|summary|point|points|topic|supplementedPoints|revisionPoints)"\s*:\s*"?"#)
        .unwrap()
});

fn strip_field_keys(input: &str) -> String {
    let s = RE_KEY_VALUE_LINE.replace_all(input, "$1");
    RE_INLINE_KEY.replace_all(&s, "").to_string()
}

// ── Rule 6: Drop lines made only of JSON punctuation ─────────────────────────

fn is_punctuation_line(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| matches!(c, '{' | '}' | '[' | ']' | '"' | ',' | ':'))
}

fn drop_punctuation_lines(input: &str) -> String {
    input
        .split('\n')
        .filter(|line| !is_punctuation_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 7: Remove stray emphasis markers ────────────────────────────────────
//
// A line whose emphasis markers cannot pair up (odd count once a list bullet
// is set aside) has a lone `*`: one with whitespace or the line edge on both
// sides. A lone star inside inline code, or between two operands such as
// `6 * 2` or `m * a`, is multiplication and stays.

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\* ").unwrap());

fn repair_stray_emphasis(input: &str) -> String {
    input
        .split('\n')
        .map(repair_line_emphasis)
        .collect::<Vec<_>>()
        .join("\n")
}

fn repair_line_emphasis(line: &str) -> String {
    let bullet_len = RE_BULLET.find(line).map_or(0, |m| m.end());
    let (prefix, body) = line.split_at(bullet_len);
    if body.matches('*').count() % 2 == 0 {
        return line.to_string();
    }

    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '*' && is_lone_star(&chars, i) {
            // Drop the star and one adjacent space so words stay single-spaced.
            if out.ends_with(' ') && chars.get(i + 1) == Some(&' ') {
                i += 1;
            }
            i += 1;
            continue;
        }
        out.push(c);
        i += 1;
    }
    format!("{prefix}{}", out.trim_end())
}

fn is_lone_star(chars: &[char], i: usize) -> bool {
    let before_ws = i == 0 || chars[i - 1].is_whitespace();
    let after_ws = i + 1 >= chars.len() || chars[i + 1].is_whitespace();
    if !(before_ws && after_ws) {
        return false;
    }
    let in_code_span = chars[..i].iter().filter(|c| **c == '`').count() % 2 == 1;
    if in_code_span {
        return false;
    }
    let is_product = is_operand(&token_before(chars, i)) && is_operand(&token_after(chars, i));
    !is_product
}

fn token_before(chars: &[char], i: usize) -> String {
    let mut token: Vec<char> = chars[..i]
        .iter()
        .rev()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| !c.is_whitespace())
        .copied()
        .collect();
    token.reverse();
    token.into_iter().collect()
}

fn token_after(chars: &[char], i: usize) -> String {
    chars[i + 1..]
        .iter()
        .skip_while(|c| c.is_whitespace())
        .take_while(|c| !c.is_whitespace())
        .collect()
}

/// A number, a short symbol like `m`, `v0` or `(a`, or a term with a digit
/// such as `c^2`. Ordinary words are not operands.
fn is_operand(token: &str) -> bool {
    let core = token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | ',' | '.' | ';' | ':'));
    if core.is_empty()
        || !core
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '^' | '_' | '.' | '²' | '³'))
    {
        return false;
    }
    core.chars().count() <= 2 || core.chars().any(|c| c.is_ascii_digit())
}

// ── Rule 8: Whitespace and invisible characters ──────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "## Photosynthesis\n\nPlants turn **light** into *chemical* energy.\n\n* Chlorophyll absorbs light\n- Stomata take in CO2\n\n## Respiration\n\n6 * 2 = 12 molecules.";

    #[test]
    fn clean_markdown_is_unchanged() {
        assert_eq!(sanitize_markdown(CLEAN), CLEAN);
        assert!(find_leaks(CLEAN).is_empty());
    }

    /// Well-formed sheets whose content looks like the leaks the rules repair.
    const CLEAN_LOOKALIKES: [&str; 5] = [
        "## Functions\n\nA C function:\n\n```c\nint add(int a, int b) {\n    return a + b;\n}\n```\n\nIt returns the sum.",
        "## Serialisation\n\n```json\n{\n  \"title\": \"Dune\",\n  \"year\": 1965\n}\n```",
        "## Newton\n\nThe law reads F = m * a in every inertial frame.\n\nKinetic energy is E = 0.5 * m * v^2.",
        "## Pointers\n\nDereference with `*p` or multiply with `x * y`, never `*` alone.",
        "## Arrays\n\n~~~python\nrows = [\n    [1, 2],\n]\nprint(\"points\": rows)\n~~~\n\nLists nest.",
    ];

    #[test]
    fn clean_lookalikes_pass_through_unchanged() {
        for clean in CLEAN_LOOKALIKES {
            assert_eq!(sanitize_markdown(clean), clean);
        }
    }

    #[test]
    fn keys_inside_code_blocks_are_not_leaks() {
        assert!(find_leaks(CLEAN_LOOKALIKES[1]).is_empty());
        assert_eq!(
            find_leaks("```json\n{\"title\": 1}\n```\n\n\"summary\": oops"),
            vec!["summary"]
        );
    }

    #[test]
    fn prose_around_code_is_still_repaired() {
        let raw = "\"title\": \"## Loops\",\n\n```rust\nfor i in 0..3 {\n}\n```\n\"}]}\nDone *";
        assert_eq!(
            sanitize_markdown(raw),
            "## Loops\n\n```rust\nfor i in 0..3 {\n}\n```\nDone"
        );
    }

    #[test]
    fn unterminated_fence_is_left_alone() {
        let raw = "## Code\n\n```js\nconst x = {\n  \"title\": \"a\",\n}";
        assert_eq!(sanitize_markdown(raw), raw);
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n## A\nB\n```"), "## A\nB");
        assert_eq!(strip_markdown_fences("```\n## A\n```"), "## A");
        assert_eq!(strip_markdown_fences("## A"), "## A");
    }

    #[test]
    fn test_unwrap_envelope_json() {
        let raw = r###"{"supplementedPoints": "## A\n\nSays \"hi\""}"###;
        assert_eq!(unwrap_envelope(raw), "## A\n\nSays \"hi\"");
    }

    #[test]
    fn test_unwrap_envelope_with_raw_newlines() {
        // Literal newlines inside a JSON string are invalid; the fallback still unwraps.
        let raw = "{\"supplementedPoints\": \"## A\n\nLine\\none \\\"q\\\"\"}";
        assert_eq!(unwrap_envelope(raw), "## A\n\nLine\none \"q\"");
    }

    #[test]
    fn test_unescape_keeps_unknown_sequences() {
        assert_eq!(unescape(r"a\nb\tc\\d\x"), "a\nb\tc\\d\\x");
    }

    #[test]
    fn test_strip_known_fragments() {
        let raw = r#"[{"topic": "Biology", "points": [{"point":## Mitosis"#;
        assert_eq!(strip_known_fragments(raw), "## Mitosis");
        let raw = r#"Cells divide., "points": [{"point":## Meiosis"#;
        assert_eq!(strip_known_fragments(raw), "Cells divide.\n\n## Meiosis");
    }

    #[test]
    fn test_key_value_line_becomes_value() {
        let raw = "{\"title\": \"## Mitosis\",\nText";
        assert_eq!(strip_field_keys(raw), "## Mitosis\nText");
    }

    #[test]
    fn test_inline_key_removed() {
        assert_eq!(
            strip_field_keys(r#"See "summary": below"#),
            "See below"
        );
    }

    #[test]
    fn test_punctuation_lines_dropped() {
        assert_eq!(drop_punctuation_lines("text\n\"}]}\n]\n---\nend"), "text\n---\nend");
    }

    #[test]
    fn test_stray_star_between_words() {
        assert_eq!(repair_line_emphasis("some * text"), "some text");
    }

    #[test]
    fn test_stray_star_at_line_end() {
        assert_eq!(repair_line_emphasis("**Bold** point *"), "**Bold** point");
    }

    #[test]
    fn test_bullet_and_paired_emphasis_untouched() {
        assert_eq!(repair_line_emphasis("* **Key:** value"), "* **Key:** value");
        assert_eq!(repair_line_emphasis("* item * stray"), "* item stray");
        assert_eq!(repair_line_emphasis("3 * 4 = 12"), "3 * 4 = 12");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn leaks_detected_by_quoted_key_or_identifier() {
        assert_eq!(find_leaks(r#"x "title": y"#), vec!["title"]);
        assert_eq!(find_leaks("the supplementedPoints field"), vec!["supplementedPoints"]);
        assert!(find_leaks("A good title and a summary.").is_empty());
    }

    /// Known-bad outputs collected from misbehaving models.
    const LEAKY_FIXTURES: [&str; 5] = [
        "{\"supplementedPoints\": \"## Mitosis\\n\\nCells divide.\\n\\n## Meiosis\\n\\nGametes form.\"}",
        "[{\"topic\": \"Cells\", \"points\": [{\"point\":## Mitosis\n\nCells divide., \"points\": [{\"point\":## Meiosis\n\nGametes form.\n\"}]}]",
        "```markdown\n{\"title\": \"## Mitosis\",\n\"summary\": \"Cells divide.\"}\n```",
        "## Mitosis\r\n\r\nCells * divide.\r\n\r\n\r\n\r\n## Meiosis *\r\n\"}]}",
        "## Mitosis\n\nThe \"point\": cells divide.\n\n## Meiosis\n\nGametes \"summary\": form.",
    ];

    #[test]
    fn fixtures_have_no_field_name_leaks_after_sanitizing() {
        for raw in LEAKY_FIXTURES {
            let cleaned = sanitize_markdown(raw);
            let leaks = find_leaks(&cleaned);
            assert!(leaks.is_empty(), "leaks {leaks:?} in {cleaned:?} (from {raw:?})");
            assert!(cleaned.contains("## Mitosis"), "lost heading in {cleaned:?}");
            assert!(!cleaned.contains("\"}"), "JSON tail left in {cleaned:?}");
        }
    }

    #[test]
    fn sanitize_is_idempotent_on_fixtures() {
        for raw in LEAKY_FIXTURES {
            let once = sanitize_markdown(raw);
            assert_eq!(sanitize_markdown(&once), once);
        }
    }
}
