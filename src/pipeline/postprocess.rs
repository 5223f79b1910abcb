//! Post-processing: deterministic cleanup of the model's JSON answer.
//!
//! Models are told to return bare JSON, but regularly wrap it in
//! ` ```json ... ``` ` fences, sometimes after a sentence of preamble. The
//! rules here remove that packaging and nothing else: the JSON text itself
//! is written exactly as the model produced it.
//!
//! ## Rule Order
//!
//! 1. Strip invisible Unicode (BOM, zero-width spaces) so fence detection
//!    sees the real first character
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip the markdown fence around the JSON body
//! 4. Trim and end with exactly one newline

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw model output.
pub fn clean_response(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_json_fences(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip invisible Unicode ─────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 2: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip markdown fences ───────────────────────────────────────────

/// Whole answer is one fenced block.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[ \t]*(?i:json)?[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// A fenced json block somewhere inside surrounding prose.
static RE_INNER_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[ \t]*(?i:json)[ \t]*\n(.*?)\n?```").unwrap());

fn strip_json_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        return caps[1].to_string();
    }
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        if let Some(caps) = RE_INNER_JSON_FENCE.captures(trimmed) {
            return caps[1].to_string();
        }
    }
    trimmed.to_string()
}

// ── Rule 4: Final newline ───────────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences() {
        let input = "```json\n{\"Title\": \"Cells\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"Title\": \"Cells\"}");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n{\"a\": 1}\n```\n";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_uppercase_lang() {
        let input = "```JSON\n[1, 2]\n```";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_fence_after_preamble() {
        let input = "Here is the volume:\n\n```json\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(strip_json_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn test_bare_json_passthrough() {
        let input = "{\"Text\": \"use ```json fences``` in markdown\"}";
        assert_eq!(strip_json_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("\u{FEFF}{\"a\u{200B}\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_response_full_pipeline() {
        let input = "\u{FEFF}```json\r\n{\r\n  \"Title\": \"Cells\"\r\n}\r\n```\r\n";
        assert_eq!(clean_response(input), "{\n  \"Title\": \"Cells\"\n}\n");
    }

    #[test]
    fn test_clean_response_empty() {
        assert_eq!(clean_response("  \n```json\n```\n"), "");
    }
}
