//! Line transformer: raw core log line to a rendered HTML log line.
//!
//! Handles the two log formats the proxy cores produce:
//!
//! - Xray: `2024/01/01 10:00:00.123456 [Info] message`
//! - Mihomo: `time="2024-01-01T10:00:00.123456789Z" level=info msg="message"`
//!
//! Rendering shifts timestamps by the configured hour offset, turns severity
//! tags into badges and translates terminal colors into inline styles.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use regex::{Captures, Regex};

const XRAY_STAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const DISPLAY_FORMAT_MICROS: &str = "%Y/%m/%d %H:%M:%S%.6f";

static XRAY_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}").expect("valid regex"));

static MIHOMO_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"time="(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z)" level=(\w+) msg="(.*)""#,
    )
    .expect("valid regex")
});

static BRACKET_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(debug|info|warn|warning|error|fatal)\]").expect("valid regex")
});

static BARE_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(DEBUG|INFO|WARN|WARNING|ERROR|FATAL)\b").expect("valid regex")
});

static KEYED_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)level=(debug|info|warn|warning|error|fatal)\b").expect("valid regex")
});

static ANSI_SEQUENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[([0-9;?]*)([A-Za-z])").expect("valid regex"));

/// Render one raw log line for display.
///
/// Returns an empty string for blank input; callers skip those instead of
/// emitting empty containers. Never fails: anything that cannot be parsed is
/// passed through as written.
#[must_use]
pub fn render_line(raw: &str, tz_offset_hours: i32) -> String {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return String::new();
    }

    let shifted = shift_timestamps(line, tz_offset_hours);
    let escaped = escape_html(&shifted);
    // Colors first: an escape glued to a level word hides its word boundary.
    let colored = translate_ansi(&escaped);
    let badged = badge_levels(&colored);

    let mut out = String::with_capacity(badged.len() + 32);
    out.push_str(r#"<div class="log-line">"#);
    out.push_str(&badged);
    out.push_str("</div>");
    out
}

/// Shift embedded timestamps by `offset_hours` and canonicalise the Mihomo
/// line layout.
///
/// With a zero offset Xray stamps are left untouched and Mihomo lines are
/// only restructured.
#[must_use]
pub fn shift_timestamps(line: &str, offset_hours: i32) -> Cow<'_, str> {
    if MIHOMO_LINE.is_match(line) {
        return MIHOMO_LINE.replace(line, |caps: &Captures| {
            rewrite_mihomo(caps, offset_hours).unwrap_or_else(|| caps[0].to_string())
        });
    }

    if offset_hours == 0 {
        return Cow::Borrowed(line);
    }

    XRAY_STAMP.replace_all(line, |caps: &Captures| {
        shift_xray_stamp(&caps[0], offset_hours).unwrap_or_else(|| caps[0].to_string())
    })
}

fn shift_xray_stamp(stamp: &str, offset_hours: i32) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(stamp, XRAY_STAMP_FORMAT).ok()?;
    let shifted = parsed.checked_add_signed(TimeDelta::hours(i64::from(offset_hours)))?;
    Some(shifted.format(XRAY_STAMP_FORMAT).to_string())
}

fn rewrite_mihomo(caps: &Captures<'_>, offset_hours: i32) -> Option<String> {
    let parsed = DateTime::parse_from_rfc3339(&caps[1]).ok()?;
    let stamp = if offset_hours == 0 {
        parsed
    } else {
        parsed.checked_add_signed(TimeDelta::hours(i64::from(offset_hours)))?
    };
    Some(format!(
        "{} [{}] {}",
        stamp.format(DISPLAY_FORMAT_MICROS),
        canonical_level(&caps[2]),
        &caps[3]
    ))
}

/// Canonical upper-case level name (`warning` becomes `WARN`).
fn canonical_level(word: &str) -> String {
    let upper = word.to_ascii_uppercase();
    if upper == "WARNING" {
        "WARN".to_string()
    } else {
        upper
    }
}

/// Normal form of a raw line used for filter matching.
///
/// Bracketed severity tags and `level=` fields are upper-cased so that a
/// filter like `ERROR` matches `[Error]` and `level=error` alike.
#[must_use]
pub fn normalize_levels(raw: &str) -> Cow<'_, str> {
    let bracketed = BRACKET_LEVEL.replace_all(raw, |caps: &Captures| {
        format!("[{}]", canonical_level(&caps[1]))
    });
    if !KEYED_LEVEL.is_match(&bracketed) {
        return bracketed;
    }
    let keyed = KEYED_LEVEL.replace_all(&bracketed, |caps: &Captures| {
        format!("level={}", canonical_level(&caps[1]))
    });
    Cow::Owned(keyed.into_owned())
}

fn badge(level: &str) -> String {
    let lower = level.to_ascii_lowercase();
    format!(r#"<span class="log-badge log-badge-{lower}" data-filter="{level}">{level}</span>"#)
}

fn badge_levels(content: &str) -> Cow<'_, str> {
    if BRACKET_LEVEL.is_match(content) {
        return BRACKET_LEVEL.replace_all(content, |caps: &Captures| {
            badge(&canonical_level(&caps[1]))
        });
    }
    BARE_LEVEL.replacen(content, 1, |caps: &Captures| badge(&canonical_level(&caps[1])))
}

fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 16);
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

enum Sgr {
    Color(&'static str),
    Reset,
    Ignored,
}

fn classify_sgr(params: &str) -> Sgr {
    if params.is_empty() || params == "0" {
        return Sgr::Reset;
    }
    params
        .split(';')
        .find_map(|code| match code {
            "32" | "92" => Some(Sgr::Color("#00cc00")),
            "31" | "91" => Some(Sgr::Color("#ef4444")),
            "33" | "93" => Some(Sgr::Color("#f59e0b")),
            "96" => Some(Sgr::Color("#8BCEF7")),
            _ => None,
        })
        .unwrap_or(Sgr::Ignored)
}

/// Replace terminal color sequences with styled spans, dropping every other
/// escape sequence. Spans are always balanced in the output.
fn translate_ansi(content: &str) -> Cow<'_, str> {
    if !content.contains('\x1b') {
        return Cow::Borrowed(content);
    }

    let mut out = String::with_capacity(content.len() + 32);
    let mut open_spans = 0usize;
    let mut last = 0;

    for caps in ANSI_SEQUENCE.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&content[last..whole.start()]);
        last = whole.end();

        if &caps[2] != "m" {
            continue;
        }
        match classify_sgr(&caps[1]) {
            Sgr::Color(color) => {
                out.push_str(r#"<span style="color: "#);
                out.push_str(color);
                out.push_str(r#";">"#);
                open_spans += 1;
            }
            Sgr::Reset => {
                for _ in 0..open_spans {
                    out.push_str("</span>");
                }
                open_spans = 0;
            }
            Sgr::Ignored => {}
        }
    }
    out.push_str(&content[last..]);
    for _ in 0..open_spans {
        out.push_str("</span>");
    }

    // Lone ESC bytes that were not part of a sequence.
    if out.contains('\x1b') {
        out = out.replace('\x1b', "");
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_renders_empty() {
        assert_eq!(render_line("", 3), "");
        assert_eq!(render_line("\r\n", 3), "");
        assert_eq!(render_line("   ", 0), "");
    }

    #[test]
    fn test_positive_offset_shifts_forward() {
        let out = render_line("2024/01/01 10:00:00 [INFO] x", 3);
        assert!(out.contains("2024/01/01 13:00:00"), "{out}");
        assert!(!out.contains("10:00:00"));
    }

    #[test]
    fn test_negative_offset_shifts_backward() {
        let out = render_line("2024/01/01 10:00:00 [INFO] x", -3);
        assert!(out.contains("2024/01/01 07:00:00"), "{out}");
    }

    #[test]
    fn test_zero_offset_keeps_stamp_and_normalizes_level() {
        let out = render_line("2024/01/01 10:00:00 [Info] x", 0);
        assert!(out.contains("2024/01/01 10:00:00"));
        assert!(out.contains(r#"data-filter="INFO">INFO</span>"#), "{out}");
        assert!(!out.contains("[Info]"));
    }

    #[test]
    fn test_shift_crosses_day_boundary() {
        let out = render_line("2024/12/31 23:30:00 [Warning] late", 1);
        assert!(out.contains("2025/01/01 00:30:00"), "{out}");
        assert!(out.contains("log-badge-warn"));
        assert!(out.contains(">WARN</span>"));
    }

    #[test]
    fn test_fractional_seconds_preserved() {
        let out = shift_timestamps("2024/01/01 10:00:00.123456 [Info] x", 2);
        assert_eq!(out, "2024/01/01 12:00:00.123456 [Info] x");
    }

    #[test]
    fn test_invalid_stamp_passes_through() {
        let out = shift_timestamps("2024/13/45 10:00:00 [Info] x", 5);
        assert_eq!(out, "2024/13/45 10:00:00 [Info] x");
    }

    #[test]
    fn test_mihomo_line_is_restructured() {
        let raw = r#"time="2024-01-01T10:00:00.123456789Z" level=warning msg="dial failed""#;
        let out = shift_timestamps(raw, 3);
        assert_eq!(out, "2024/01/01 13:00:00.123456 [WARN] dial failed");
    }

    #[test]
    fn test_mihomo_line_with_zero_offset() {
        let raw = r#"time="2024-01-01T10:00:00Z" level=info msg="started""#;
        let out = shift_timestamps(raw, 0);
        assert_eq!(out, "2024/01/01 10:00:00.000000 [INFO] started");

        let rendered = render_line(raw, 0);
        assert!(rendered.contains("log-badge-info"));
    }

    #[test]
    fn test_bare_level_word_is_badged_once() {
        let out = render_line("core ERROR something ERROR again", 0);
        assert_eq!(out.matches("log-badge-error").count(), 1, "{out}");
    }

    #[test]
    fn test_unbadged_line() {
        let out = render_line("from 1.2.3.4:5 accepted tcp:example.com:443", 0);
        assert!(!out.contains("log-badge"));
        assert!(out.starts_with(r#"<div class="log-line">"#));
        assert!(out.ends_with("</div>"));
    }

    #[test]
    fn test_html_is_escaped() {
        let out = render_line("accepted [socks >> direct] <script>", 0);
        assert!(out.contains("[socks &gt;&gt; direct]"));
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
    }

    #[test]
    fn test_ansi_palette() {
        let out = render_line("\x1b[32mok\x1b[0m \x1b[91mbad\x1b[0m \x1b[96minfo\x1b[0m", 0);
        assert!(out.contains(r#"<span style="color: #00cc00;">ok</span>"#), "{out}");
        assert!(out.contains(r#"<span style="color: #ef4444;">bad</span>"#));
        assert!(out.contains(r#"<span style="color: #8BCEF7;">info</span>"#));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_colored_level_word_is_badged() {
        let out = render_line("\x1b[31mERROR\x1b[0m dial failed", 0);
        assert!(out.contains("log-badge-error"), "{out}");
        assert!(
            out.contains(r#"<span style="color: #ef4444;"><span class="log-badge log-badge-error""#),
            "{out}"
        );
        assert!(out.ends_with("</span></span> dial failed</div>"), "{out}");

        let bracketed = render_line("\x1b[33m[Warning]\x1b[0m slow", 0);
        assert!(bracketed.contains(">WARN</span>"), "{bracketed}");
    }

    #[test]
    fn test_unknown_escapes_are_stripped() {
        let out = render_line("\x1b[1mbold\x1b[K plain\x1b[35m", 0);
        assert_eq!(out, r#"<div class="log-line">bold plain</div>"#);
    }

    #[test]
    fn test_unclosed_color_is_closed() {
        let out = render_line("\x1b[33mwarning text", 0);
        assert_eq!(
            out,
            r#"<div class="log-line"><span style="color: #f59e0b;">warning text</span></div>"#
        );
    }

    #[test]
    fn test_stray_reset_is_dropped() {
        let out = render_line("plain\x1b[0m text", 0);
        assert_eq!(out, r#"<div class="log-line">plain text</div>"#);
    }

    #[test]
    fn test_normalize_levels_for_filtering() {
        assert_eq!(
            normalize_levels("2024/01/01 10:00:01 [Error] b"),
            "2024/01/01 10:00:01 [ERROR] b"
        );
        assert_eq!(normalize_levels("[Warning] w"), "[WARN] w");
        assert_eq!(
            normalize_levels(r#"time="x" level=error msg="y""#),
            r#"time="x" level=ERROR msg="y""#
        );
        assert!(matches!(normalize_levels("nothing here"), Cow::Borrowed(_)));
    }
}
