//! WhatsApp markup conversion.

use std::sync::LazyLock;

use regex::Regex;

/// `【...】` citation spans, matched lazily so adjacent spans stay separate.
static DECORATIVE_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"【.*?】").expect("valid bracket regex"));

/// Markdown-style `**bold**`.
static DOUBLE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("valid bold regex"));

/// Rewrite internal markup into WhatsApp's dialect.
///
/// Drops `【...】` spans, trims the result, then turns `**x**` into `*x*`.
pub fn format_for_whatsapp(text: &str) -> String {
    let without_brackets = DECORATIVE_BRACKETS.replace_all(text, "");
    DOUBLE_BOLD
        .replace_all(without_brackets.trim(), "*$1*")
        .into_owned()
}
