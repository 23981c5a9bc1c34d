//! Element queries shared by every driver.

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath has no escape sequences, so text holding both quote kinds is
/// spliced together with `concat()`.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }

    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// XPath matching a link whose text contains `text`.
pub fn link_containing_text(text: &str) -> String {
    format!("//a[contains(text(), {})]", xpath_literal(text))
}

/// CSS selector matching an element by id.
///
/// Uses an attribute selector so ids need no CSS identifier escaping.
pub fn id_selector(id: &str) -> String {
    format!("[id=\"{}\"]", id.replace('\\', "\\\\").replace('"', "\\\""))
}
