//! Minimal HTML rendering.
//!
//! Page layout and styling are out of scope; these helpers exist so the
//! handlers never concatenate unescaped user input into markup, and so the
//! badge vocabulary stays in one place.

/// HTML-entity-encode user-supplied text.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// CSS class for a status-like value. Unknown values fall back to the
/// neutral badge rather than erroring.
pub fn badge_class(value: &str) -> &'static str {
    match value {
        "Interested" | "Completed" | "Approved" => "badge-success",
        "Follow-up Required" | "On Hold" | "Submitted" => "badge-warning",
        "Not Interested" | "Cancelled" | "Rejected" | "Urgent" => "badge-danger",
        "Callback Requested" | "In Progress" => "badge-info",
        _ => "badge-secondary",
    }
}

pub fn badge(value: &str) -> String {
    format!(
        "<span class=\"badge {}\">{}</span>",
        badge_class(value),
        escape(value)
    )
}

/// Bare document shell with an optional flash banner.
pub fn page(title: &str, flash: Option<&str>, body: &str) -> String {
    let banner = flash
        .map(|message| format!("<div class=\"flash\">{}</div>\n", escape(message)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html><head><title>{}</title></head><body>\n{banner}{body}\n</body></html>",
        escape(title)
    )
}

pub fn error_list(errors: &[String]) -> String {
    let items: String = errors
        .iter()
        .map(|e| format!("<li>{}</li>", escape(e)))
        .collect();
    format!("<ul class=\"errors\">{items}</ul>")
}

/// Definition list for a view page. Values arrive pre-rendered (badges) or
/// raw; `raw` controls whether escaping is applied.
pub fn detail_rows(pairs: &[(&str, String, bool)]) -> String {
    let rows: String = pairs
        .iter()
        .map(|(label, value, raw)| {
            let value = if *raw { value.clone() } else { escape(value) };
            format!("<dt>{}</dt><dd>{}</dd>", escape(label), value)
        })
        .collect();
    format!("<dl>{rows}</dl>")
}

/// Re-render a submitted form with its accumulated errors and the values
/// the user typed, so nothing is lost on a validation failure.
pub fn form_page(title: &str, action: &str, errors: &[String], fields: &[(&str, String)]) -> String {
    let inputs: String = fields
        .iter()
        .map(|(name, value)| {
            format!(
                "<label>{name}<input name=\"{name}\" value=\"{}\"></label>\n",
                escape(value)
            )
        })
        .collect();
    let body = format!(
        "{}\n<form method=\"post\" action=\"{}\" enctype=\"multipart/form-data\">\n{inputs}<button type=\"submit\">Save</button>\n</form>",
        error_list(errors),
        escape(action)
    );
    page(title, None, &body)
}

pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let head: String = headers
        .iter()
        .map(|h| format!("<th>{}</th>", escape(h)))
        .collect();
    let body: String = rows
        .iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", escape(cell)))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();
    format!("<table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_the_dangerous_five() {
        assert_eq!(
            escape("<b>\"Tom\" & 'Co'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Co&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn interested_maps_to_the_success_badge() {
        assert_eq!(badge_class("Interested"), "badge-success");
        assert_eq!(
            badge("Interested"),
            "<span class=\"badge badge-success\">Interested</span>"
        );
    }

    #[test]
    fn badge_vocabulary() {
        assert_eq!(badge_class("Follow-up Required"), "badge-warning");
        assert_eq!(badge_class("Not Interested"), "badge-danger");
        assert_eq!(badge_class("No Answer"), "badge-secondary");
        assert_eq!(badge_class("Callback Requested"), "badge-info");
        assert_eq!(badge_class("Something New"), "badge-secondary");
    }

    #[test]
    fn flash_banner_is_escaped() {
        let html = page("Calls", Some("Saved <ok>"), "<p>x</p>");
        assert!(html.contains("<div class=\"flash\">Saved &lt;ok&gt;</div>"));
    }

    #[test]
    fn table_escapes_cells() {
        let html = table(&["title"], &[vec!["<script>".to_string()]]);
        assert!(html.contains("<td>&lt;script&gt;</td>"));
    }
}
