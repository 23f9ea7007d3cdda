//! `{{.Variable}}` substitution (§4.9). Deliberately not a general template
//! engine: the grammar is one production — a dotted variable reference
//! inside double braces — so a single-pass scan is enough and keeps this
//! crate dependency-free beyond serde.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Substitutes every `{{.Key}}` occurrence in `template` with its value from
/// `variables`, or leaves the placeholder untouched if `Key` is absent —
/// an unknown variable is a preview-time mistake, not a rendering error.
#[must_use]
pub fn substitute(template: &str, variables: &HashMap<String, String>) -> String {
    let mut output = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if template[i..].starts_with("{{.") {
            if let Some(end) = template[i..].find("}}") {
                let key = &template[i + 3..i + end];
                match variables.get(key) {
                    Some(value) => output.push_str(value),
                    None => output.push_str(&template[i..i + end + 2]),
                }
                i += end + 2;
                continue;
            }
        }
        let ch = template[i..].chars().next().expect("i is a valid char boundary");
        output.push(ch);
        i += ch.len_utf8();
    }
    output
}

#[must_use]
pub fn render(subject_template: &str, html_template: &str, variables: &HashMap<String, String>) -> RenderedEmail {
    RenderedEmail {
        subject: substitute(subject_template, variables),
        html: substitute(html_template, variables),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_a_known_variable() {
        let mut vars = HashMap::new();
        vars.insert("Name".to_string(), "Ada".to_string());
        assert_eq!(substitute("Hi {{.Name}}!", &vars), "Hi Ada!");
    }

    #[test]
    fn leaves_unknown_placeholder_untouched() {
        let vars = HashMap::new();
        assert_eq!(substitute("Hi {{.Name}}!", &vars), "Hi {{.Name}}!");
    }

    #[test]
    fn substitutes_multiple_occurrences() {
        let mut vars = HashMap::new();
        vars.insert("X".to_string(), "1".to_string());
        assert_eq!(substitute("{{.X}}-{{.X}}", &vars), "1-1");
    }

    #[test]
    fn render_fills_in_both_subject_and_html() {
        let mut vars = HashMap::new();
        vars.insert("Name".to_string(), "Ada".to_string());
        let rendered = render("Hi {{.Name}}", "<p>{{.Name}}</p>", &vars);
        assert_eq!(rendered.subject, "Hi Ada");
        assert_eq!(rendered.html, "<p>Ada</p>");
    }

    #[test]
    fn passes_through_text_with_no_placeholders() {
        let vars = HashMap::new();
        assert_eq!(substitute("plain text", &vars), "plain text");
    }
}
