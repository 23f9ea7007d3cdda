//! The preview endpoint's pure core (§4.9): render a candidate subject/body
//! against a variable map with no side effects. `ayb-server` wraps this in
//! the debounced admin-UI endpoint; this function never touches the database.

use crate::render::{render, RenderedEmail};
use std::collections::HashMap;

#[must_use]
pub fn preview(subject_template: &str, html_template: &str, variables: &HashMap<String, String>) -> RenderedEmail {
    render(subject_template, html_template, variables)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_has_no_side_effects_and_is_pure() {
        let mut vars = HashMap::new();
        vars.insert("Name".to_string(), "Ada".to_string());
        let first = preview("Hi {{.Name}}", "<p>{{.Name}}</p>", &vars);
        let second = preview("Hi {{.Name}}", "<p>{{.Name}}</p>", &vars);
        assert_eq!(first.subject, second.subject);
        assert_eq!(first.html, second.html);
    }
}
