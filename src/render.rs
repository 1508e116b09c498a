//! Turns the model's answer into something a guest can read.

use crate::prompt::Preferences;
use crate::utils::escape_html;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Where the questionnaire and the re-roll control post to.
pub const SUGGEST_PAGE_PATH: &str = "/suggest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionList {
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Error)]
pub enum RenderParseError {
    #[error("suggestion text is not the expected JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("suggestion list is empty")]
    Empty,
}

/// What ends up on screen: the parsed list, or the model's text as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    List(Vec<Suggestion>),
    Raw(String),
}

/// Drop a surrounding ```` ```json ```` fence. Text without one is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix(JSON_FENCE) {
        Some(rest) => {
            let rest = rest.strip_suffix(FENCE).unwrap_or(rest);
            rest.trim()
        }
        None => trimmed,
    }
}

pub fn parse_suggestions(text: &str) -> Result<Vec<Suggestion>, RenderParseError> {
    let list: SuggestionList = serde_json::from_str(strip_code_fence(text))?;
    if list.suggestions.is_empty() {
        return Err(RenderParseError::Empty);
    }
    Ok(list.suggestions)
}

/// Never fails: anything that does not parse is shown verbatim.
pub fn interpret(text: &str) -> Rendered {
    match parse_suggestions(text) {
        Ok(suggestions) => Rendered::List(suggestions),
        Err(e) => {
            warn!("Falling back to raw suggestion text: {}", e);
            Rendered::Raw(text.to_string())
        }
    }
}

impl Rendered {
    pub fn suggestions(&self) -> &[Suggestion] {
        match self {
            Rendered::List(suggestions) => suggestions,
            Rendered::Raw(_) => &[],
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Rendered::List(_) => None,
            Rendered::Raw(text) => Some(text),
        }
    }

    /// Result fragment for the suggestion panel, ending with the re-roll
    /// control, which resubmits `prefs` asking for a new combination.
    pub fn to_html(&self, prefs: &Preferences) -> String {
        let mut html = String::from("<div class=\"ai-result\">");
        match self {
            Rendered::List(suggestions) => {
                html.push_str("<ul class=\"suggestions\">");
                for suggestion in suggestions {
                    let _ = write!(
                        html,
                        "<li><strong>{}</strong>: {}</li>",
                        escape_html(&suggestion.name),
                        escape_html(&suggestion.reason)
                    );
                }
                html.push_str("</ul>");
            }
            Rendered::Raw(text) => {
                let _ = write!(html, "<p class=\"raw-suggestion\">{}</p>", escape_html(text));
            }
        }
        reroll_form(&mut html, prefs);
        html.push_str("</div>");
        html
    }
}

/// Panel content when no suggestion could be produced.
pub fn failure_html(message: &str) -> String {
    format!(
        "<div class=\"ai-result\"><p class=\"ai-error\">Sorry, I was unable to get a suggestion. {}</p></div>",
        escape_html(message)
    )
}

fn reroll_form(html: &mut String, prefs: &Preferences) {
    let _ = write!(
        html,
        "<form class=\"reroll-form\" method=\"post\" action=\"{}\">",
        SUGGEST_PAGE_PATH
    );
    for (name, value) in prefs.form_fields() {
        let _ = write!(
            html,
            "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
            name,
            escape_html(&value)
        );
    }
    html.push_str(
        "<input type=\"hidden\" name=\"reroll\" value=\"true\">\
         <button type=\"submit\" class=\"retry-button\">Try another combination</button></form>",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fenced_payload_parses() {
        let text = "```json\n{\"suggestions\":[{\"name\":\"X\",\"reason\":\"Y\"}]}\n```";
        let suggestions = parse_suggestions(text).unwrap();
        assert_eq!(
            suggestions,
            vec![Suggestion {
                name: "X".to_string(),
                reason: "Y".to_string()
            }]
        );
    }

    #[test]
    fn bare_json_parses() {
        let text = r#"  {"suggestions": [{"name": "Dal Makhani", "reason": "Rich"}, {"name": "Butter Naan", "reason": "Pairs with dal"}]}  "#;
        assert_eq!(parse_suggestions(text).unwrap().len(), 2);
    }

    #[test]
    fn strip_leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fence("  hello "), "hello");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "```\n{}\n```");
    }

    #[test]
    fn prose_falls_back_to_raw() {
        let text = "I recommend the Paneer Tikka followed by Dal Makhani.";
        assert_eq!(interpret(text), Rendered::Raw(text.to_string()));
    }

    #[test]
    fn assorted_non_json_falls_back_without_panicking() {
        let inputs = [
            "",
            "```json",
            "```json\n```",
            "{",
            "}{",
            "[1, 2, 3]",
            "{\"suggestions\": \"none\"}",
            "{\"other\": []}",
            "```json\nnot json\n```",
            "naïve 🌶️ text",
        ];
        for input in inputs {
            assert_eq!(interpret(input), Rendered::Raw(input.to_string()), "input {:?}", input);
        }
    }

    proptest! {
        #[test]
        fn text_without_json_brackets_is_shown_raw(text in "[^{}\\[\\]]{0,200}") {
            prop_assert_eq!(interpret(&text), Rendered::Raw(text.clone()));
        }

        #[test]
        fn fenced_text_without_json_brackets_is_shown_raw(body in "[^{}\\[\\]]{0,200}") {
            let text = format!("```json\n{}\n```", body);
            prop_assert_eq!(interpret(&text), Rendered::Raw(text.clone()));
        }
    }

    #[test]
    fn empty_list_falls_back_to_raw() {
        let text = r#"{"suggestions": []}"#;
        assert!(matches!(parse_suggestions(text), Err(RenderParseError::Empty)));
        assert_eq!(interpret(text).raw(), Some(text));
    }

    fn guest() -> Preferences {
        Preferences {
            people: 2,
            fav_foods: "\"smoky\" dal".to_string(),
            diet: "Vegetarian".to_string(),
            courses: vec!["Starters".to_string(), "Drinks".to_string()],
            budget: "Moderate".to_string(),
            restrictions: String::new(),
            spice: "Mild".to_string(),
        }
    }

    #[test]
    fn reroll_control_resubmits_the_same_answers() {
        let html = Rendered::Raw("anything".to_string()).to_html(&guest());
        assert!(html.contains("<form class=\"reroll-form\" method=\"post\" action=\"/suggest\">"));
        assert!(html.contains("<input type=\"hidden\" name=\"people\" value=\"2\">"));
        assert!(html.contains("<input type=\"hidden\" name=\"favFoods\" value=\"&quot;smoky&quot; dal\">"));
        assert_eq!(html.matches("name=\"courses\"").count(), 2);
        assert!(html.contains("<input type=\"hidden\" name=\"reroll\" value=\"true\">"));
        assert!(html.contains("<button type=\"submit\" class=\"retry-button\">Try another combination</button>"));
    }

    #[test]
    fn failure_notice_is_escaped() {
        let html = failure_html("Failed <here>.");
        assert!(html.contains("<p class=\"ai-error\">Sorry, I was unable to get a suggestion. Failed &lt;here&gt;.</p>"));
    }

    #[test]
    fn list_renders_emphasized_names_and_reasons() {
        let rendered = Rendered::List(vec![Suggestion {
            name: "Dal <Makhani>".to_string(),
            reason: "Smoky & rich".to_string(),
        }]);
        let html = rendered.to_html(&guest());
        assert!(html.contains("<li><strong>Dal &lt;Makhani&gt;</strong>: Smoky &amp; rich</li>"));
        assert!(html.contains("Try another combination"));
    }

    #[test]
    fn raw_text_renders_verbatim_but_escaped() {
        let html = Rendered::Raw("Eat <b>everything</b>".to_string()).to_html(&guest());
        assert!(html.contains("<p class=\"raw-suggestion\">Eat &lt;b&gt;everything&lt;/b&gt;</p>"));
        assert!(!html.contains("<ul"));
    }
}
