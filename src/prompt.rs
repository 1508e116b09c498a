//! Builds the text prompt sent to the AI provider from a guest's
//! questionnaire answers and the menu.

use crate::menu::MenuCatalog;
use log::debug;
use serde::Deserialize;
use std::fmt::Write;
use std::str::FromStr;
use thiserror::Error;

const PREAMBLE: &str = "You are a helpful AI assistant for \"The AR Eatery\" restaurant. \
Your only job is to suggest meals from our menu based on the customer's preferences. \
Do not answer any questions that are not about our food or restaurant. \
If asked about anything else, politely decline and steer the conversation back to our menu.";

/// Categories that are only sent to the model when the guest asked for them.
const OPTIONAL_SECTIONS: [&str; 2] = ["Starters", "Drinks"];

const RESPONSE_FORMAT: &str = "Respond with a single JSON object and nothing else. \
The object must have a key \"suggestions\" holding an array of objects, each with a \"name\" \
(written exactly as it appears on the menu) and a \"reason\". For example:\n\
{\"suggestions\": [{\"name\": \"Chef's Special Thali\", \"reason\": \"A little of everything, mildly spiced to suit your tolerance.\"}]}";

/// Questionnaire answers, as submitted by the suggestion form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub people: u32,
    pub fav_foods: String,
    pub diet: String,
    pub courses: Vec<String>,
    pub budget: String,
    pub restrictions: String,
    pub spice: String,
}

impl Preferences {
    fn wants_course(&self, course: &str) -> bool {
        self.courses.iter().any(|c| c.trim().eq_ignore_ascii_case(course))
    }

    /// The answers as questionnaire fields, in form order. `courses` repeats.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("people", self.people.to_string()),
            ("favFoods", self.fav_foods.clone()),
            ("diet", self.diet.clone()),
        ];
        fields.extend(self.courses.iter().map(|course| ("courses", course.clone())));
        fields.extend([
            ("budget", self.budget.clone()),
            ("restrictions", self.restrictions.clone()),
            ("spice", self.spice.clone()),
        ]);
        fields
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("'people' must be a whole number, got '{0}'")]
    People(String),
}

/// A posted questionnaire (`application/x-www-form-urlencoded`).
#[derive(Debug, Clone, Default)]
pub struct MealForm {
    pub preferences: Preferences,
    pub reroll: bool,
}

impl MealForm {
    pub fn parse(body: &[u8]) -> Result<Self, FormError> {
        let mut prefs = Preferences::default();
        let mut reroll = false;

        for (key, value) in url::form_urlencoded::parse(body) {
            match &*key {
                "people" => {
                    let people = value.trim();
                    prefs.people = if people.is_empty() {
                        0
                    } else {
                        people.parse().map_err(|_| FormError::People(value.to_string()))?
                    };
                }
                "favFoods" => prefs.fav_foods = value.into_owned(),
                "diet" => prefs.diet = value.into_owned(),
                "courses" => prefs.courses.push(value.into_owned()),
                "budget" => prefs.budget = value.into_owned(),
                "restrictions" => prefs.restrictions = value.into_owned(),
                "spice" => prefs.spice = value.into_owned(),
                "reroll" => reroll = matches!(&*value, "true" | "1" | "on"),
                other => debug!("Ignoring unknown form field '{}'", other),
            }
        }

        Ok(Self {
            preferences: prefs,
            reroll,
        })
    }
}

/// How the prompt tells the model to size the meal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PortionGuidance {
    /// Natural-language pairing rules (one main per person, gravies with breads).
    #[default]
    PairingRules,
    /// A fixed number of dishes derived from the party size.
    ItemCount,
}

impl FromStr for PortionGuidance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pairing" | "rules" => Ok(PortionGuidance::PairingRules),
            "count" | "item_count" => Ok(PortionGuidance::ItemCount),
            other => Err(format!("unknown portion guidance '{}'", other)),
        }
    }
}

/// Two dishes per guest, never fewer than 2 or more than 10.
pub fn target_item_count(people: u32) -> u32 {
    people.saturating_mul(2).clamp(2, 10)
}

/// Fresh token for "try another combination" requests.
pub fn new_nonce() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub struct PromptBuilder<'a> {
    catalog: &'a MenuCatalog,
    guidance: PortionGuidance,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(catalog: &'a MenuCatalog) -> Self {
        Self {
            catalog,
            guidance: PortionGuidance::default(),
        }
    }

    pub fn with_guidance(mut self, guidance: PortionGuidance) -> Self {
        self.guidance = guidance;
        self
    }

    /// The menu as the model sees it: optional sections the guest did not
    /// select are dropped, including when nothing was selected.
    fn menu_for(&self, prefs: &Preferences) -> MenuCatalog {
        let skipped: Vec<&str> = OPTIONAL_SECTIONS
            .iter()
            .copied()
            .filter(|section| !prefs.wants_course(section))
            .collect();
        self.catalog.without(&skipped)
    }

    pub fn build(&self, prefs: &Preferences, nonce: Option<&str>) -> Result<String, serde_json::Error> {
        let menu = serde_json::to_string_pretty(&self.menu_for(prefs))?;

        let mut prompt = format!(
            "{}\n\nHere is our menu:\n{}\n\nA customer has the following preferences:\n",
            PREAMBLE, menu
        );

        let courses = if prefs.courses.is_empty() {
            "Not specified".to_string()
        } else {
            prefs.courses.join(", ")
        };

        // Writing to a String cannot fail.
        let _ = writeln!(prompt, "- Number of people: {}", prefs.people);
        let _ = writeln!(
            prompt,
            "- Favorite foods or flavors: {}",
            or_default(&prefs.fav_foods, "Not specified")
        );
        let _ = writeln!(prompt, "- Dietary preference: {}", prefs.diet);
        let _ = writeln!(prompt, "- Desired courses: {}", courses);
        let _ = writeln!(prompt, "- Budget: {}", prefs.budget);
        let _ = writeln!(
            prompt,
            "- Dietary restrictions: {}",
            or_default(&prefs.restrictions, "None")
        );
        let _ = writeln!(prompt, "- Spice level tolerance: {}", prefs.spice);
        prompt.push('\n');

        match self.guidance {
            PortionGuidance::PairingRules => {
                prompt.push_str(
                    "Follow these portion rules:\n\
                     - Suggest one main course per person.\n\
                     - One gravy dish serves two people.\n\
                     - Every gravy dish must be paired with a bread or rice item.\n\
                     - Any item from the breads section must be paired with an item from the gravies section.\n",
                );
            }
            PortionGuidance::ItemCount => {
                let _ = writeln!(
                    prompt,
                    "Suggest exactly {} items from the menu.",
                    target_item_count(prefs.people)
                );
            }
        }

        if let Some(nonce) = nonce {
            let _ = writeln!(
                prompt,
                "This is a repeat request (variation {}). Suggest a different combination than before.",
                nonce
            );
        }

        prompt.push('\n');
        prompt.push_str(RESPONSE_FORMAT);
        Ok(prompt)
    }
}

fn or_default<'s>(value: &'s str, default: &'s str) -> &'s str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}
