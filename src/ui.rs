//! Server-rendered menu page.
//!
//! The page is a function of the catalog, a [`ViewState`] and the
//! [`AssistantPanel`]. The view state travels in the query string. Every card,
//! AR button, close button and swipe arrow links to the state its click
//! leads to. The questionnaire posts to the suggestion page.

use crate::menu::{MenuCatalog, MenuItem};
use crate::prompt::Preferences;
use crate::render::SUGGEST_PAGE_PATH;
use crate::utils::escape_html;
use serde::Deserialize;
use std::fmt::Write;

const MODEL_VIEWER_SCRIPT: &str =
    "https://ajax.googleapis.com/ajax/libs/model-viewer/3.4.0/model-viewer.min.js";

const CURRENCY: &str = "₹";

const DIETS: [&str; 3] = ["Vegetarian", "Non-Vegetarian", "Vegan"];
const BUDGETS: [&str; 3] = ["Low", "Moderate", "High"];
const SPICE_LEVELS: [&str; 3] = ["Mild", "Medium", "Hot"];

/// The AI assistant section: the guest's last answers prefill the
/// questionnaire, and `result` is the rendered suggestion fragment.
#[derive(Debug, Default)]
pub struct AssistantPanel {
    pub answers: Preferences,
    pub result: Option<String>,
}

/// Which overlay is showing. Items are addressed by their flat catalog index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Closed,
    Details(usize),
    Ar(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    /// Next model.
    Left,
    /// Previous model.
    Right,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub details: Option<usize>,
    pub ar: Option<usize>,
}

impl ViewState {
    /// State from the query string. Unknown items, or AR on an item without
    /// a model, land on `Closed`.
    pub fn from_query(query: &ViewQuery, catalog: &MenuCatalog) -> Self {
        match (query.ar, query.details) {
            (Some(index), _) if catalog.item(index).is_some_and(MenuItem::has_model) => ViewState::Ar(index),
            (None, Some(index)) if index < catalog.len() => ViewState::Details(index),
            _ => ViewState::Closed,
        }
    }

    pub fn to_query(self) -> String {
        match self {
            ViewState::Closed => String::new(),
            ViewState::Details(index) => format!("details={}", index),
            ViewState::Ar(index) => format!("ar={}", index),
        }
    }

    pub fn href(self) -> String {
        match self {
            ViewState::Closed => "/".to_string(),
            other => format!("/?{}", other.to_query()),
        }
    }

    /// Card click: opens this item's panel, closing any other; a second
    /// click on the open item collapses it.
    pub fn click_item(self, index: usize) -> Self {
        match self {
            ViewState::Details(open) if open == index => ViewState::Closed,
            _ => ViewState::Details(index),
        }
    }

    pub fn open_ar(self, catalog: &MenuCatalog) -> Self {
        match self {
            ViewState::Details(index) if catalog.item(index).is_some_and(MenuItem::has_model) => {
                ViewState::Ar(index)
            }
            other => other,
        }
    }

    pub fn close(self) -> Self {
        ViewState::Closed
    }

    /// Move the AR viewer along the items that have models, wrapping at both ends.
    pub fn swipe(self, direction: Swipe, catalog: &MenuCatalog) -> Self {
        let ViewState::Ar(current) = self else {
            return self;
        };
        let gallery = model_gallery(catalog);
        let Some(position) = gallery.iter().position(|&index| index == current) else {
            return self;
        };
        let len = gallery.len();
        let next = match direction {
            Swipe::Left => (position + 1) % len,
            Swipe::Right => (position + len - 1) % len,
        };
        ViewState::Ar(gallery[next])
    }

    pub fn expanded_item(self) -> Option<usize> {
        match self {
            ViewState::Details(index) => Some(index),
            _ => None,
        }
    }

    /// Model currently bound to the viewer. `None` unless the AR overlay is open.
    pub fn model_in_view(self, catalog: &MenuCatalog) -> Option<&str> {
        match self {
            ViewState::Ar(index) => catalog.item(index).and_then(|item| item.model_url.as_deref()),
            _ => None,
        }
    }
}

/// Flat indices of the items that can be shown in AR.
fn model_gallery(catalog: &MenuCatalog) -> Vec<usize> {
    catalog
        .items()
        .enumerate()
        .filter(|(_, item)| item.has_model())
        .map(|(index, _)| index)
        .collect()
}

pub struct CardView<'a> {
    pub index: usize,
    pub item: &'a MenuItem,
    pub expanded: bool,
    pub href: String,
}

pub struct SectionView<'a> {
    pub id: String,
    pub title: &'a str,
    pub cards: Vec<CardView<'a>>,
}

fn section_id(category: &str) -> String {
    category
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(['(', ')'], "")
}

/// One section per category, one card per item, both in catalog order.
pub fn layout(catalog: &MenuCatalog, state: ViewState) -> Vec<SectionView<'_>> {
    let mut index = 0;
    catalog
        .categories()
        .iter()
        .map(|category| SectionView {
            id: section_id(&category.name),
            title: &category.name,
            cards: category
                .items
                .iter()
                .map(|item| {
                    let card = CardView {
                        index,
                        item,
                        expanded: state.expanded_item() == Some(index),
                        href: state.click_item(index).href(),
                    };
                    index += 1;
                    card
                })
                .collect(),
        })
        .collect()
}

pub fn render_page(catalog: &MenuCatalog, state: ViewState, panel: &AssistantPanel) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>The AR Eatery</title>\
         <script type=\"module\" src=\"{}\"></script></head><body>",
        MODEL_VIEWER_SCRIPT
    );

    let sections = layout(catalog, state);

    html.push_str("<nav class=\"floating-nav\"><ul>");
    for section in &sections {
        let _ = write!(
            html,
            "<li><a href=\"#{}\">{}</a></li>",
            escape_html(&section.id),
            escape_html(section.title)
        );
    }
    html.push_str("</ul></nav><main id=\"menu-container\">");

    for section in &sections {
        let _ = write!(
            html,
            "<section class=\"menu-category\" id=\"{}\"><h2>{}</h2><div class=\"menu-grid\">",
            escape_html(&section.id),
            escape_html(section.title)
        );
        for card in &section.cards {
            render_card(&mut html, card, state, catalog);
        }
        html.push_str("</div></section>");
    }
    html.push_str("</main>");

    render_assistant(&mut html, catalog, panel);

    if let ViewState::Ar(index) = state {
        if let Some(item) = catalog.item(index) {
            render_ar_overlay(&mut html, item, state, catalog);
        }
    }

    html.push_str("</body></html>");
    html
}

fn render_card(html: &mut String, card: &CardView<'_>, state: ViewState, catalog: &MenuCatalog) {
    let item = card.item;
    let class = if card.expanded { "menu-item expanded" } else { "menu-item" };
    let _ = write!(
        html,
        "<article class=\"{}\" id=\"item-{}\"><a class=\"menu-item-link\" href=\"{}\">",
        class,
        card.index,
        escape_html(&card.href)
    );
    if let Some(image) = &item.image_url {
        let _ = write!(
            html,
            "<img src=\"{}\" alt=\"{}\">",
            escape_html(image),
            escape_html(&item.name)
        );
    }
    let _ = write!(
        html,
        "<div class=\"menu-item-content\"><h3>{}</h3><p class=\"menu-item-price\">{}{}</p></div></a>",
        escape_html(&item.name),
        CURRENCY,
        escape_html(&item.price.to_string())
    );

    if card.expanded {
        let _ = write!(
            html,
            "<div class=\"item-details\"><p class=\"description\">{}</p><ul class=\"ingredients\">",
            escape_html(&item.description)
        );
        for ingredient in &item.ingredients {
            let _ = write!(html, "<li>{}</li>", escape_html(ingredient));
        }
        html.push_str("</ul><p class=\"nutrition\">");
        for (label, value) in &item.nutritional_value {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = write!(
                html,
                "<span><strong>{}:</strong> {}</span> ",
                escape_html(&capitalize(label)),
                escape_html(&value)
            );
        }
        html.push_str("</p>");
        if item.has_model() {
            let _ = write!(
                html,
                "<a class=\"ar-button\" href=\"{}\">View in AR</a>",
                escape_html(&state.open_ar(catalog).href())
            );
        }
        html.push_str("</div>");
    }
    html.push_str("</article>");
}

fn render_ar_overlay(html: &mut String, item: &MenuItem, state: ViewState, catalog: &MenuCatalog) {
    let model = state.model_in_view(catalog).unwrap_or_default();
    let _ = write!(
        html,
        "<div id=\"ar-modal\" class=\"modal\"><div class=\"modal-content\">\
         <a class=\"close-button\" href=\"{}\">&times;</a>\
         <model-viewer src=\"{}\" alt=\"{}\" ar camera-controls auto-rotate></model-viewer>\
         <h3 id=\"ar-item-name\">{}</h3><p id=\"ar-item-description\">{}</p>\
         <a class=\"swipe swipe-prev\" href=\"{}\">&lsaquo;</a>\
         <a class=\"swipe swipe-next\" href=\"{}\">&rsaquo;</a>\
         </div></div>",
        escape_html(&state.close().href()),
        escape_html(model),
        escape_html(&item.name),
        escape_html(&item.name),
        escape_html(&item.description),
        escape_html(&state.swipe(Swipe::Right, catalog).href()),
        escape_html(&state.swipe(Swipe::Left, catalog).href()),
    );
}

fn render_assistant(html: &mut String, catalog: &MenuCatalog, panel: &AssistantPanel) {
    let answers = &panel.answers;
    let people = answers.people.max(1);

    let _ = write!(
        html,
        "<a id=\"ai-assistant-btn\" class=\"ai-assistant-btn\" href=\"#ai-modal\">Ask our AI</a>\
         <section id=\"ai-modal\" class=\"ai-assistant\"><h2>Need a suggestion?</h2>\
         <form id=\"ai-questionnaire\" method=\"post\" action=\"{}\">\
         <label for=\"ai-people\">Number of people</label>\
         <input type=\"number\" id=\"ai-people\" name=\"people\" min=\"1\" value=\"{}\">\
         <label for=\"ai-fav-foods\">Favorite foods or flavors</label>\
         <input type=\"text\" id=\"ai-fav-foods\" name=\"favFoods\" value=\"{}\">",
        SUGGEST_PAGE_PATH,
        people,
        escape_html(&answers.fav_foods)
    );

    choice_group(html, "Diet", "diet", &DIETS, picked_or(&answers.diet, DIETS[0]));

    html.push_str("<fieldset><legend>Courses</legend>");
    for category in catalog.categories() {
        let checked = answers
            .courses
            .iter()
            .any(|course| course.trim().eq_ignore_ascii_case(category.name.trim()));
        let _ = write!(
            html,
            "<label><input type=\"checkbox\" name=\"courses\" value=\"{}\"{}> {}</label>",
            escape_html(&category.name),
            if checked { " checked" } else { "" },
            escape_html(&category.name)
        );
    }
    html.push_str("</fieldset>");

    choice_group(html, "Budget", "budget", &BUDGETS, picked_or(&answers.budget, BUDGETS[1]));

    let _ = write!(
        html,
        "<label for=\"ai-restrictions\">Dietary restrictions</label>\
         <input type=\"text\" id=\"ai-restrictions\" name=\"restrictions\" value=\"{}\">\
         <label for=\"ai-spice\">Spice level</label><select id=\"ai-spice\" name=\"spice\">",
        escape_html(&answers.restrictions)
    );
    let spice = picked_or(&answers.spice, SPICE_LEVELS[1]);
    for level in SPICE_LEVELS {
        let _ = write!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            level,
            if level == spice { " selected" } else { "" },
            level
        );
    }
    html.push_str("</select><button type=\"submit\">Get suggestion</button></form>");

    if let Some(result) = &panel.result {
        let _ = write!(html, "<div id=\"ai-result-container\">{}</div>", result);
    }
    html.push_str("</section>");
}

fn choice_group(html: &mut String, legend: &str, name: &str, options: &[&str], picked: &str) {
    let _ = write!(html, "<fieldset><legend>{}</legend>", legend);
    for option in options {
        let _ = write!(
            html,
            "<label><input type=\"radio\" name=\"{}\" value=\"{}\"{}> {}</label>",
            name,
            option,
            if option.eq_ignore_ascii_case(picked) { " checked" } else { "" },
            option
        );
    }
    html.push_str("</fieldset>");
}

fn picked_or<'a>(answer: &'a str, default: &'a str) -> &'a str {
    if answer.trim().is_empty() {
        default
    } else {
        answer.trim()
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
