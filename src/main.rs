use actix_web::{web, App, HttpServer, Responder, HttpResponse, ResponseError, middleware::Logger};
use actix_web::http::StatusCode;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::io;
use log::{info, error, debug, warn};
use actix_governor::{Governor, GovernorConfigBuilder};

mod cache;
mod config;
mod error;
mod logging;
mod menu;
mod prompt;
mod provider;
mod render;
mod suggestion;
mod ui;
mod upstream;
mod utils;

use cache::PromptCache;
use config::Settings;
use error::ProxyError;
use menu::MenuCatalog;
use prompt::{MealForm, PortionGuidance, Preferences, PromptBuilder};
use render::{Rendered, Suggestion};
use suggestion::SuggestionService;
use ui::{AssistantPanel, ViewQuery, ViewState};
use upstream::{HttpTransport, Transport};

struct AppState<T> {
    service: SuggestionService<T>,
    catalog: MenuCatalog,
    guidance: PortionGuidance,
}

#[derive(Debug, Deserialize)]
struct SuggestionRequest {
    prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MealRequest {
    #[serde(flatten)]
    preferences: Preferences,
    #[serde(default)]
    reroll: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MealResponse {
    suggestions: Vec<Suggestion>,
    raw: Option<String>,
    html: String,
    from_cache: bool,
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "message": "Server is running"
    }))
}

/// `POST /api/get-suggestion`: relay a ready-made prompt to the provider.
async fn get_suggestion<T: Transport + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<T>>,
) -> Result<HttpResponse, ProxyError> {
    let request_id = utils::request_id();
    info!("Request {}: Suggestion request received", request_id);
    debug!("Request {}: Raw request body: {}", request_id, String::from_utf8_lossy(&body));

    let req = serde_json::from_slice::<SuggestionRequest>(&body).map_err(|e| {
        error!("Request {}: Invalid request format: {}", request_id, e);
        ProxyError::Validation(format!("invalid request format: {}", e))
    })?;

    let prompt = req.prompt.unwrap_or_default();
    let reply = state.service.suggest(&request_id, &prompt).await?;
    Ok(HttpResponse::Ok().json(reply))
}

/// Build the prompt from questionnaire answers, ask the provider and
/// interpret the answer. `reroll` asks for a different combination.
async fn meal_suggestion<T: Transport>(
    state: &AppState<T>,
    request_id: &str,
    preferences: &Preferences,
    reroll: bool,
) -> Result<(Rendered, bool), ProxyError> {
    debug!("Request {}: Preferences: {:?}, reroll: {}", request_id, preferences, reroll);

    let nonce = reroll.then(prompt::new_nonce);
    let prompt = PromptBuilder::new(&state.catalog)
        .with_guidance(state.guidance)
        .build(preferences, nonce.as_deref())?;
    debug!("Request {}: Built prompt of {} characters", request_id, prompt.len());

    let reply = state.service.suggest(request_id, &prompt).await?;
    Ok((render::interpret(&reply.suggestion), reply.from_cache))
}

/// `POST /api/suggest`: JSON questionnaire in, suggestions and the rendered
/// fragment out.
async fn suggest_meal<T: Transport + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<T>>,
) -> Result<HttpResponse, ProxyError> {
    let request_id = utils::request_id();
    info!("Request {}: Meal suggestion request received", request_id);

    let req = serde_json::from_slice::<MealRequest>(&body).map_err(|e| {
        error!("Request {}: Invalid preferences: {}", request_id, e);
        ProxyError::Preferences(e.to_string())
    })?;

    let (rendered, from_cache) = meal_suggestion(state.get_ref(), &request_id, &req.preferences, req.reroll).await?;

    Ok(HttpResponse::Ok().json(MealResponse {
        suggestions: rendered.suggestions().to_vec(),
        raw: rendered.raw().map(str::to_string),
        html: rendered.to_html(&req.preferences),
        from_cache,
    }))
}

/// `POST /suggest`: the questionnaire and re-roll forms. Renders the menu page
/// with the suggestion, or a failure notice, in the assistant panel.
async fn suggest_page<T: Transport + 'static>(
    body: web::Bytes,
    state: web::Data<AppState<T>>,
) -> HttpResponse {
    let request_id = utils::request_id();
    info!("Request {}: Questionnaire submitted", request_id);

    let (status, panel) = match MealForm::parse(&body) {
        Ok(form) => {
            match meal_suggestion(state.get_ref(), &request_id, &form.preferences, form.reroll).await {
                Ok((rendered, _)) => (
                    StatusCode::OK,
                    AssistantPanel {
                        result: Some(rendered.to_html(&form.preferences)),
                        answers: form.preferences,
                    },
                ),
                Err(e) => {
                    error!("Request {}: Suggestion failed: {}", request_id, e);
                    (
                        e.status_code(),
                        AssistantPanel {
                            answers: form.preferences,
                            result: Some(render::failure_html(e.public_message())),
                        },
                    )
                }
            }
        }
        Err(e) => {
            error!("Request {}: Invalid questionnaire: {}", request_id, e);
            let e = ProxyError::Preferences(e.to_string());
            (
                e.status_code(),
                AssistantPanel {
                    answers: Preferences::default(),
                    result: Some(render::failure_html(e.public_message())),
                },
            )
        }
    };

    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(ui::render_page(&state.catalog, ViewState::Closed, &panel))
}

async fn menu_json<T: Transport + 'static>(state: web::Data<AppState<T>>) -> impl Responder {
    HttpResponse::Ok().json(&state.catalog)
}

async fn menu_page<T: Transport + 'static>(
    query: web::Query<ViewQuery>,
    state: web::Data<AppState<T>>,
) -> impl Responder {
    let view = ViewState::from_query(&query, &state.catalog);
    debug!("Rendering menu page in state {:?}", view);
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(ui::render_page(&state.catalog, view, &AssistantPanel::default()))
}

fn routes<T: Transport + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/", web::get().to(menu_page::<T>))
        .route("/menu.json", web::get().to(menu_json::<T>))
        .route("/api/get-suggestion", web::post().to(get_suggestion::<T>))
        .route("/api/suggest", web::post().to(suggest_meal::<T>))
        .route(render::SUGGEST_PAGE_PATH, web::post().to(suggest_page::<T>));
}

fn log_settings(settings: &Settings) {
    info!(
        "AI provider: {} (model {})",
        settings.provider.name(),
        settings.provider.model()
    );
    match &settings.api_key {
        Some(key) => info!(
            "{}: {}",
            settings.provider.key_variable(),
            utils::mask_api_key(key)
        ),
        None => warn!(
            "{} is not set, suggestion requests will fail",
            settings.provider.key_variable()
        ),
    }
    info!(
        "Menu: {}, cache capacity: {}, cache TTL: {:?}, upstream timeout: {:?}",
        settings.menu_path.display(),
        settings.cache.capacity,
        settings.cache.ttl,
        settings.upstream_timeout
    );
    info!(
        "Rate limit: one request replenished every {}s, burst {}; portion guidance: {:?}",
        settings.rate_limit.replenish_secs,
        settings.rate_limit.burst,
        settings.portion_guidance
    );
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    let settings = Settings::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    if let Err(e) = logging::setup_logging(&settings.log) {
        eprintln!("Failed to set up logging: {}", e);
        return Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
    }

    log_settings(&settings);

    let catalog = MenuCatalog::load(&settings.menu_path).await.map_err(|e| {
        error!("Could not load menu from {}: {}", settings.menu_path.display(), e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;
    if catalog.is_empty() {
        warn!("Menu at {} has no items", settings.menu_path.display());
    }

    let transport = HttpTransport::new(settings.upstream_timeout)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let mut service = SuggestionService::new(settings.provider.clone(), settings.api_key.clone(), transport);
    if settings.cache.capacity > 0 {
        service = service.with_cache(PromptCache::new(settings.cache.capacity, settings.cache.ttl));
    } else {
        info!("Prompt cache disabled");
    }
    info!("Suggestions are served by {}", service.provider().name());

    let state = web::Data::new(AppState {
        service,
        catalog,
        guidance: settings.portion_guidance,
    });

    let governor_config = GovernorConfigBuilder::default()
        .per_second(settings.rate_limit.replenish_secs)
        .burst_size(settings.rate_limit.burst)
        .finish()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "rate limit values must be non-zero"))?;

    info!("Starting AR Eatery server on {}", settings.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_config))
            .app_data(state.clone())
            .configure(routes::<HttpTransport>)
    })
    .bind(settings.bind_addr.as_str())?
    .run()
    .await
}
