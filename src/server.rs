//! JSON HTTP surface over `StudioClient`.

use actix_web::{
    error::InternalError, http::StatusCode, middleware, web, App, HttpResponse, HttpServer,
    ResponseError,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::{StudioError, ValidationError};
use crate::google::StudioClient;
use crate::models::{Backend, ContentRequestBody, GenerationRequest, VideoRequestBody};

const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

impl ResponseError for StudioError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.envelope())
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub backend: Option<String>,
}

async fn generate_content(
    client: web::Data<StudioClient>,
    body: web::Json<ContentRequestBody>,
) -> Result<HttpResponse, StudioError> {
    let request = GenerationRequest::try_from(body.into_inner())?;
    generate(&client, request).await
}

async fn generate_video(
    client: web::Data<StudioClient>,
    body: web::Json<VideoRequestBody>,
) -> Result<HttpResponse, StudioError> {
    let request = GenerationRequest::try_from(body.into_inner())?;
    generate(&client, request).await
}

/// The token is cancelled when this future is dropped, which is what
/// actix does when the caller disconnects.
async fn generate(
    client: &StudioClient,
    request: GenerationRequest,
) -> Result<HttpResponse, StudioError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let outcome = client.generate(request, &cancel).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

async fn list_models(
    client: web::Data<StudioClient>,
    query: web::Query<ModelsQuery>,
) -> Result<HttpResponse, StudioError> {
    let backend = match query.backend.as_deref() {
        Some(backend) if !backend.trim().is_empty() => backend.parse::<Backend>()?,
        _ => Backend::default(),
    };
    let models = client.list_models(backend).await?;
    Ok(HttpResponse::Ok().json(json!({ "models": models })))
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            let message = err.to_string();
            log::warn!("Rejected request body: {}", message);
            let body = StudioError::from(ValidationError::MalformedBody(message)).envelope();
            InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/generate/content", web::post().to(generate_content))
        .route("/generate/video", web::post().to(generate_video))
        .route("/models", web::get().to(list_models));
}

pub async fn run(client: StudioClient, port: u16) -> std::io::Result<()> {
    let client = web::Data::new(client);
    log::info!("🌐 Listening on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::new("%r %s %Dms"))
            .app_data(client.clone())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
