use crate::history::{ group_chats_by_date, ChatStore, ChatUpdate, StoreError };
use crate::llm::chat::{ AttachedFile, ChatClient };
use crate::llm::RelayError;
use crate::models::chat::{ ChatRequest, ChatResponse, ChatTurn, ConfigResponse };
use crate::transcript;
use axum::{
    extract::{ Multipart, Path, Query, State },
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    routing::{ get, post, put },
    Json,
    Router,
};
use chrono::Utc;
use log::{ error, info };
use serde::{ Deserialize, Serialize };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

/// Model catalog surfaced to the client for its selector dropdown.
const AVAILABLE_MODELS: [&str; 9] = [
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "o1-preview",
    "o1-mini",
    "chatgpt-4o-latest",
];

#[derive(Clone)]
struct AppState {
    client: Arc<dyn ChatClient>,
    store: ChatStore,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

pub async fn start_http_server(
    addr: &str,
    client: Arc<dyn ChatClient>,
    store: ChatStore
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let state = AppState { client, store };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/files", post(chat_files_handler))
        .route("/api/chat/config", get(config_handler))
        .route("/api/history", get(get_history_handler).delete(clear_history_handler))
        .route("/api/history/grouped", get(grouped_handler))
        .route("/api/history/chats", post(create_chat_handler))
        .route(
            "/api/history/chats/{id}",
            get(get_chat_handler).patch(update_chat_handler).delete(delete_chat_handler)
        )
        .route("/api/history/chats/{id}/transcript", get(transcript_handler))
        .route("/api/history/current", put(set_current_handler))
        .route("/api/history/search", get(search_handler))
        .route("/api/history/export", get(export_handler))
        .route("/api/history/import", post(import_handler))
        .route("/api/history/storage", get(storage_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn relay_error_response(err: RelayError) -> Response {
    let status = match &err {
        RelayError::EmptyRequest => StatusCode::BAD_REQUEST,
        RelayError::MissingApiKey => StatusCode::INTERNAL_SERVER_ERROR,
        RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        RelayError::Transport(_) => StatusCode::BAD_GATEWAY,
        RelayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        RelayError::EmptyCompletion => StatusCode::BAD_GATEWAY,
    };
    let error = match &err {
        RelayError::MissingApiKey =>
            "API key not configured. Set OPENAI_API_KEY on the server.".to_string(),
        other => format!("Error: {}", other),
    };
    (status, Json(ErrorResponse { error, message: err.to_string() })).into_response()
}

fn store_error_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::QuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse { error: format!("Error: {}", err), message: err.to_string() }),
    ).into_response()
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Chat {} not found", id),
            message: "not found".to_string(),
        }),
    ).into_response()
}

async fn relay(state: &AppState, request: ChatRequest, files: Vec<AttachedFile>) -> Response {
    if request.messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Messages cannot be empty".to_string(),
                message: RelayError::EmptyRequest.to_string(),
            }),
        ).into_response();
    }

    let result = if files.is_empty() {
        state.client.complete(&request.messages, request.model.as_deref()).await
    } else {
        state.client.complete_with_files(&request.messages, &files, request.model.as_deref()).await
    };

    match result {
        Ok(completion) => {
            if let Some(usage) = &completion.usage {
                info!(
                    "Returning response with usage: prompt={}, completion={}, total={}",
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens
                );
            }
            let mut message = completion.message;
            message.timestamp = Some(Utc::now());
            Json(ChatResponse { message, usage: completion.usage }).into_response()
        }
        Err(err) => {
            error!("Error processing chat request: {}", err);
            relay_error_response(err)
        }
    }
}

async fn chat_handler(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    relay(&state, request, Vec::new()).await
}

async fn chat_files_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut turns: Vec<ChatTurn> = Vec::new();
    let mut model: Option<String> = None;
    let mut files: Vec<AttachedFile> = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                break;
            }
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Malformed multipart request".to_string(),
                        message: err.to_string(),
                    }),
                ).into_response();
            }
        };

        let field_name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        match field_name.as_deref() {
            Some("messages") => {
                let raw = match field.text().await {
                    Ok(raw) => raw,
                    Err(err) => {
                        return bad_field("messages", err.to_string());
                    }
                };
                turns = match serde_json::from_str(&raw) {
                    Ok(turns) => turns,
                    Err(err) => {
                        return bad_field("messages", err.to_string());
                    }
                };
            }
            Some("model") => {
                model = match field.text().await {
                    Ok(value) => Some(value),
                    Err(err) => {
                        return bad_field("model", err.to_string());
                    }
                };
            }
            _ => {
                let data = match field.bytes().await {
                    Ok(data) => data.to_vec(),
                    Err(err) => {
                        return bad_field("file", err.to_string());
                    }
                };
                files.push(AttachedFile {
                    name: file_name.unwrap_or_else(|| "attachment".to_string()),
                    content_type: content_type.unwrap_or_else(||
                        "application/octet-stream".to_string()
                    ),
                    data,
                });
            }
        }
    }

    info!("Received chat upload with {} file(s)", files.len());
    relay(&state, ChatRequest { messages: turns, model }, files).await
}

fn bad_field(name: &str, message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: format!("Invalid multipart field: {}", name), message }),
    ).into_response()
}

async fn config_handler(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        model: state.client.default_model(),
        api_key_configured: state.client.has_api_key(),
        available_models: AVAILABLE_MODELS.iter().map(|model| model.to_string()).collect(),
    })
}

async fn get_history_handler(State(state): State<AppState>) -> Response {
    Json(state.store.get_history()).into_response()
}

async fn grouped_handler(State(state): State<AppState>) -> Response {
    let history = state.store.get_history();
    Json(group_chats_by_date(&history.chats, Utc::now())).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest {
    #[serde(default)]
    messages: Vec<ChatTurn>,
    #[serde(default)]
    model: Option<String>,
}

async fn create_chat_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateChatRequest>
) -> Response {
    let model = request.model.unwrap_or_else(|| state.client.default_model());
    match state.store.create_chat(request.messages, model) {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn get_chat_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.get_chat(&id) {
        Some(session) => Json(session).into_response(),
        None => not_found(&id),
    }
}

async fn update_chat_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ChatUpdate>
) -> Response {
    match state.store.update_chat(&id, update) {
        Ok(Some(session)) => Json(session).into_response(),
        Ok(None) => not_found(&id),
        Err(err) => store_error_response(err),
    }
}

async fn delete_chat_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.delete_chat(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(&id),
        Err(err) => store_error_response(err),
    }
}

#[derive(Deserialize)]
struct TranscriptQuery {
    #[serde(default)]
    format: Option<String>,
}

async fn transcript_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TranscriptQuery>
) -> Response {
    let Some(session) = state.store.get_chat(&id) else {
        return not_found(&id);
    };

    let exported_at = Utc::now();
    match query.format.as_deref() {
        Some("md") | Some("markdown") => {
            let body = transcript::render_markdown(
                &session.turns,
                &session.model,
                session.total_tokens,
                exported_at
            );
            ([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], body).into_response()
        }
        _ => {
            let body = transcript::render_plain(
                &session.turns,
                &session.model,
                session.total_tokens,
                exported_at
            );
            ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCurrentRequest {
    #[serde(default)]
    chat_id: Option<String>,
}

async fn set_current_handler(
    State(state): State<AppState>,
    Json(request): Json<SetCurrentRequest>
) -> Response {
    match state.store.set_current_chat(request.chat_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

async fn search_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>
) -> Response {
    let results = state.store.search_chats(query.q.as_deref().unwrap_or(""));
    Json(results).into_response()
}

async fn export_handler(State(state): State<AppState>) -> Response {
    match state.store.export_history() {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(err) => store_error_response(err),
    }
}

async fn import_handler(State(state): State<AppState>, body: String) -> Response {
    if state.store.import_history(&body) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Invalid history format".to_string(),
                message: "import rejected, existing history left untouched".to_string(),
            }),
        ).into_response()
    }
}

async fn clear_history_handler(State(state): State<AppState>) -> Response {
    match state.store.clear_history() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageResponse {
    bytes: u64,
    formatted: String,
}

async fn storage_handler(State(state): State<AppState>) -> Json<StorageResponse> {
    Json(StorageResponse {
        bytes: state.store.storage_size(),
        formatted: state.store.storage_size_formatted(),
    })
}
