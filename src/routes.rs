use crate::error::ViewerError;
use crate::map::INDEX_HTML;
use crate::server::AppState;
use crate::session::state::DerivedState;
use crate::session::{Event, Patch, Selection, Session};
use crate::tiler::ColourStop;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

pub struct ApiError(ViewerError);

impl From<ViewerError> for ApiError {
    fn from(err: ViewerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct ColormapList {
    pub default: String,
    pub names: Vec<String>,
}

#[derive(Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub seq: u64,
    pub selection: Selection,
    pub state: DerivedState,
}

impl SessionView {
    fn new(id: Uuid, session: &Session) -> Self {
        SessionView {
            id,
            seq: session.seq(),
            selection: session.selection().clone(),
            state: session.state().clone(),
        }
    }
}

pub async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// An unreachable catalog gives an empty list rather than an error page.
pub async fn list_collections(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    match state.engine.catalog().list_collections().await {
        Ok(collections) => Json(collections),
        Err(e) => {
            warn!(error = %e, "Listing collections failed");
            Json(Vec::new())
        }
    }
}

pub async fn invalidate_catalog(State(state): State<Arc<AppState>>) -> StatusCode {
    state.engine.catalog().invalidate().await;
    info!("Catalog cache cleared");
    StatusCode::NO_CONTENT
}

/// Names as the raster service lists them.
pub async fn list_colormaps(State(state): State<Arc<AppState>>) -> ApiResult<ColormapList> {
    let names = state.engine.tiler().colormap_names().await?;
    Ok(Json(ColormapList {
        default: state.config.default_colormap.clone(),
        names,
    }))
}

/// Unknown names are a missing resource here rather than bad input.
pub async fn get_colormap(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.engine.tiler().colorscale(&name).await {
        Ok(stops) => Json::<Vec<ColourStop>>(stops).into_response(),
        Err(e @ ViewerError::UnknownColormap(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        }
        Err(e) => ApiError(e).into_response(),
    }
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> ApiResult<SessionView> {
    let selection = Selection::new(state.config.default_colormap.clone(), state.config.default_range);
    let mut session = Session::new(selection);
    let ticket = session.begin_all();
    let computed = state.engine.compute(&ticket).await;
    session.commit(ticket, computed);

    let id = Uuid::new_v4();
    let view = SessionView::new(id, &session);
    state.sessions.insert(id, Arc::new(Mutex::new(session))).await;
    info!(session = %id, "Session created");
    Ok(Json(view))
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<Mutex<Session>>, ApiError> {
    state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| ApiError(ViewerError::SessionNotFound(id.to_string())))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<SessionView> {
    let session = find_session(&state, id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView::new(id, &session)))
}

/// Apply one event. The session lock is released while the engine talks to
/// the catalog, so a newer event can overtake this one; its results are then
/// dropped at commit and the patch comes back marked stale.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<Event>,
) -> ApiResult<Patch> {
    let session = find_session(&state, id).await?;

    state.engine.check(&event).await?;
    let ticket = session.lock().await.begin(event)?;
    let computed = state.engine.compute(&ticket).await;
    let patch = session.lock().await.commit(ticket, computed);
    Ok(Json(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::session::Engine;
    use crate::session::fixtures::{MemoryCatalog, date};
    use crate::tiler::TilerClient;
    use crate::tiler::colormap::fixtures::serve_colormaps;
    use crate::transport::mock::MockTransport;

    fn app_state() -> Arc<AppState> {
        let catalog = MemoryCatalog::new().with_window("north", date(12), 3, &[("SIC Mean", 0)]);
        let tiler = serve_colormaps(MockTransport::new()).with_json(
            "http://tiler/cog/statistics",
            json!({"b1": {"min": 0.1, "max": 0.9}}),
        );
        let config = Config::default();
        let engine = Engine::new(
            Arc::new(catalog),
            TilerClient::new("http://tiler", Arc::new(tiler)),
            "http://data",
            config.default_range,
        );
        Arc::new(AppState::new(config, engine))
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let state = app_state();
        let Json(view) = create_session(State(state.clone())).await.ok().unwrap();
        assert_eq!(view.selection.colormap, "blues_r");
        assert!(view.state.layers.is_empty());

        for event in [
            Event::SetCollections(vec!["north".into()]),
            Event::SetInitDate(Some(date(12))),
        ] {
            let Json(patch) = post_event(State(state.clone()), Path(view.id), Json(event))
                .await
                .ok()
                .unwrap();
            assert!(!patch.stale);
        }

        let Json(view) = get_session(State(state.clone()), Path(view.id)).await.ok().unwrap();
        assert_eq!(view.state.layers.len(), 1);
        assert_eq!(view.state.dates.valid_dates, vec![date(12)]);
    }

    #[tokio::test]
    async fn test_rejected_event_maps_to_bad_request() {
        let state = app_state();
        let Json(view) = create_session(State(state.clone())).await.ok().unwrap();
        let err = post_event(
            State(state.clone()),
            Path(view.id),
            Json(Event::SetColormap("jet".into())),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let err = get_session(State(app_state()), Path(Uuid::new_v4()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_colormap_routes() {
        let state = app_state();
        let Json(list) = list_colormaps(State(state.clone())).await.ok().unwrap();
        assert!(list.names.contains(&list.default));

        let response = get_colormap(State(state.clone()), Path("viridis".into())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get_colormap(State(state), Path("jet".into())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collections_route() {
        let Json(collections) = list_collections(State(app_state())).await;
        assert_eq!(collections, vec!["north"]);
    }
}
