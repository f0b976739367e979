use crate::core::ControllerEvent;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use radio_core::assets;
use radio_core::protocol::{Intent, SessionSnapshot};
use radio_core::wifi::{self, WifiCredentials};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// How long a read waits for the poll loop, which may be busy opening a
/// stream.
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct HttpState {
    pub event_tx: mpsc::Sender<ControllerEvent>,
    pub web_root: PathBuf,
    pub wifi_file: PathBuf,
}

#[derive(Serialize)]
struct VolumeStatus {
    volume: u8,
}

#[derive(Deserialize)]
struct NewStation {
    name: String,
    url: String,
}

#[derive(Deserialize)]
struct WifiForm {
    ssid: String,
    pass: String,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/stations", post(add_station))
        .route("/api/stations/:id/delete", post(delete_station))
        .route("/api/play/:id", get(play_station).post(play_station))
        .route("/api/next", get(next_station).post(next_station))
        .route("/api/prev", get(prev_station).post(prev_station))
        .route("/api/stop", get(stop).post(stop))
        .route("/api/toggle", get(toggle).post(toggle))
        .route("/api/volume", get(get_volume))
        .route("/api/volume/up", get(volume_up).post(volume_up))
        .route("/api/volume/down", get(volume_down).post(volume_down))
        .route("/api/wifi", post(save_wifi))
        .route("/stations/select", get(station_select))
        .fallback(serve_asset)
        .with_state(state)
}

pub async fn serve(bind_address: String, port: u16, state: HttpState) {
    let addr = format!("{}:{}", bind_address, port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind HTTP server to {}: {}", addr, e);
            return;
        }
    };

    info!("configuration page listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("HTTP server error: {}", e);
    }
}

async fn send(state: &HttpState, intent: Intent) -> StatusCode {
    if state
        .event_tx
        .send(ControllerEvent::Command(intent))
        .await
        .is_err()
    {
        error!("controller loop is gone");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    StatusCode::OK
}

async fn snapshot(state: &HttpState) -> Result<SessionSnapshot, StatusCode> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .event_tx
        .send(ControllerEvent::Snapshot(reply_tx))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    tokio::time::timeout(SNAPSHOT_TIMEOUT, reply_rx)
        .await
        .map_err(|_| StatusCode::GATEWAY_TIMEOUT)?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// 302 back to the configuration page after a form post.
fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

fn after_form(status: StatusCode) -> Response {
    if status.is_success() {
        redirect_home()
    } else {
        status.into_response()
    }
}

async fn get_state(State(state): State<HttpState>) -> Result<Json<SessionSnapshot>, StatusCode> {
    snapshot(&state).await.map(Json)
}

async fn get_volume(State(state): State<HttpState>) -> Result<Json<VolumeStatus>, StatusCode> {
    let snap = snapshot(&state).await?;
    Ok(Json(VolumeStatus {
        volume: snap.volume,
    }))
}

async fn add_station(State(state): State<HttpState>, Form(form): Form<NewStation>) -> Response {
    info!("HTTP API: add station {}", form.name);
    let intent = Intent::AddStation {
        name: form.name,
        url: form.url,
    };
    after_form(send(&state, intent).await)
}

async fn delete_station(State(state): State<HttpState>, Path(id): Path<usize>) -> Response {
    info!("HTTP API: delete station {}", id);
    after_form(send(&state, Intent::DeleteStation { id }).await)
}

async fn play_station(State(state): State<HttpState>, Path(id): Path<usize>) -> StatusCode {
    info!("HTTP API: play station {}", id);
    send(&state, Intent::SetStation { id }).await
}

async fn next_station(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::Next).await
}

async fn prev_station(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::Previous).await
}

async fn stop(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::Stop).await
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::Toggle).await
}

async fn volume_up(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::VolumeUp).await
}

async fn volume_down(State(state): State<HttpState>) -> StatusCode {
    send(&state, Intent::VolumeDown).await
}

async fn save_wifi(State(state): State<HttpState>, Form(form): Form<WifiForm>) -> Response {
    let credentials = WifiCredentials {
        ssid: form.ssid,
        pass: form.pass,
    };
    match wifi::save(&state.wifi_file, &credentials) {
        Ok(()) => redirect_home(),
        Err(e) => {
            error!("failed to save wifi credentials: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn station_select(State(state): State<HttpState>) -> Result<Html<String>, StatusCode> {
    let snap = snapshot(&state).await?;
    Ok(Html(render_select(&snap)))
}

async fn serve_asset(State(state): State<HttpState>, uri: Uri) -> Response {
    let request_path = uri.path();
    if let Some((path, mime)) = assets::resolve(&state.web_root, request_path) {
        match tokio::fs::read(&path).await {
            Ok(bytes) => return ([(header::CONTENT_TYPE, mime)], bytes).into_response(),
            Err(e) => error!("failed to read {:?}: {}", path, e),
        }
    }
    not_found(request_path)
}

fn not_found(request_path: &str) -> Response {
    let message = assets::not_found_message(request_path);
    error!("{}", message);
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html")],
        escape_html(&message),
    )
        .into_response()
}

/// `<select>` of all stations with the current one preselected.
pub fn render_select(snap: &SessionSnapshot) -> String {
    let mut html = String::from("<select name=\"id\">");
    for station in &snap.stations {
        let selected = if station.idx == snap.current_station {
            " selected"
        } else {
            ""
        };
        html.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>\n",
            station.idx,
            selected,
            escape_html(&station.name)
        ));
    }
    html.push_str("</select>");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
