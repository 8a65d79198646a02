use crate::gui_bridge::model::SharedModel;
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use sightcore::{DeviceKey, Location, RawDetection, ScanHandle, SightError};
use std::convert::Infallible;
use std::net::SocketAddr;
use warp::{http::StatusCode, reply::Response, Filter, Reply};

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    dwell: bool,
}

#[derive(Debug, Deserialize)]
struct WhitelistRequest {
    key: String,
    #[serde(default = "default_added")]
    added: bool,
}

fn default_added() -> bool {
    true
}

fn reply_for(result: Result<serde_json::Value, SightError>) -> Response {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK).into_response(),
        Err(err) => {
            let status = match err {
                SightError::Closed => StatusCode::SERVICE_UNAVAILABLE,
                SightError::MalformedRecord(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!("bridge request failed: {}", err);
            warp::reply::with_status(
                warp::reply::json(&json!({ "status": "error", "message": err.to_string() })),
                status,
            )
            .into_response()
        }
    }
}

fn ok() -> serde_json::Value {
    json!({ "status": "ok" })
}

/// HTTP surface over the orchestrator: status and alerts out, detections,
/// location fixes, mode and whitelist changes in.
pub fn routes(
    handle: ScanHandle,
    state: SharedModel,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());
    let handle_filter = warp::any().map(move || handle.clone());

    let status_route = warp::path("status")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| {
            let body = match state.read() {
                Ok(model) => json!(model.status),
                Err(_) => json!(null),
            };
            warp::reply::json(&body).into_response()
        });

    let alerts_route = warp::path("alerts")
        .and(warp::get())
        .and(state_filter)
        .map(|state: SharedModel| {
            let body = match state.read() {
                Ok(model) => json!(model.alerts),
                Err(_) => json!([]),
            };
            warp::reply::json(&body).into_response()
        });

    let detection_route = warp::path("detection")
        .and(warp::post())
        .and(warp::body::json())
        .and(handle_filter.clone())
        .map(|detection: RawDetection, handle: ScanHandle| {
            reply_for(handle.detection(detection).map(|()| ok()))
        });

    let location_route = warp::path("location")
        .and(warp::post())
        .and(warp::body::json())
        .and(handle_filter.clone())
        .map(|location: Location, handle: ScanHandle| {
            reply_for(handle.location(location).map(|()| ok()))
        });

    let mode_route = warp::path("mode")
        .and(warp::post())
        .and(warp::body::json())
        .and(handle_filter.clone())
        .and_then(|request: ModeRequest, handle: ScanHandle| async move {
            let result = handle
                .set_dwell_mode(request.dwell)
                .await
                .map(|()| json!({ "status": "ok", "dwell": request.dwell }));
            Ok::<_, Infallible>(reply_for(result))
        });

    let whitelist_route = warp::path("whitelist")
        .and(warp::post())
        .and(warp::body::json())
        .and(handle_filter)
        .and_then(|request: WhitelistRequest, handle: ScanHandle| async move {
            let result = match request.key.parse::<DeviceKey>() {
                Ok(key) => handle
                    .set_whitelisted(key, request.added)
                    .await
                    .map(|removed| json!({ "status": "ok", "removed": removed })),
                Err(err) => Err(err),
            };
            Ok::<_, Infallible>(reply_for(result))
        });

    status_route
        .or(alerts_route)
        .unify()
        .or(detection_route)
        .unify()
        .or(location_route)
        .unify()
        .or(mode_route)
        .unify()
        .or(whitelist_route)
        .unify()
}

/// Bridge that hosts the status HTTP endpoint on the current runtime.
pub struct GuiBridge {
    state: SharedModel,
    address: SocketAddr,
}

impl GuiBridge {
    pub fn serve(handle: ScanHandle, state: SharedModel, address: SocketAddr) -> Self {
        let filter = routes(handle, state.clone());
        tokio::spawn(warp::serve(filter).run(address));
        info!("[GUI] bridge listening on http://{}", address);
        Self { state, address }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }

    pub fn alert_count(&self) -> usize {
        self.state.read().map(|model| model.alerts.len()).unwrap_or(0)
    }
}
