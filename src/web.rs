use actix_web::{middleware, web, App, HttpResponse, HttpServer, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::{RallyError, RosterError};
use crate::parser::parse_seconds;
use crate::roster::RosterSource;
use crate::schedule::{Overrides, Participant, PlanRequest, Target};
use crate::timeline::RallyController;

/// Shared server state: one roster, one controller per session id
pub struct AppState {
    pub roster: Mutex<Box<dyn RosterSource + Send>>,
    pub sessions: Mutex<HashMap<String, RallyController>>,
    pub config: EngineConfig,
}

impl AppState {
    pub fn new(roster: Box<dyn RosterSource + Send>, config: EngineConfig) -> Self {
        Self {
            roster: Mutex::new(roster),
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }
}

#[derive(Deserialize)]
pub struct RosterUpsert {
    name: String,
    /// Free-form duration ("45", "1:30", "2m5s")
    travel: String,
}

#[derive(Deserialize, Serialize)]
pub struct AdHocParticipant {
    name: String,
    travel: String,
}

#[derive(Deserialize)]
pub struct PlanBody {
    targets: Vec<Target>,
    /// Roster names to include; the whole roster when absent
    #[serde(default)]
    participants: Option<Vec<String>>,
    /// Manual entries not on the roster
    #[serde(default)]
    extra: Vec<AdHocParticipant>,
    #[serde(default)]
    overrides: Overrides,
    #[serde(default)]
    per_target_cap: Option<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| actix_web::error::ErrorInternalServerError("state lock poisoned"))
}

fn error_response(err: &RallyError) -> HttpResponse {
    let body = serde_json::json!({"success": false, "error": err.to_string()});
    match err {
        RallyError::Session(_) => HttpResponse::Conflict().json(body),
        RallyError::Roster(RosterError::UnknownParticipant(_)) => HttpResponse::NotFound().json(body),
        RallyError::Roster(RosterError::Io { .. } | RosterError::Csv { .. }) | RallyError::Io(_) => {
            HttpResponse::InternalServerError().json(body)
        }
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn session_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({"success": false, "error": "Unknown session"}))
}

async fn list_roster(state: web::Data<AppState>) -> Result<HttpResponse> {
    let roster = lock(&state.roster)?;
    match roster.list_participants() {
        Ok(participants) => Ok(HttpResponse::Ok().json(participants)),
        Err(e) => Ok(error_response(&e.into())),
    }
}

async fn upsert_roster(req: web::Json<RosterUpsert>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut roster = lock(&state.roster)?;
    match roster.upsert_raw(&req.name, &req.travel) {
        Ok(seconds) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "participant": Participant::new(req.name.trim(), seconds),
        }))),
        Err(e) => Ok(error_response(&e.into())),
    }
}

async fn delete_roster(name: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut roster = lock(&state.roster)?;
    match roster.delete(&name) {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"success": true}))),
        Err(e) => Ok(error_response(&e.into())),
    }
}

/// Snapshot of the roster narrowed to the requested names, plus ad-hoc entries
fn collect_participants(body: &PlanBody, roster: &dyn RosterSource) -> std::result::Result<Vec<Participant>, RallyError> {
    let all = roster.list_participants()?;
    let mut participants = match &body.participants {
        None => all,
        Some(names) => names
            .iter()
            .map(|name| {
                all.iter()
                    .find(|p| p.id == name.trim())
                    .cloned()
                    .ok_or_else(|| RosterError::UnknownParticipant(name.clone()))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    for extra in &body.extra {
        let seconds = parse_seconds(&extra.travel);
        if seconds == 0 {
            return Err(RosterError::InvalidDuration {
                name: extra.name.clone(),
                raw: extra.travel.clone(),
            }
            .into());
        }
        participants.push(Participant::new(extra.name.trim(), seconds));
    }
    Ok(participants)
}

async fn plan_session(
    id: web::Path<String>,
    body: web::Json<PlanBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let participants = {
        let roster = lock(&state.roster)?;
        match collect_participants(&body, roster.as_ref()) {
            Ok(p) => p,
            Err(e) => return Ok(error_response(&e)),
        }
    };
    let body = body.into_inner();
    let request = PlanRequest {
        targets: body.targets,
        roster: participants,
        overrides: body.overrides,
        per_target_cap: body.per_target_cap,
    };

    let mut sessions = lock(&state.sessions)?;
    let controller = sessions
        .entry(id.into_inner())
        .or_insert_with(|| RallyController::new(state.config));
    match controller.recompute_schedule(&request) {
        Ok(plan_set) => Ok(HttpResponse::Ok().json(plan_set)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_session(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let sessions = lock(&state.sessions)?;
    match sessions.get(id.as_str()) {
        Some(controller) => Ok(HttpResponse::Ok().json(controller.snapshot())),
        None => Ok(session_not_found()),
    }
}

async fn start_session(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut sessions = lock(&state.sessions)?;
    let Some(controller) = sessions.get_mut(id.as_str()) else {
        return Ok(session_not_found());
    };
    match controller.start() {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"success": true}))),
        Err(e) => Ok(error_response(&e.into())),
    }
}

async fn cancel_session(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut sessions = lock(&state.sessions)?;
    let Some(controller) = sessions.get_mut(id.as_str()) else {
        return Ok(session_not_found());
    };
    if controller.cancel() {
        Ok(HttpResponse::Ok().json(serde_json::json!({"success": true})))
    } else {
        Ok(HttpResponse::Conflict().json(serde_json::json!({"success": false, "error": "No sequence running"})))
    }
}

async fn reset_session(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut sessions = lock(&state.sessions)?;
    let Some(controller) = sessions.get_mut(id.as_str()) else {
        return Ok(session_not_found());
    };
    controller.reset();
    Ok(HttpResponse::Ok().json(controller.snapshot()))
}

async fn delete_session(id: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse> {
    let mut sessions = lock(&state.sessions)?;
    match sessions.remove(id.as_str()) {
        Some(_) => Ok(HttpResponse::Ok().json(serde_json::json!({"success": true}))),
        None => Ok(session_not_found()),
    }
}

/// Registers every API route; shared by the server and the handler tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/roster", web::get().to(list_roster))
        .route("/api/roster", web::post().to(upsert_roster))
        .route("/api/roster/{name}", web::delete().to(delete_roster))
        .route("/api/sessions/{id}", web::get().to(get_session))
        .route("/api/sessions/{id}", web::delete().to(delete_session))
        .route("/api/sessions/{id}/plan", web::post().to(plan_session))
        .route("/api/sessions/{id}/start", web::post().to(start_session))
        .route("/api/sessions/{id}/cancel", web::post().to(cancel_session))
        .route("/api/sessions/{id}/reset", web::post().to(reset_session));
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);
    info!(port, "starting web server");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use crate::roster::MemoryRoster;

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState::new(Box::new(MemoryRoster::new()), EngineConfig::default()))
    }

    fn upsert(name: &str, travel: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/roster")
            .set_json(serde_json::json!({"name": name, "travel": travel}))
    }

    #[actix_web::test]
    async fn test_roster_crud() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;

        let resp = test::call_service(&app, upsert("Alice", "1:15").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = test::call_service(&app, upsert("Bob", "nope").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/roster").to_request();
        let roster: Vec<Participant> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(roster, vec![Participant::new("Alice", 75)]);

        let req = test::TestRequest::delete().uri("/api/roster/Bob").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_plan_start_cancel() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        for (name, travel) in [("A", "45"), ("B", "30"), ("C", "1:00")] {
            test::call_service(&app, upsert(name, travel).to_request()).await;
        }

        let req = test::TestRequest::post().uri("/api/sessions/ops/start").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/sessions/ops/plan")
            .set_json(serde_json::json!({
                "targets": [{"name": "Enemy", "mode": "attack"}],
                "extra": [{"name": "D", "travel": "20s"}],
            }))
            .to_request();
        let plan_set: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(plan_set["plans"][0]["impact_seconds"], 60);
        assert_eq!(plan_set["plans"][0]["entries"][0]["participant_id"], "C");
        assert_eq!(plan_set["plans"][0]["entries"][3]["participant_id"], "D");

        let req = test::TestRequest::get().uri("/api/sessions/ops").to_request();
        let snapshot: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["session_state"]["state"], "idle");

        let req = test::TestRequest::post().uri("/api/sessions/ops/start").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::post().uri("/api/sessions/ops/start").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post().uri("/api/sessions/ops/cancel").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::post().uri("/api/sessions/ops/cancel").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post().uri("/api/sessions/ops/reset").to_request();
        let snapshot: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["session_state"]["state"], "idle");
    }

    #[actix_web::test]
    async fn test_plan_with_unknown_participant() {
        let app = test::init_service(App::new().app_data(state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/sessions/ops/plan")
            .set_json(serde_json::json!({
                "targets": [{"name": "Keep", "mode": "defense", "enemy_rally_seconds": 300}],
                "participants": ["Ghost"],
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
