use actix_web::{HttpResponse, Responder, get, web};

use crate::monitoring::MonitorState;

/// Scheduler state and the most recent cycle report
#[get("/status")]
pub async fn status_route(state: web::Data<MonitorState>) -> impl Responder {
    HttpResponse::Ok().json(state.snapshot().await)
}
