use actix_web::web;

mod health;
mod status;

/// Register the monitor's read-only HTTP routes
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route).service(web::scope("/v1").service(status::status_route));
}
