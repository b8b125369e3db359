use crate::models::TelegramLoginRequest;
use crate::services::AuthService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/telegram",
    tag = "auth",
    request_body = TelegramLoginRequest,
    responses(
        (status = 200, description = "Logged in; user and wallet provisioned on first login"),
        (status = 400, description = "Invalid request body")
    )
)]
pub async fn telegram_login(
    auth_service: web::Data<AuthService>,
    request: web::Json<TelegramLoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login_telegram(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "status": "ok",
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/auth").route("/telegram", web::post().to(telegram_login)));
}
