//! Router assembly and shared request state.

pub mod error;
pub mod routes;
pub mod session;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use axum::routing::{delete, get, post, put};
use axum::Router;
use campo_server_application::allocation::AllocationService;
use campo_server_application::audit::AuditService;
use campo_server_application::auth::{LoginService, PermissionService};
use campo_server_application::catalog::CatalogService;
use campo_server_application::orders::OrderService;
use campo_server_application::reports::ReportService;
use campo_server_application::users::UserAdminService;
use campo_server_application::vacancy::VacancyService;
use campo_server_application::RequestContext;
use error::ApiError;
use session::SessionStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub login: LoginService,
    pub permissions: PermissionService,
    pub orders: OrderService,
    pub allocation: AllocationService,
    pub vacancy: VacancyService,
    pub users: UserAdminService,
    pub catalog: CatalogService,
    pub audit: AuditService,
    pub reports: ReportService,
}

/// Authenticated request context. Extracting it rejects with 401 when the
/// session cookie is missing, unknown or expired.
pub struct Ctx(pub RequestContext);

impl FromRequestParts<AppState> for Ctx {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session::token_from_cookie_header)
            .ok_or(ApiError::Unauthorized)?;
        let user = state.sessions.get(&token).ok_or(ApiError::Unauthorized)?;

        let ip_address = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Ctx(RequestContext::with_client(user, ip_address, user_agent)))
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // public
        .route("/login", post(routes::auth::login))
        .route("/logout", get(routes::auth::logout).post(routes::auth::logout))
        // session
        .route("/api/user", get(routes::auth::current_user))
        // service orders
        .route(
            "/api/agendamentos",
            get(routes::orders::list).post(routes::orders::create),
        )
        .route("/api/agendamentos/search", get(routes::orders::search))
        .route(
            "/api/agendamentos/nao-alocados",
            get(routes::orders::unallocated),
        )
        .route(
            "/api/agendamentos/{id}",
            get(routes::orders::get_one)
                .put(routes::orders::update)
                .delete(routes::orders::remove),
        )
        .route(
            "/api/agendamentos/{id}/alocar",
            put(routes::orders::allocate),
        )
        // vacancy boards
        .route("/api/vagas/{cidade}/{data}", get(routes::vacancies::city_overview))
        .route(
            "/api/vagas-detalhadas/{cidade}/{tipo}/{data}",
            get(routes::vacancies::day_board),
        )
        .route(
            "/api/vagas-fechadas",
            get(routes::vacancies::closed_slots).put(routes::vacancies::set_slot_closed),
        )
        // capacity templates
        .route(
            "/api/vacancy-templates",
            get(routes::templates::list).put(routes::templates::save),
        )
        .route(
            "/api/vacancy-templates/adjust",
            post(routes::templates::adjust),
        )
        // users and permissions
        .route(
            "/api/users",
            get(routes::users::list).post(routes::users::create),
        )
        .route(
            "/api/users/{id}",
            put(routes::users::update).delete(routes::users::remove),
        )
        .route(
            "/api/users/{id}/permissions",
            get(routes::users::permissions).put(routes::users::set_permissions),
        )
        // catalog
        .route(
            "/api/cities",
            get(routes::catalog::list_cities).post(routes::catalog::create_city),
        )
        .route("/api/cities/{id}", delete(routes::catalog::remove_city))
        .route("/api/cities/{id}/toggle", post(routes::catalog::toggle_city))
        .route(
            "/api/technicians",
            get(routes::catalog::list_technicians).post(routes::catalog::create_technician),
        )
        .route(
            "/api/technicians/{id}",
            delete(routes::catalog::remove_technician),
        )
        .route(
            "/api/technicians/{id}/toggle",
            post(routes::catalog::toggle_technician),
        )
        .route(
            "/api/subjects",
            get(routes::catalog::list_subjects).post(routes::catalog::create_subject),
        )
        .route("/api/subjects/{id}", put(routes::catalog::rename_subject))
        .route(
            "/api/subjects/{id}/toggle",
            post(routes::catalog::toggle_subject),
        )
        // audit
        .route("/api/audit", get(routes::audit::list))
        .route("/api/audit/meta", get(routes::audit::meta))
        // reports
        .route("/api/reports/summary", get(routes::reports::summary))
        .route("/api/reports/export", get(routes::reports::export))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
