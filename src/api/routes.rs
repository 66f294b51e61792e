use crate::api::handlers::{ai, chapter_points, chapters, courses, login, piston, stats, users};
use crate::ratelimit::{enforce_rate_limit, RouteLimit};
use crate::AppState;
use axum::{
    middleware,
    routing::{get, patch, post, MethodRouter},
    Router,
};

/// Wraps a single route in the fixed-window limiter for `route`.
fn limited(
    state: &AppState,
    route: &'static str,
    method_router: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let limit = RouteLimit::new(
        state.rate_limiter.clone(),
        route,
        state.config.server.trust_forwarded_for,
    );
    method_router.layer(middleware::from_fn_with_state(limit, enforce_rate_limit))
}

/// Routes mounted under the API prefix.
///
/// Authentication is enforced per handler through the `AuthUser` and
/// `AdminUser` extractors rather than a router-wide layer.
pub fn create_router(state: &AppState) -> Router<AppState> {
    let login_routes = Router::new()
        .route(
            "/login/access-token",
            limited(state, "login", post(login::login_access_token)),
        )
        .route(
            "/login/test-token",
            limited(state, "test_token", post(login::test_token)),
        )
        .route("/logout", limited(state, "logout", post(login::logout)));

    let user_routes = Router::new()
        .route(
            "/users",
            get(users::read_users).post(users::create_user),
        )
        .route(
            "/users/signup",
            limited(state, "signup", post(users::register_user)),
        )
        .route(
            "/users/me",
            get(users::read_user_me)
                .patch(users::update_user_me)
                .delete(users::delete_user_me),
        )
        .route("/users/me/password", patch(users::update_password_me))
        .route("/users/me/courses", get(users::read_my_courses))
        .route(
            "/users/me/courses/{course_id}",
            post(users::enroll_course).patch(users::update_my_course),
        )
        .route(
            "/users/{id}",
            get(users::read_user_by_id)
                .patch(users::update_user)
                .delete(users::delete_user),
        );

    let course_routes = Router::new()
        .route(
            "/courses",
            get(courses::read_courses).post(courses::create_course),
        )
        .route(
            "/courses/{id}",
            get(courses::read_course)
                .patch(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/courses/{id}/chapters", get(courses::read_course_chapters));

    let chapter_routes = Router::new()
        .route(
            "/chapters",
            get(chapters::read_chapters).post(chapters::create_chapter),
        )
        .route(
            "/chapters/{id}",
            get(chapters::read_chapter)
                .patch(chapters::update_chapter)
                .delete(chapters::delete_chapter),
        )
        .route(
            "/chapters/{id}/chapter-points",
            get(chapters::read_points_of_chapter),
        )
        .route(
            "/chapters/{id}/completed",
            get(chapters::read_chapter_completion).post(chapters::complete_chapter),
        );

    let chapter_point_routes = Router::new()
        .route(
            "/chapter-points",
            get(chapter_points::read_chapter_points).post(chapter_points::create_chapter_point),
        )
        .route(
            "/chapter-points/{id}",
            get(chapter_points::read_chapter_point)
                .patch(chapter_points::update_chapter_point)
                .delete(chapter_points::delete_chapter_point),
        );

    let service_routes = Router::new()
        .route(
            "/piston/execute",
            limited(state, "execute", post(piston::execute_code)),
        )
        .route("/ai/generate", limited(state, "hints", post(ai::generate_hint)))
        .route("/ai/health", get(ai::ai_health))
        .route("/stats", get(stats::read_stats));

    login_routes
        .merge(user_routes)
        .merge(course_routes)
        .merge(chapter_routes)
        .merge(chapter_point_routes)
        .merge(service_routes)
}
