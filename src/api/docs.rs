use crate::api::handlers::{ai, chapter_points, chapters, courses, login, piston, stats, users};
use crate::auth::middleware::ACCESS_TOKEN_COOKIE;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

/// OpenAPI document served at `{api_prefix}/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "CodePath API",
        description = "Courses, learner progress, sandboxed code execution and AI hints"
    ),
    paths(
        login::login_access_token,
        login::logout,
        login::test_token,
        users::register_user,
        users::read_user_me,
        users::update_user_me,
        users::update_password_me,
        users::delete_user_me,
        users::read_my_courses,
        users::enroll_course,
        users::update_my_course,
        users::read_users,
        users::create_user,
        users::read_user_by_id,
        users::update_user,
        users::delete_user,
        courses::read_courses,
        courses::read_course,
        courses::read_course_chapters,
        courses::create_course,
        courses::update_course,
        courses::delete_course,
        chapters::read_chapters,
        chapters::read_chapter,
        chapters::create_chapter,
        chapters::update_chapter,
        chapters::delete_chapter,
        chapters::read_points_of_chapter,
        chapters::read_chapter_completion,
        chapters::complete_chapter,
        chapter_points::read_chapter_points,
        chapter_points::read_chapter_point,
        chapter_points::create_chapter_point,
        chapter_points::update_chapter_point,
        chapter_points::delete_chapter_point,
        piston::execute_code,
        ai::generate_hint,
        ai::ai_health,
        stats::read_stats,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "login", description = "Session tokens"),
        (name = "users", description = "Accounts, profiles and enrollments"),
        (name = "courses", description = "Course catalogue"),
        (name = "chapters", description = "Chapters and completion"),
        (name = "chapter-points", description = "Lesson content inside chapters"),
        (name = "piston", description = "Sandboxed code execution"),
        (name = "ai", description = "Tutoring hints"),
        (name = "stats", description = "Platform totals"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        components.add_security_scheme(
            "cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(ACCESS_TOKEN_COOKIE))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes_and_schemes() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/v1/login/access-token"));
        assert!(doc.paths.paths.contains_key("/api/v1/chapters/{id}/completed"));
        assert!(doc.paths.paths.contains_key("/api/v1/chapter-points/{id}"));
        assert!(doc
            .paths
            .paths
            .contains_key("/api/v1/chapters/{id}/chapter-points"));

        let schemes = doc.components.unwrap().security_schemes;
        assert!(schemes.contains_key("bearer"));
        assert!(schemes.contains_key("cookie"));
    }
}
