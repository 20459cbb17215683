use super::handlers::{activity, auth, health, me, users};
use utoipa::openapi::{InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both served
/// and included in the generated `OpenAPI` spec. Routes added outside (like
/// `/` and `OPTIONS /health`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path; handlers
    // sharing a path go in one macro call.
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::token::refresh))
        .routes(routes!(me::get_profile, me::update_profile))
        .routes(routes!(auth::password::change_password))
        .routes(routes!(auth::mfa::setup))
        .routes(routes!(auth::mfa::verify))
        .routes(routes!(auth::mfa::disable))
        .routes(routes!(activity::list_activity))
        .routes(routes!(users::list_users))
        .routes(routes!(users::get_user, users::delete_user))
        .routes(routes!(users::set_user_role))
        .routes(routes!(users::activate_user))
        .routes(routes!(users::deactivate_user));

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login, tokens, and profile".to_string());

    let mut mfa_tag = Tag::new("mfa");
    mfa_tag.description = Some("TOTP setup, verification, and disable".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Super-admin user management".to_string());

    let mut activity_tag = Tag::new("activity");
    activity_tag.description = Some("Append-only audit trail".to_string());

    router.get_openapi_mut().tags = Some(vec![auth_tag, mfa_tag, users_tag, activity_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    OpenApiBuilder::new().info(info).build()
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, "BSD-3-Clause");
        }
    }

    #[test]
    fn openapi_tags_and_paths() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "auth"));
        assert!(tags.iter().any(|tag| tag.name == "mfa"));
        assert!(tags.iter().any(|tag| tag.name == "users"));

        for path in [
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/token/refresh",
            "/api/auth/profile",
            "/api/auth/password/change",
            "/api/auth/mfa/setup",
            "/api/auth/mfa/verify",
            "/api/auth/mfa/disable",
            "/api/auth/activity",
            "/api/auth/users",
            "/api/auth/users/{id}",
            "/api/auth/users/{id}/role",
            "/api/auth/users/{id}/activate",
            "/api/auth/users/{id}/deactivate",
            "/health",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing path: {path}");
        }
    }
}
