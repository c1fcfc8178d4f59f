//! OpenAPI description of the HTTP surface, served at `/api-doc/openapi.json`.

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorBody;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health,
        routes::create_principal,
        routes::get_principal,
        routes::update_principal,
        routes::create_session,
        routes::current_session,
        routes::end_session,
    ),
    components(schemas(
        routes::LoginRequest,
        routes::PrincipalUpdate,
        routes::PrincipalBody,
        routes::IssuedBody,
        routes::SessionBody,
        ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags((name = "warden", description = "Auth adapter"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
