use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "Cloud Cost API",
        version = "0.1.0",
        description = "Monthly cost estimates of infrastructure templates across AWS, Azure and GCP"
    ),
    servers(
        (url = "/api", description = "API base path")
    )
)]
struct AppDoc;

/// Application document with the pricing domain paths merged at the root.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        AppDoc::openapi().merge_from(domain_pricing::handlers::ApiDoc::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_includes_pricing_paths() {
        let doc = ApiDoc::openapi();

        assert_eq!(doc.info.title, "Cloud Cost API");
        for path in [
            "/templates",
            "/templates/{id}",
            "/pricing/compare",
            "/pricing/snapshots",
            "/pricing/history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
