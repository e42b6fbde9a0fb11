use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the poll bot status surface.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::poll::current_poll,
        crate::routes::poll::stored_options,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::poll::PollStatusResponse,
            crate::dto::poll::PollAnswerSummary,
            crate::dto::poll::OptionsResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "poll", description = "Active poll and stored options"),
    )
)]
pub struct ApiDoc;
