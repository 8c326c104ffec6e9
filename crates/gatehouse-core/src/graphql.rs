//! GraphQL request dispatch.
//!
//! The dispatcher owns no business logic: by the time it runs, the session
//! middleware has resolved the request's context and the CSRF gate has
//! cleared the mutation. Its only job is to package `{ sessionId, userId }`
//! for the executor, which authorizes per-field/row access on its own
//! (row-level security in the database, for the reference deployment).
//!
//! The GraphQL engine itself is an external collaborator behind the
//! [`GraphQLExecutor`] trait; enable the `graphql` cargo feature for an
//! adapter over `async-graphql` schemas.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::context::RequestContext;
use crate::error::GateError;

#[cfg(feature = "graphql")]
pub use async_graphql;

/// A GraphQL operation as posted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(
        default,
        rename = "operationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

/// The per-operation context handed to the executor.
#[derive(Debug, Clone, Serialize)]
pub struct GraphQLContext {
    pub session_id: String,
    pub user_id: Option<i64>,
}

impl GraphQLContext {
    pub fn from_request(ctx: &RequestContext) -> Self {
        GraphQLContext {
            session_id: ctx.session.id.clone(),
            user_id: ctx.user_id.map(|user| user.0),
        }
    }
}

/// The GraphQL engine seam.
#[async_trait]
pub trait GraphQLExecutor: Send + Sync {
    async fn execute(
        &self,
        request: GraphQLRequest,
        ctx: GraphQLContext,
    ) -> Result<serde_json::Value, GateError>;
}

/// Create the GraphQL routes: `POST /graphql` dispatching to the executor,
/// plus a `GET /graphql` playground page when `playground` is set (pass
/// `config.is_dev()`).
pub fn graphql_routes(executor: Arc<dyn GraphQLExecutor>, playground: bool) -> Router<AppState> {
    let mut router = Router::new().route("/graphql", post(graphql_handler));
    if playground {
        router = router.route("/graphql", get(playground_page));
    }
    router.layer(Extension(executor))
}

async fn graphql_handler(
    Extension(executor): Extension<Arc<dyn GraphQLExecutor>>,
    Extension(ctx): Extension<RequestContext>,
    Json(request): Json<GraphQLRequest>,
) -> Result<Json<serde_json::Value>, GateError> {
    let gql_ctx = GraphQLContext::from_request(&ctx);
    tracing::debug!(
        session_id = %gql_ctx.session_id,
        user_id = ?gql_ctx.user_id,
        operation = ?request.operation_name,
        "dispatching graphql operation"
    );
    let response = executor.execute(request, gql_ctx).await?;
    Ok(Json(response))
}

async fn playground_page() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Gatehouse GraphQL Playground</title>
    <link rel="stylesheet" href="https://unpkg.com/graphiql/graphiql.min.css" />
</head>
<body style="margin: 0;">
    <div id="graphiql" style="height: 100vh;"></div>
    <script crossorigin src="https://unpkg.com/react/umd/react.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/react-dom/umd/react-dom.production.min.js"></script>
    <script crossorigin src="https://unpkg.com/graphiql/graphiql.min.js"></script>
    <script>
        const fetcher = GraphiQL.createFetcher({ url: '/graphql' });
        ReactDOM.render(
            React.createElement(GraphiQL, { fetcher }),
            document.getElementById('graphiql'),
        );
    </script>
</body>
</html>"#,
    )
}

/// Adapter: any `async-graphql` schema is a [`GraphQLExecutor`]. The
/// dispatch context is injected as request data, so resolvers can read
/// `ctx.data::<GraphQLContext>()`.
#[cfg(feature = "graphql")]
#[async_trait]
impl<Q, M, S> GraphQLExecutor for async_graphql::Schema<Q, M, S>
where
    Q: async_graphql::ObjectType + 'static,
    M: async_graphql::ObjectType + 'static,
    S: async_graphql::SubscriptionType + 'static,
{
    async fn execute(
        &self,
        request: GraphQLRequest,
        ctx: GraphQLContext,
    ) -> Result<serde_json::Value, GateError> {
        let mut gql_request = async_graphql::Request::new(request.query);
        if let Some(name) = request.operation_name {
            gql_request = gql_request.operation_name(name);
        }
        if let Some(variables) = request.variables {
            gql_request = gql_request.variables(async_graphql::Variables::from_json(variables));
        }

        let response = async_graphql::Schema::execute(self, gql_request.data(ctx)).await;
        serde_json::to_value(&response)
            .map_err(|e| GateError::Internal(format!("graphql response serialize error: {e}")))
    }
}
