//! Request dispatch: the assembled singletons turned into one mounted router.
use std::sync::Arc;

use axum::Router;

use crate::{
    config::{ServletMapping, ValidationResult},
    core::SingletonSet,
};

/// Build the dispatch router for `singletons`, mounted at the servlet mapping
/// under `context_path`.
///
/// Every resource router is merged, every provider is attached on top of the
/// merged routes, and the result is nested at the mount point.
pub fn build_dispatch(
    singletons: &SingletonSet,
    context_path: &str,
    servlet_path: &str,
) -> ValidationResult<Router> {
    let mapping = ServletMapping::parse(servlet_path)?;
    let mount = mount_point(context_path, &mapping);

    let mut inner = singletons
        .resources()
        .fold(Router::new(), |router, resource| {
            tracing::debug!("Mounting resource {} at '{}'", resource.name(), mount);
            router.merge(Arc::clone(resource).routes())
        });
    for provider in singletons.providers() {
        tracing::debug!("Attaching provider {}", provider.name());
        inner = Arc::clone(provider).attach(inner);
    }

    if mount.is_empty() {
        Ok(inner)
    } else {
        Ok(Router::new().nest(&mount, inner))
    }
}

/// Concatenate context and servlet prefix; an empty result means the root.
pub fn mount_point(context_path: &str, mapping: &ServletMapping) -> String {
    format!("{}{}", context_path.trim_end_matches('/'), mapping.path())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        adapters::JsonProvider,
        core::Singleton,
        ports::Resource,
    };

    struct Ping;

    impl Resource for Ping {
        fn routes(self: Arc<Self>) -> Router {
            Router::new().route("/ping", get(|| async { "pong" }))
        }
    }

    struct Echo;

    impl Resource for Echo {
        fn routes(self: Arc<Self>) -> Router {
            Router::new().route(
                "/json",
                get(|axum::Extension(json): axum::Extension<Arc<JsonProvider>>| async move {
                    json.respond(StatusCode::OK, &serde_json::json!({"via": "provider"}))
                }),
            )
        }
    }

    fn singletons() -> SingletonSet {
        let mut set = SingletonSet::new();
        set.insert(Singleton::Resource(Arc::new(Ping)));
        set.insert(Singleton::Resource(Arc::new(Echo)));
        set.insert(Singleton::Provider(Arc::new(JsonProvider::new())));
        set
    }

    async fn status_of(router: Router, uri: &str) -> StatusCode {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[test]
    fn test_mount_point() {
        let all = ServletMapping::parse("/*").unwrap();
        let api = ServletMapping::parse("/api/*").unwrap();

        assert_eq!(mount_point("/", &all), "");
        assert_eq!(mount_point("/svc", &all), "/svc");
        assert_eq!(mount_point("/svc/", &api), "/svc/api");
        assert_eq!(mount_point("/", &api), "/api");
    }

    #[tokio::test]
    async fn test_root_mount() {
        let router = build_dispatch(&singletons(), "/", "/*").unwrap();
        assert_eq!(status_of(router.clone(), "/ping").await, StatusCode::OK);
        assert_eq!(status_of(router, "/svc/ping").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_nested_mount() {
        let router = build_dispatch(&singletons(), "/svc", "/api/*").unwrap();
        assert_eq!(status_of(router.clone(), "/svc/api/ping").await, StatusCode::OK);
        assert_eq!(status_of(router.clone(), "/svc/api/json").await, StatusCode::OK);
        assert_eq!(status_of(router, "/ping").await, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_servlet_pattern_rejected() {
        assert!(build_dispatch(&singletons(), "/", "api").is_err());
        assert!(build_dispatch(&singletons(), "/", "/a/*/b").is_err());
    }
}
