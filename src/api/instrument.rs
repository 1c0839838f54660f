//! Request instrumentation middleware.
//!
//! Every request handled by an instrumented router updates four metrics, all
//! tagged with `path` and `server`:
//!
//! - `status_codes` (extra `code` tag): +1
//! - `errors`: +1 for 5xx responses, +0 otherwise
//! - `requests`: +1
//! - `response_time`: sample in microseconds

use crate::core::PathMatch;
use crate::metrics::{Registry, TagSet};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tag value used when no [`PathMatch`] applies
pub const DEFAULT_PATH_NAME: &str = "/";

/// Records request statistics into a registry.
#[derive(Debug)]
pub struct Instrumentation {
    registry: Arc<Registry>,
    server_name: String,
    paths: Vec<PathMatch>,
    skip: Vec<String>,
}

impl Instrumentation {
    pub fn new(registry: Arc<Registry>, server_name: impl Into<String>) -> Self {
        Self {
            registry,
            server_name: server_name.into(),
            paths: Vec::new(),
            skip: Vec::new(),
        }
    }

    /// Path naming rules, first match wins
    pub fn with_paths(mut self, paths: Vec<PathMatch>) -> Self {
        self.paths = paths;
        self
    }

    /// Leave requests under the `path` prefix unrecorded
    pub fn skip_path(mut self, path: impl Into<String>) -> Self {
        self.skip.push(path.into());
        self
    }

    /// Tag value for a request path and method
    pub fn path_name(&self, path: &str, method: &Method) -> &str {
        self.paths
            .iter()
            .find(|m| {
                path.starts_with(m.path.as_str())
                    && m.methods.as_ref().map_or(true, |methods| {
                        methods
                            .iter()
                            .any(|allowed| allowed.eq_ignore_ascii_case(method.as_str()))
                    })
            })
            .map_or(DEFAULT_PATH_NAME, |m| m.name.as_str())
    }

    /// Record one finished request
    pub fn record(&self, path_name: &str, status: StatusCode, elapsed: Duration) {
        let tags = TagSet::from([("path", path_name), ("server", self.server_name.as_str())]);

        let code_tags = tags.clone().with("code", status.as_str());
        self.registry.add("status_codes", &code_tags, 1);

        let is_error = status.is_server_error();
        self.registry.add("errors", &tags, i64::from(is_error));
        self.registry.add("requests", &tags, 1);

        let micros = i64::try_from(elapsed.as_micros()).unwrap_or(i64::MAX);
        self.registry.observe("response_time", &tags, micros);
    }

    fn is_skipped(&self, path: &str) -> bool {
        self.skip.iter().any(|p| path.starts_with(p.as_str()))
    }
}

async fn track(State(inst): State<Arc<Instrumentation>>, req: Request, next: Next) -> Response {
    if inst.is_skipped(req.uri().path()) {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let name = inst.path_name(&path, &method);
    inst.record(name, response.status(), start.elapsed());
    response
}

/// Wrap every route of `router` with request statistics
pub fn instrument(router: Router, instrumentation: Instrumentation) -> Router {
    router.layer(middleware::from_fn_with_state(Arc::new(instrumentation), track))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrumentation() -> Instrumentation {
        Instrumentation::new(Arc::new(Registry::new()), "web-1").with_paths(vec![
            PathMatch {
                path: "/api".to_string(),
                name: "api".to_string(),
                methods: Some(vec!["GET".to_string()]),
            },
            PathMatch {
                path: "/static".to_string(),
                name: "assets".to_string(),
                methods: None,
            },
        ])
    }

    #[test]
    fn test_path_naming() {
        let inst = instrumentation();
        assert_eq!(inst.path_name("/api/users", &Method::GET), "api");
        assert_eq!(inst.path_name("/api/users", &Method::POST), "/");
        assert_eq!(inst.path_name("/static/app.js", &Method::DELETE), "assets");
        assert_eq!(inst.path_name("/other", &Method::GET), "/");
    }

    #[test]
    fn test_skipped_paths_match_by_prefix() {
        let inst = instrumentation().skip_path("/stats");
        assert!(inst.is_skipped("/stats"));
        assert!(inst.is_skipped("/stats/"));
        assert!(!inst.is_skipped("/api/stats"));
    }

    #[test]
    fn test_record_updates_all_metrics() {
        let registry = Arc::new(Registry::new());
        let inst = Instrumentation::new(Arc::clone(&registry), "web-1");

        inst.record("/", StatusCode::OK, Duration::from_micros(250));
        inst.record("/", StatusCode::BAD_GATEWAY, Duration::from_micros(750));

        let tags = TagSet::from([("path", "/"), ("server", "web-1")]);
        assert_eq!(registry.counter_value("requests", &tags), Some(2));
        assert_eq!(registry.counter_value("errors", &tags), Some(1));
        assert_eq!(
            registry.counter_value("status_codes", &tags.clone().with("code", "502")),
            Some(1)
        );

        let sample = registry.sample("response_time", &tags).unwrap();
        assert_eq!(sample.values(), vec![250, 750]);
    }
}
