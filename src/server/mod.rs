//! HTTP serving surface: `GET /health` and `POST /recommend`.
//!
//! Each accepted connection runs on its own thread against a shared
//! [`Recommender`]. Sockets carry read and write timeouts so a stalled
//! client releases its thread.

pub mod http;

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{ArError, ErrorCode, StructuredError};
use crate::recommend::Recommender;
use crate::rerank::Recommendation;

pub use http::{read_request, write_response, HttpRequest, HttpResponse};

#[derive(Debug, Deserialize)]
struct RecommendRequest {
    query: String,
}

/// Wire form of one recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRecommendation {
    pub id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub why_fit: String,
    pub duration: Option<String>,
    pub duration_minutes: Option<u32>,
    pub category: String,
}

impl From<&Recommendation> for ApiRecommendation {
    fn from(rec: &Recommendation) -> Self {
        Self {
            id: rec.record_id.clone(),
            name: rec.name.clone(),
            url: rec.url.clone(),
            description: rec.description.clone(),
            why_fit: rec.why_fit.clone(),
            duration: rec.duration_minutes.map(|minutes| format!("{minutes} minutes")),
            duration_minutes: rec.duration_minutes,
            category: rec.category.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub query: String,
    pub recommendations: Vec<ApiRecommendation>,
}

/// Dispatch one parsed request.
pub fn route(recommender: &Recommender, request: &HttpRequest) -> HttpResponse {
    let response = match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => health(recommender),
        ("POST", "/recommend") => recommend(recommender, &request.body),
        ("OPTIONS", _) => HttpResponse::empty(204)
            .with_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
            .with_header("Access-Control-Allow-Headers", "Content-Type"),
        (_, "/health" | "/recommend") => error_response(&StructuredError::new(
            ErrorCode::HttpProtocol,
            format!("{} not allowed on {}", request.method, request.path),
        ))
        .with_status(405),
        _ => error_response(&StructuredError::new(
            ErrorCode::NotFound,
            format!("no route for {}", request.path),
        )),
    };
    response.with_header("Access-Control-Allow-Origin", "*")
}

fn health(recommender: &Recommender) -> HttpResponse {
    let health = recommender.health();
    if health.ready {
        HttpResponse::json(
            200,
            &serde_json::json!({
                "status": "ready",
                "records": health.records,
                "render_version": health.render_version,
                "embedder": health.embedder,
                "generator": health.generator,
                "fingerprint": health.fingerprint,
            }),
        )
    } else {
        HttpResponse::json(503, &serde_json::json!({ "status": "not_ready" }))
    }
}

fn recommend(recommender: &Recommender, body: &[u8]) -> HttpResponse {
    let request: RecommendRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            return error_response(&ArError::InvalidQuery(format!("bad request body: {err}")).to_structured());
        }
    };

    let query = request.query.trim();
    match recommender.recommend(query) {
        Ok(recommendations) => HttpResponse::json(
            200,
            &RecommendResponse {
                query: query.to_string(),
                recommendations: recommendations.iter().map(ApiRecommendation::from).collect(),
            },
        ),
        Err(err) => {
            if err.code().http_status() >= 500 {
                error!(error = %err, "recommend failed");
            } else {
                debug!(error = %err, "recommend rejected");
            }
            error_response(&err.to_structured())
        }
    }
}

fn error_response(error: &StructuredError) -> HttpResponse {
    HttpResponse::json(
        error.code.http_status(),
        &serde_json::json!({ "error": error }),
    )
}

/// Default per-connection socket timeout.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking TCP server.
pub struct Server {
    listener: TcpListener,
    recommender: Arc<Recommender>,
    io_timeout: Duration,
}

impl Server {
    pub fn bind(addr: impl ToSocketAddrs, recommender: Arc<Recommender>) -> crate::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            recommender,
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    /// Read/write timeout applied to every accepted socket. Zero is raised
    /// to one millisecond since sockets reject a zero timeout.
    #[must_use]
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub fn serve(self) -> crate::Result<()> {
        info!(addr = %self.local_addr()?, "serving");
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let recommender = Arc::clone(&self.recommender);
                    let io_timeout = self.io_timeout;
                    thread::spawn(move || handle_connection(stream, &recommender, io_timeout));
                }
                Err(err) => warn!(error = %err, "accept failed"),
            }
        }
        Ok(())
    }
}

fn handle_connection(mut stream: TcpStream, recommender: &Recommender, io_timeout: Duration) {
    let peer = stream.peer_addr().ok();
    if let Err(err) = stream
        .set_read_timeout(Some(io_timeout))
        .and_then(|()| stream.set_write_timeout(Some(io_timeout)))
    {
        warn!(?peer, error = %err, "could not set socket timeouts; dropping connection");
        return;
    }

    let request = read_request(&mut BufReader::new(&stream));
    let response = match request {
        Ok(Some(request)) => {
            debug!(?peer, method = %request.method, path = %request.path, "request");
            route(recommender, &request)
        }
        Ok(None) => {
            debug!(?peer, "connection closed or idle before a request");
            return;
        }
        Err(err) => {
            debug!(?peer, error = %err, "rejected request");
            error_response(&err.to_structured())
        }
    };
    if let Err(err) = write_response(&mut stream, &response) {
        debug!(?peer, error = %err, "client went away");
    }
    let _ = stream.shutdown(Shutdown::Write);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, Category};
    use crate::recommend::QueryResolver;
    use crate::rerank::{HeuristicGenerator, Reranker, ResultBounds};
    use crate::search::{CatalogIndex, HashEmbedder};
    use std::collections::BTreeSet;

    fn recommender(loaded: bool) -> Recommender {
        let recommender = Recommender::new(
            Box::new(HashEmbedder::default()),
            Reranker::new(Box::new(HeuristicGenerator), ResultBounds::default()),
            QueryResolver::offline(),
            20,
            0,
        );
        if loaded {
            let records = vec![CatalogRecord {
                id: "java".into(),
                name: "Core Java".into(),
                url: "https://example.com/java".into(),
                description: "Java knowledge.".into(),
                category: Category::KnowledgeSkills,
                job_levels: BTreeSet::new(),
                languages: BTreeSet::new(),
                duration_minutes: Some(30),
            }];
            let index = CatalogIndex::build(records, recommender.embedder()).unwrap();
            recommender.install(index).unwrap();
        }
        recommender
    }

    fn request(method: &str, path: &str, body: &str) -> HttpRequest {
        HttpRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn json(response: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn health_reflects_index_state() {
        let not_ready = route(&recommender(false), &request("GET", "/health", ""));
        assert_eq!(not_ready.status, 503);
        assert_eq!(json(&not_ready)["status"], "not_ready");

        let ready = route(&recommender(true), &request("GET", "/health", ""));
        assert_eq!(ready.status, 200);
        assert_eq!(json(&ready)["records"], 1);
    }

    #[test]
    fn recommend_returns_api_shape() {
        let response = route(
            &recommender(true),
            &request("POST", "/recommend", r#"{"query":"  Java developer "}"#),
        );
        assert_eq!(response.status, 200);
        let body = json(&response);
        assert_eq!(body["query"], "Java developer");
        let first = &body["recommendations"][0];
        assert_eq!(first["name"], "Core Java");
        assert_eq!(first["duration"], "30 minutes");
        assert_eq!(first["category"], "Knowledge & Skills");
        assert!(!first["why_fit"].as_str().unwrap().is_empty());
    }

    #[test]
    fn errors_map_to_status_codes() {
        let loaded = recommender(true);
        let empty = route(&loaded, &request("POST", "/recommend", r#"{"query":"   "}"#));
        assert_eq!(empty.status, 400);
        assert_eq!(json(&empty)["error"]["code"], "QUERY_INVALID");
        assert_eq!(json(&empty)["error"]["numeric_code"], 202);

        let garbage = route(&loaded, &request("POST", "/recommend", "not json"));
        assert_eq!(garbage.status, 400);

        let unloaded = route(&recommender(false), &request("POST", "/recommend", r#"{"query":"java"}"#));
        assert_eq!(unloaded.status, 503);

        assert_eq!(route(&loaded, &request("GET", "/nope", "")).status, 404);
        assert_eq!(route(&loaded, &request("DELETE", "/health", "")).status, 405);
        assert_eq!(route(&loaded, &request("OPTIONS", "/recommend", "")).status, 204);
    }
}
