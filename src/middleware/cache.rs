//! Tag-based response cache for GET requests.
//!
//! Entries are tagged from their URL (collection, single submission, query
//! filters). Mutations invalidate by tag so the next read goes back to the
//! store.

use actix_web::body::to_bytes;
use actix_web::{
    Error, HttpResponse,
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        Method, StatusCode,
        header::{self, HeaderName, HeaderValue},
    },
    web::Bytes,
};
use futures::future::{LocalBoxFuture, Ready, ok};
use moka::future::Cache;
use regex::Regex;
use std::{
    collections::HashMap,
    rc::Rc,
    sync::{Arc, LazyLock, Mutex, PoisonError},
    task::{Context, Poll},
    time::Duration,
};

/// Tag carried by every cached read of the submissions collection.
pub const SUBMISSIONS_TAG: &str = "overtime-submissions";

#[derive(Clone)]
pub struct CachedHttp {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub tags: Vec<String>,
}

struct ResourcePattern {
    name: &'static str,
    path_regex: Regex,
    id_capture_group: Option<usize>,
    query_params: &'static [&'static str],
}

static RESOURCE_PATTERNS: LazyLock<Vec<ResourcePattern>> = LazyLock::new(|| {
    vec![
        ResourcePattern {
            name: SUBMISSIONS_TAG,
            path_regex: Regex::new(r"^/api/v1/overtime-submissions/summary(?:\?|$)")
                .expect("valid summary pattern"),
            id_capture_group: None,
            query_params: &["employee", "from", "to"],
        },
        ResourcePattern {
            name: SUBMISSIONS_TAG,
            path_regex: Regex::new(r"^/api/v1/overtime-submissions(?:/([a-f0-9-]{36}))?(?:\?|$)")
                .expect("valid submissions pattern"),
            id_capture_group: Some(1),
            query_params: &["status", "kind", "submittedBy", "supervisor", "year"],
        },
    ]
});

/// Infer invalidation tags for a request URI.
pub fn infer_tags(uri: &str) -> Vec<String> {
    let mut tags = Vec::new();

    for pattern in RESOURCE_PATTERNS.iter() {
        if let Some(captures) = pattern.path_regex.captures(uri) {
            tags.push(pattern.name.to_string());

            if let Some(id) = pattern
                .id_capture_group
                .and_then(|group| captures.get(group))
            {
                tags.push(format!("{}:{}", pattern.name, id.as_str()));
            }

            for param in pattern.query_params {
                if let Some(value) = extract_query_param(uri, param) {
                    tags.push(format!("{}:{}:{}", pattern.name, param, value));
                }
            }
            break;
        }
    }

    tags
}

fn extract_query_param(uri: &str, param: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == param).then(|| value.to_string())
    })
}

/// Response cache shared by the middleware and the mutation path.
///
/// Every tag carries a generation that is bumped before its entries are
/// dropped. A response is only kept if the generations of its tags did not
/// move while it was being computed.
#[derive(Clone)]
pub struct CacheLayer {
    pub cache: Arc<Cache<String, CachedHttp>>,
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl CacheLayer {
    pub fn new(max_capacity: u64, ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .support_invalidation_closures()
            .build();
        Self {
            cache: Arc::new(cache),
            generations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current generation of each tag, in order.
    pub fn snapshot(&self, tags: &[String]) -> Vec<u64> {
        let generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
        tags.iter()
            .map(|tag| generations.get(tag).copied().unwrap_or(0))
            .collect()
    }

    pub async fn invalidate_tag(&self, tag: &str) {
        self.invalidate_by_tags(&[tag.to_string()]).await;
    }

    pub async fn invalidate_by_tags(&self, tags: &[String]) {
        {
            let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
            for tag in tags {
                *generations.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        let targets = tags.to_vec();
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |_, cached| cached.tags.iter().any(|t| targets.contains(t)))
        {
            log::warn!("Falling back to a full cache flush: {}", e);
            self.cache.invalidate_all();
        }
        log::debug!("Invalidated cache tags {:?}", tags);
    }

    /// Store an entry computed after `snapshot` was taken.
    ///
    /// The entry is dropped again when one of its tags was invalidated in
    /// the meantime. Returns whether it stayed cached.
    pub async fn store_if_fresh(&self, key: String, cached: CachedHttp, snapshot: &[u64]) -> bool {
        let tags = cached.tags.clone();
        self.cache.insert(key.clone(), cached).await;

        if self.snapshot(&tags) != snapshot {
            self.cache.invalidate(&key).await;
            log::debug!("Discarded stale response for {}", key);
            return false;
        }
        true
    }

    /// Responses depend on who asks, so the bearer token is part of the key.
    pub fn make_key(method: &Method, uri: &str, auth: Option<&str>) -> String {
        format!("{method}:{uri}:auth={}", auth.unwrap_or(""))
    }
}

pub struct ResponseCacheMiddleware {
    cache_layer: CacheLayer,
}

impl ResponseCacheMiddleware {
    pub fn new(cache_layer: CacheLayer) -> Self {
        Self { cache_layer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ResponseCacheMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
    <B as MessageBody>::Error: actix_web::ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = ResponseCacheMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ResponseCacheMiddlewareService {
            service: Rc::new(service),
            cache_layer: self.cache_layer.clone(),
        })
    }
}

pub struct ResponseCacheMiddlewareService<S> {
    service: Rc<S>,
    cache_layer: CacheLayer,
}

impl<S, B> Service<ServiceRequest> for ResponseCacheMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
    <B as MessageBody>::Error: actix_web::ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let uri = req.uri().to_string();
        let tags = infer_tags(&uri);

        // Only GETs on known resources are cached
        if req.method() != Method::GET || tags.is_empty() {
            let svc = self.service.clone();
            return Box::pin(async move { Ok(svc.call(req).await?.map_into_boxed_body()) });
        }

        let auth_header = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_owned());
        let key = CacheLayer::make_key(req.method(), &uri, auth_header.as_deref());

        let cache_layer = self.cache_layer.clone();
        let svc = self.service.clone();
        let snapshot = cache_layer.snapshot(&tags);

        Box::pin(async move {
            if let Some(cached) = cache_layer.cache.get(&key).await {
                log::debug!("Cache hit for {}", uri);
                let mut builder = HttpResponse::build(
                    StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK),
                );
                for (k, v) in &cached.headers {
                    if let (Ok(name), Ok(val)) =
                        (HeaderName::try_from(k.as_str()), HeaderValue::from_str(v))
                    {
                        builder.insert_header((name, val));
                    }
                }
                let res = builder.body(Bytes::from(cached.body)).map_into_boxed_body();
                return Ok(req.into_response(res));
            }

            let res = svc.call(req).await?;
            let (req, res) = res.into_parts();
            let status = res.status();
            let headers = res.headers().clone();

            let body_bytes = to_bytes(res.into_body()).await?;
            let mut builder = HttpResponse::build(status);
            for (k, v) in headers.iter() {
                builder.insert_header((k.clone(), v.clone()));
            }
            let out_res = builder.body(body_bytes.clone()).map_into_boxed_body();

            if status.is_success() {
                let cached = CachedHttp {
                    status: status.as_u16(),
                    headers: headers
                        .iter()
                        .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
                        .collect(),
                    body: body_bytes.to_vec(),
                    tags,
                };
                cache_layer.store_if_fresh(key, cached, &snapshot).await;
            }

            Ok(ServiceResponse::new(req, out_res))
        })
    }
}
