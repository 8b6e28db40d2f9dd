use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_stream::try_stream;
use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures::TryStreamExt;
use gateway_core::{DataStream, GatewayError, Identifier, Region};
use gateway_codec::range::{
    generate_boundary, multipart_closing_boundary, multipart_part_header, parse_range,
    region_from_explicit_range, ParsedRange,
};
use gateway_node::{attributes_from_headers, GatewayRuntime, PaymentContext, MANIFEST_CONTENT_TYPE};
use gateway_ratelimit::{resource_key, AdmissionDecision};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::logger::LogBuffer;

/// Shared state threaded through every handler: the composition root plus
/// the ambient admin surface (log ring buffer, admin bearer token).
#[derive(Clone)]
pub struct GatewayAppState {
    pub runtime: Arc<GatewayRuntime>,
    pub log_buffer: Arc<LogBuffer>,
    pub admin_token: Option<String>,
}

pub fn build_router(state: GatewayAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/peers", get(peers))
        .route("/admin-api/logs", get(admin_logs))
        .route(
            "/ar-io/rate-limit/ip/:ip",
            get(get_ip_rate_limit).post(post_ip_rate_limit),
        )
        .route(
            "/ar-io/rate-limit/resource",
            get(get_resource_rate_limit).post(post_resource_rate_limit),
        )
        .route("/raw/:id", get(get_raw))
        .route("/:id/*subpath", get(get_subpath))
        .route("/:id", get(get_by_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<GatewayAppState>) -> impl IntoResponse {
    state.runtime.metrics().render()
}

async fn peers(State(state): State<GatewayAppState>) -> impl IntoResponse {
    use gateway_peers::PeerCategory;

    let table = state.runtime.peers().table();
    let table = table.read().await;
    let snapshot = |category: PeerCategory| -> serde_json::Value {
        table
            .pool(category)
            .iter()
            .map(|(url, weight)| json!({"url": url, "weight": weight}))
            .collect()
    };
    Json(json!({
        "chain": snapshot(PeerCategory::Chain),
        "getChunk": snapshot(PeerCategory::GetChunk),
        "postChunk": snapshot(PeerCategory::PostChunk),
    }))
}

async fn admin_logs(
    State(state): State<GatewayAppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !admin_authenticated(&headers, state.admin_token.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }
    Json(state.log_buffer.get_all()).into_response()
}

fn admin_authenticated(headers: &HeaderMap, admin_token: Option<&str>) -> bool {
    let Some(expected) = admin_token else {
        return false;
    };
    let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let Some(presented) = auth.strip_prefix("Bearer ") else {
        return false;
    };
    presented == expected
}

#[derive(Debug, Deserialize)]
struct RateLimitTopOff {
    tokens: f64,
    #[serde(rename = "tokenType")]
    token_type: TokenType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TokenType {
    Paid,
    Regular,
}

#[derive(Debug, Deserialize)]
struct ResourceQuery {
    path: String,
    method: String,
    host: String,
}

async fn get_ip_rate_limit(
    State(state): State<GatewayAppState>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid ip"}))).into_response();
    };
    match state.runtime.admission().limiter().ip_bucket_state(ip).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_resource_rate_limit(
    State(state): State<GatewayAppState>,
    Query(query): Query<ResourceQuery>,
) -> impl IntoResponse {
    let key = resource_key(&query.method, &query.host, &query.path);
    match state
        .runtime
        .admission()
        .limiter()
        .resource_bucket_state(&key)
        .await
    {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn post_ip_rate_limit(
    State(state): State<GatewayAppState>,
    Path(ip): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RateLimitTopOff>,
) -> impl IntoResponse {
    if !admin_authenticated(&headers, state.admin_token.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }
    let Ok(ip) = ip.parse::<IpAddr>() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid ip"}))).into_response();
    };
    apply_top_off(&state, ip, "*", body).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn post_resource_rate_limit(
    State(state): State<GatewayAppState>,
    Query(query): Query<ResourceQuery>,
    headers: HeaderMap,
    Json(body): Json<RateLimitTopOff>,
) -> impl IntoResponse {
    if !admin_authenticated(&headers, state.admin_token.as_deref()) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"}))).into_response();
    }
    let key = resource_key(&query.method, &query.host, &query.path);
    apply_top_off(&state, IpAddr::from([0, 0, 0, 0]), &key, body).await;
    StatusCode::NO_CONTENT.into_response()
}

async fn apply_top_off(state: &GatewayAppState, ip: IpAddr, key: &str, body: RateLimitTopOff) {
    let admission = state.runtime.admission();
    match body.token_type {
        // `tokens` is already denominated in 1 KiB units; the x402 path
        // mirrors a verified-payment top-off with a unit capacity
        // multiplier so `tokens` lands in the bucket unscaled.
        TokenType::Paid => {
            admission
                .record_payment(ip, key, (body.tokens * 1024.0) as u64, 1.0)
                .await;
        }
        TokenType::Regular => {
            admission.record_manual_grant(ip, key, body.tokens).await;
        }
    }
}

async fn get_raw(
    State(state): State<GatewayAppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    match resolve_and_fetch(&state, &id, &headers, connect_info).await {
        Ok(served) => served.into_raw_response(&headers).await,
        Err(response) => response,
    }
}

async fn get_by_id(
    State(state): State<GatewayAppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    match resolve_and_fetch(&state, &id, &headers, connect_info).await {
        Ok(served) => served.into_response(&headers).await,
        Err(response) => response,
    }
}

async fn get_subpath(
    State(state): State<GatewayAppState>,
    Path((id, subpath)): Path<(String, String)>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let manifest_id: Identifier = match id.parse() {
        Ok(id) => id,
        Err(err) => return error_response(GatewayError::InvalidIdentifier(err)),
    };

    let Some(resolver) = state.runtime.manifest_resolver() else {
        return error_response(GatewayError::NotFound);
    };

    // The manifest payload itself is fetched only to learn its content
    // type; resolution of the target id is delegated to the external
    // collaborator per spec.md §1.
    let manifest_target = match admitted_fetch(&state, manifest_id, None, &headers, connect_info.clone()).await {
        Ok(served) if served.content_type.as_deref() == Some(MANIFEST_CONTENT_TYPE) => {
            resolver.resolve_subpath(&manifest_id, &subpath).await
        }
        Ok(_) => None,
        Err(response) => return response,
    };

    let Some(target_id) = manifest_target else {
        return error_response(GatewayError::NotFound);
    };

    let region = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(region_from_explicit_range);
    match admitted_fetch(&state, target_id, region, &headers, connect_info).await {
        Ok(served) => served.into_response(&headers).await,
        Err(response) => response,
    }
}

/// The declared size isn't known until the tier cascade resolves the
/// payload; both the pre-fetch rate-limit reservation and the payment
/// requirements computed before a response exists are priced off this
/// placeholder and reconciled against the real size afterwards.
const PRE_FETCH_SIZE_ESTIMATE: u64 = 1024;

/// The resolved stream, plus whatever's needed to render `Content-Range`.
///
/// `ScopedRange` means the tier cascade already fetched exactly the
/// requested window (the `Range` header resolved to a `Region` before the
/// fetch, per §5) — the total payload size was never learned, since the
/// upstream was only ever asked for the window. `Full` means the whole
/// object was fetched (no `Range` header, or one that couldn't be resolved
/// to a single window before the fetch) and the real total is known, so a
/// `Range` header is resolved against it here.
enum RenderableData {
    ScopedRange { stream: DataStream, region: Region },
    Full { stream: DataStream, total: u64 },
}

/// One resolved retrieval plus everything rendering needs to stream the
/// response body directly from the tier's `DataStream`.
struct Served {
    id: Identifier,
    content_type: Option<String>,
    verified: bool,
    trusted: bool,
    data: RenderableData,
    payment_response: Option<String>,
}

impl Served {
    fn content_type(&self) -> String {
        self.content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    fn cache_control(&self) -> &'static str {
        if self.verified || self.trusted {
            "public, max-age=2592000, immutable"
        } else {
            "public, max-age=7200"
        }
    }

    fn etag(&self) -> String {
        format!("\"{}\"", self.id.to_wire_string())
    }

    async fn into_response(self, headers: &HeaderMap) -> Response {
        let payment_response = self.payment_response.clone();
        let mut response = render(self.data, self.content_type(), self.cache_control(), self.etag(), headers, true).await;
        attach_payment_response(&mut response, payment_response);
        response
    }

    async fn into_raw_response(self, headers: &HeaderMap) -> Response {
        let payment_response = self.payment_response.clone();
        let mut response = render(
            self.data,
            self.content_type(),
            self.cache_control(),
            self.etag(),
            headers,
            false,
        )
        .await;
        let response_headers = response.headers_mut();
        response_headers.insert(
            header::CONTENT_SECURITY_POLICY,
            "default-src 'self'".parse().unwrap(),
        );
        response_headers.insert("Cross-Origin-Opener-Policy", "same-origin".parse().unwrap());
        response_headers.insert(
            "Cross-Origin-Embedder-Policy",
            "require-corp".parse().unwrap(),
        );
        response_headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
        attach_payment_response(&mut response, payment_response);
        response
    }
}

fn attach_payment_response(response: &mut Response, payment_response: Option<String>) {
    if let Some(receipt) = payment_response {
        if let Ok(value) = receipt.parse() {
            response.headers_mut().insert("X-Payment-Response", value);
        }
    }
}

/// Renders a 402 with the computed payment requirements as the JSON body,
/// per §4.6 step 4's "respond with status 402 including the computed
/// requirements" rule.
fn payment_required_response(requirements: &gateway_node::PaymentRequirements) -> Response {
    let mut response = (StatusCode::PAYMENT_REQUIRED, Json(requirements)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, "no-store".parse().unwrap());
    response
}

/// Renders the response body directly from the tier's `DataStream`,
/// honoring `If-None-Match` and `Range` per spec.md §6 without buffering
/// the payload: the response body stream is returned as-is (or windowed
/// to a sub-range) so client-socket backpressure propagates back through
/// to the tier cascade's chunk fetches, per spec.md §4.1 and §5.
/// `allow_cors` is false for `/raw/{id}`, which strips any CORS header the
/// permissive layer would otherwise add.
async fn render(
    data: RenderableData,
    content_type: String,
    cache_control: &'static str,
    etag: String,
    headers: &HeaderMap,
    allow_cors: bool,
) -> Response {
    if let Some(candidate) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        if candidate == etag {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            let h = response.headers_mut();
            h.insert(header::ETAG, etag.parse().unwrap());
            h.insert(header::CACHE_CONTROL, cache_control.parse().unwrap());
            if !allow_cors {
                h.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
            }
            return response;
        }
    }

    match data {
        RenderableData::ScopedRange { stream, region } => {
            single_range_response(stream, region, None, &content_type, cache_control, &etag)
        }
        RenderableData::Full { stream, total } => {
            let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
            match range_header.map(|h| parse_range(h, total)) {
                Some(ParsedRange::Single(region)) => {
                    let windowed = windowed_stream(stream, region.offset, region.size);
                    single_range_response(windowed, region, Some(total), &content_type, cache_control, &etag)
                }
                Some(ParsedRange::Multi(regions)) => {
                    match multi_range_response(stream, &regions, total, &content_type, cache_control, &etag).await {
                        Ok(response) => response,
                        Err(err) => error_response(err),
                    }
                }
                Some(ParsedRange::Unsatisfiable) => {
                    let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                    response
                        .headers_mut()
                        .insert(header::CONTENT_RANGE, format!("bytes */{total}").parse().unwrap());
                    response
                }
                // A malformed Range header or no Range header at all: serve
                // the full payload, per RFC 7233's "ignore unparseable
                // Range" rule.
                Some(ParsedRange::Malformed) | None => {
                    let mut response = (StatusCode::OK, Body::from_stream(stream)).into_response();
                    let h = response.headers_mut();
                    h.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
                    h.insert(header::CACHE_CONTROL, cache_control.parse().unwrap());
                    h.insert(header::ETAG, etag.parse().unwrap());
                    response
                }
            }
        }
    }
}

/// Wraps `stream` in a 206 response. `total` is `None` when the upstream
/// fetch was already scoped to `region` and the full object size was
/// never learned — RFC 7233 allows `*` for an unknown instance-length.
fn single_range_response(
    stream: DataStream,
    region: Region,
    total: Option<u64>,
    content_type: &str,
    cache_control: &'static str,
    etag: &str,
) -> Response {
    let mut response = (StatusCode::PARTIAL_CONTENT, Body::from_stream(stream)).into_response();
    let h = response.headers_mut();
    h.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
    h.insert(header::CACHE_CONTROL, cache_control.parse().unwrap());
    h.insert(header::ETAG, etag.parse().unwrap());
    let total_str = total.map(|t| t.to_string()).unwrap_or_else(|| "*".to_string());
    h.insert(
        header::CONTENT_RANGE,
        format!("bytes {}-{}/{}", region.offset, region.end_inclusive(), total_str)
            .parse()
            .unwrap(),
    );
    response
}

/// Trims `stream` to the byte window `[start, start + len)`, mirroring
/// `gateway_chunks::assembly::assemble_stream`'s chunk-boundary trimming.
fn windowed_stream(stream: DataStream, start: u64, len: u64) -> DataStream {
    Box::pin(try_stream! {
        let end = start + len;
        let mut consumed = 0u64;
        futures::pin_mut!(stream);
        while let Some(chunk) = stream.try_next().await? {
            let chunk_start = consumed;
            let chunk_len = chunk.len() as u64;
            let chunk_end = chunk_start + chunk_len;
            consumed = chunk_end;

            let emit_start = chunk_start.max(start);
            let emit_end = chunk_end.min(end);
            if emit_start < emit_end {
                let local_start = (emit_start - chunk_start) as usize;
                let local_end = (emit_end - chunk_start) as usize;
                yield chunk.slice(local_start..local_end);
            }
            if chunk_end >= end {
                break;
            }
        }
    })
}

/// Builds the `multipart/byteranges` body for a multi-range request. Unlike
/// the single-range and full-body paths, this can't stream directly: the
/// parts may reference overlapping or out-of-order windows over one
/// single-pass stream, so the source is collected once here. Multi-range
/// requests are rare in practice; the common paths (no `Range`, or a
/// single range) never hit this function.
async fn multi_range_response(
    stream: DataStream,
    regions: &[Region],
    total: u64,
    content_type: &str,
    cache_control: &'static str,
    etag: &str,
) -> Result<Response, GatewayError> {
    let bytes = collect_bytes(stream).await?;
    let boundary = generate_boundary();
    let mut body = Vec::new();
    for region in regions {
        body.extend_from_slice(multipart_part_header(&boundary, content_type, region, total).as_bytes());
        body.extend_from_slice(&bytes[(region.offset as usize)..(region.end() as usize)]);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(multipart_closing_boundary(&boundary).as_bytes());

    let mut response = (StatusCode::PARTIAL_CONTENT, body).into_response();
    let h = response.headers_mut();
    h.insert(
        header::CONTENT_TYPE,
        format!("multipart/byteranges; boundary={boundary}").parse().unwrap(),
    );
    h.insert(header::CACHE_CONTROL, cache_control.parse().unwrap());
    h.insert(header::ETAG, etag.parse().unwrap());
    Ok(response)
}

/// Collects a stream into one contiguous buffer. Used only by the
/// multi-range fallback, which needs random access across parts.
async fn collect_bytes(stream: DataStream) -> Result<Bytes, GatewayError> {
    let chunks: Vec<Bytes> = stream.try_collect().await?;
    if chunks.len() == 1 {
        return Ok(chunks.into_iter().next().unwrap());
    }
    let mut out = Vec::with_capacity(chunks.iter().map(Bytes::len).sum());
    for chunk in chunks {
        out.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(out))
}

async fn resolve_and_fetch(
    state: &GatewayAppState,
    id: &str,
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Served, Response> {
    let identifier: Identifier = id
        .parse()
        .map_err(|e| error_response(GatewayError::InvalidIdentifier(e)))?;
    let region = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(region_from_explicit_range);
    admitted_fetch(state, identifier, region, headers, connect_info).await
}

/// Runs the admission gate (§4.6) and, on success, the tier cascade. The
/// returned `Served` carries the tier's stream untouched — rendering and
/// any `Range` windowing happen downstream in `render`, never here.
async fn admitted_fetch(
    state: &GatewayAppState,
    id: Identifier,
    region: Option<Region>,
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<Served, Response> {
    let ip = primary_client_ip(headers, connect_info);
    let path = format!("/{}", id.to_wire_string());
    let key = resource_key("GET", host_header(headers), &path);

    let bypass = state
        .runtime
        .resource_name_allowlist()
        .iter()
        .any(|allowed| allowed == &path);

    // Step 4: a configured payment processor prices the request before
    // rate-limit admission is consulted. A presented `X-Payment` token is
    // verified and settled here; a missing or rejected token only becomes
    // a 402 if the rate-limit check below actually denies the request.
    let processor = if bypass { None } else { state.runtime.payment_processor() };
    let mut requirements = None;
    let mut payment_response = None;
    if let Some(processor) = &processor {
        let ctx = PaymentContext {
            content_size: PRE_FETCH_SIZE_ESTIMATE,
            protocol: scheme_header(headers),
            host: host_header(headers).to_string(),
            original_url: path.clone(),
            content_type: None,
        };
        let computed = processor.requirements(&ctx);

        if let Some(token) = headers.get("x-payment").and_then(|v| v.to_str().ok()) {
            match processor.verify(token, &computed).await {
                Ok(()) => match processor.settle(token).await {
                    Ok(receipt) => {
                        state
                            .runtime
                            .admission()
                            .record_payment(
                                ip,
                                &key,
                                PRE_FETCH_SIZE_ESTIMATE,
                                state.runtime.payment_capacity_multiplier(),
                            )
                            .await;
                        state.runtime.metrics().record_payment_verified();
                        payment_response = Some(receipt.receipt);
                    }
                    Err(_) => {
                        state.runtime.metrics().record_payment_failed();
                        return Err(payment_required_response(&computed));
                    }
                },
                Err(_) => {
                    state.runtime.metrics().record_payment_failed();
                    return Err(payment_required_response(&computed));
                }
            }
        }
        requirements = Some(computed);
    }
    let payment_verified = payment_response.is_some();

    let reservation = if bypass {
        None
    } else {
        // Declared size is unknown before the cascade resolves the
        // payload; reserve the one-token minimum and reconcile against the
        // actual size once the response is known, per §4.5's
        // check-reserve-adjust protocol.
        match state
            .runtime
            .admission()
            .admit(ip, key.clone(), PRE_FETCH_SIZE_ESTIMATE)
            .await
        {
            AdmissionDecision::Allowlisted => {
                state.runtime.metrics().record_admission_allowed();
                None
            }
            AdmissionDecision::Admitted(reservation) => {
                state.runtime.metrics().record_admission_allowed();
                Some(reservation)
            }
            AdmissionDecision::Denied(_) => {
                // Step 5: a denial with a processor configured and no
                // verified payment surfaces as 402, not 429.
                if let Some(requirements) = requirements.filter(|_| !payment_verified) {
                    state.runtime.metrics().record_admission_denied_payment();
                    return Err(payment_required_response(&requirements));
                }
                state.runtime.metrics().record_admission_denied_rate_limit();
                return Err(error_response(GatewayError::RateLimited));
            }
        }
    };

    let attrs = attributes_from_headers(|name| {
        headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    });

    let outcome = state
        .runtime
        .fetch(id, region, attrs, CancellationToken::new())
        .await;

    let data = match outcome {
        Ok(outcome) => outcome.data,
        Err(err) => {
            if let Some(reservation) = reservation {
                state.runtime.admission().adjust(&reservation, 0).await;
            }
            return Err(error_response(err));
        }
    };

    let content_type = data.source_content_type.clone();
    let verified = data.verified;
    let trusted = data.trusted;
    let fetched_size = data.size;

    if let Some(reservation) = reservation {
        state.runtime.admission().adjust(&reservation, fetched_size).await;
    }

    let renderable = match region {
        Some(region) => RenderableData::ScopedRange {
            stream: data.stream,
            region,
        },
        None => RenderableData::Full {
            stream: data.stream,
            total: fetched_size,
        },
    };

    Ok(Served {
        id,
        content_type,
        verified,
        trusted,
        data: renderable,
        payment_response,
    })
}

fn scheme_header(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https")
        .to_string()
}

fn host_header(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Extracts the primary client IP per §4.6 step 1: the first
/// `X-Forwarded-For` entry, then `X-Real-IP`, then the socket's remote
/// address, normalizing an IPv4-mapped IPv6 address on the way out.
fn primary_client_ip(headers: &HeaderMap, connect_info: Option<ConnectInfo<SocketAddr>>) -> IpAddr {
    use gateway_ratelimit::allowlist::normalize;

    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return normalize(forwarded);
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return normalize(real_ip);
    }
    connect_info
        .map(|ConnectInfo(addr)| normalize(addr.ip()))
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

fn error_response(err: GatewayError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let cache_control = if matches!(err, GatewayError::NotFound) {
        "public, max-age=60, immutable"
    } else {
        "no-store"
    };
    let mut response = (
        status,
        Json(json!({"error": status.canonical_reason().unwrap_or("error"), "message": err.to_string()})),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control.parse().unwrap());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_authenticated_requires_matching_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert!(admin_authenticated(&headers, Some("secret")));
        assert!(!admin_authenticated(&headers, Some("other")));
        assert!(!admin_authenticated(&headers, None));
    }

    #[test]
    fn primary_ip_prefers_x_forwarded_for_over_real_ip_and_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());
        let ip = primary_client_ip(&headers, None);
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn primary_ip_falls_back_to_socket_when_no_headers_present() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.0.2.1:443".parse().unwrap();
        let ip = primary_client_ip(&headers, Some(ConnectInfo(addr)));
        assert_eq!(ip, "192.0.2.1".parse::<IpAddr>().unwrap());
    }
}
