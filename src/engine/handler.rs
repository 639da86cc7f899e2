use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, Request, State};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use http::StatusCode;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::LogType;
use crate::ip::{extract_client_ip, ClientIpError};
use crate::middleware::{apply_security_headers, request_id_middleware};
use crate::model::{Action, DetectionResult, GuestRisk, HostSafe, RuleMessageInfo, SiteStatus, WebLog};
use crate::pipeline::RequestContext;
use crate::proxy::ProxyError;

use super::Engine;

/// Which listener a request arrived on: its port (for host-table lookups
/// scoped to a port) and whether it terminated TLS (for HSTS and for
/// deciding whether the auto-HTTPS-jump redirect applies).
#[derive(Debug, Clone, Copy)]
pub struct ListenerMeta {
    pub port: u16,
    pub tls: bool,
}

pub fn build_router(engine: Arc<Engine>) -> Router {
    let body_limit = engine.config.server.body_limit_bytes;
    Router::new()
        .fallback(handle_request)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(body_limit))
        .with_state(engine)
}

async fn handle_request(
    State(engine): State<Arc<Engine>>,
    axum::Extension(meta): axum::Extension<ListenerMeta>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let host_name = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(':').next())
        .unwrap_or("")
        .to_string();
    let host = engine.routing.resolve(&host_name, meta.port);
    let unresolved_host = host.code == "_global_" && host_name != engine.config.global_host.global_host_name;

    if unresolved_host {
        let mut log = bare_log(&host, &host_name, remote_addr.ip(), &parts, start);
        log.status = StatusCode::FORBIDDEN.as_u16();
        log.action = Action::Forbid;
        log.guest_risk = GuestRisk::UnresolvedHost;
        log.title = Some("Host forbidden".to_string());
        let response = plain_response(
            StatusCode::FORBIDDEN,
            &format!("403: Host forbidden {host_name}:{}", meta.port),
        );
        return finish(&engine, &meta, start, &host, parts.uri.path(), response, log);
    }

    let client_ip = match extract_client_ip(
        &parts.headers,
        remote_addr,
        &engine.config.record.proxy_headers,
        &engine.config.server.trusted_proxies,
    ) {
        Ok(ip) => IpAddr::V4(ip),
        Err(error) => {
            return client_ip_rejected_response(error, &engine, &host.code, &host_name, start);
        }
    };

    if host.start_status == SiteStatus::Closed {
        let mut log = bare_log(&host, &host_name, client_ip, &parts, start);
        log.status = StatusCode::SERVICE_UNAVAILABLE.as_u16();
        log.action = Action::Forbid;
        log.title = Some("Site closed".to_string());
        let response = plain_response(StatusCode::SERVICE_UNAVAILABLE, "503: Site closed");
        return finish(&engine, &meta, start, &host, parts.uri.path(), response, log);
    }

    if !meta.tls && host.ssl_enabled && host.auto_jump_https {
        let mut log = bare_log(&host, &host_name, client_ip, &parts, start);
        let redirect_code = engine.config.record.redirect_https_code;
        log.status = redirect_code;
        log.action = Action::Release;
        let location = https_redirect_target(&host_name, &host, &parts.uri);
        let mut response = Response::new(Body::empty());
        *response.status_mut() =
            StatusCode::from_u16(redirect_code).unwrap_or(StatusCode::PERMANENT_REDIRECT);
        response
            .headers_mut()
            .insert(LOCATION, location.parse().unwrap());
        return finish(&engine, &meta, start, &host, parts.uri.path(), response, log);
    }

    let body_bytes = match to_bytes(body, engine.config.server.body_limit_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response_with_headers(&engine, meta),
    };
    let body_peek = if body_bytes.is_empty() {
        None
    } else {
        let peek_len = body_bytes.len().min(engine.config.record.max_body_length);
        Some(String::from_utf8_lossy(&body_bytes[..peek_len]).into_owned())
    };

    let uri_path = parts.uri.path();
    let query = parts.uri.query().unwrap_or("");

    let ctx = RequestContext {
        host: host.clone(),
        client_ip,
        method: &parts.method,
        uri_path,
        query,
        headers: &parts.headers,
        body_peek: body_peek.as_deref(),
    };
    let verdict = engine.pipeline.evaluate(&ctx);

    let user_agent = ctx.header_str("user-agent").map(str::to_string);
    let referer = ctx.header_str("referer").map(str::to_string);
    let full_uri = ctx.full_uri();

    let mut log = WebLog {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        host_code: host.code.clone(),
        host_name: host_name.clone(),
        client_ip,
        method: parts.method.to_string(),
        uri: full_uri,
        status: 0,
        action: Action::Pass,
        guest_risk: GuestRisk::Normal,
        rule_name: None,
        title: None,
        user_agent,
        referer,
        request_body_excerpt: body_peek.clone(),
        response_body_excerpt: None,
        duration_ms: 0,
        country: if let IpAddr::V4(v4) = client_ip { engine.geo.lookup(v4) } else { None },
        tenant_id: engine.config.global_host.tenant_id.clone(),
        user_code: engine.config.global_host.user_code.clone(),
    };

    let response = if verdict.is_block {
        finish_blocked(&engine, &mut log, &verdict)
    } else {
        match forward_to_backend(&engine, &host, &parts.method, uri_path, query, &parts.headers, body_bytes, client_ip).await {
            Ok((response, status)) => {
                log.action = if verdict.jump_remaining_guards {
                    Action::Release
                } else {
                    Action::Pass
                };
                log.status = status.as_u16();
                response
            }
            Err(ProxyError::UpstreamLoop) => {
                log.action = Action::Forbid;
                log.status = StatusCode::INTERNAL_SERVER_ERROR.as_u16();
                tracing::warn!(host = %host.code, "upstream loop detected, refusing to forward");
                plain_response(StatusCode::INTERNAL_SERVER_ERROR, "500: upstream loop detected")
            }
            Err(error) => {
                tracing::warn!(host = %host.code, %error, "upstream request failed");
                log.action = Action::Forbid;
                log.status = StatusCode::SERVICE_UNAVAILABLE.as_u16();
                plain_response(StatusCode::SERVICE_UNAVAILABLE, "503: upstream unavailable")
            }
        }
    };

    finish(&engine, &meta, start, &host, uri_path, response, log)
}

/// The minimal access-log record for a short-circuit that never reaches the
/// detection pipeline (unresolved host, site closed, HTTPS redirect).
fn bare_log(host: &HostSafe, host_name: &str, client_ip: IpAddr, parts: &http::request::Parts, start: Instant) -> WebLog {
    WebLog {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        host_code: host.code.clone(),
        host_name: host_name.to_string(),
        client_ip,
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        status: 0,
        action: Action::Pass,
        guest_risk: GuestRisk::Normal,
        rule_name: None,
        title: None,
        user_agent: parts.headers.get("user-agent").and_then(|v| v.to_str().ok()).map(str::to_string),
        referer: parts.headers.get("referer").and_then(|v| v.to_str().ok()).map(str::to_string),
        request_body_excerpt: None,
        response_body_excerpt: None,
        duration_ms: start.elapsed().as_millis() as u64,
        country: None,
        tenant_id: None,
        user_code: None,
    }
}

/// The `https://` URL a plain-HTTP request is redirected to for a host with
/// `auto_jump_https` enabled, preserving path and query. The host's own
/// configured port is used rather than the listener's; omitted when it's the
/// HTTPS default (443).
fn https_redirect_target(host_name: &str, host: &HostSafe, uri: &http::Uri) -> String {
    let port_suffix = match host.port {
        Some(port) if port != 443 => format!(":{port}"),
        _ => String::new(),
    };
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("https://{host_name}{port_suffix}{path_and_query}")
}

fn finish_blocked(engine: &Engine, log: &mut WebLog, verdict: &DetectionResult) -> Response {
    log.action = Action::Block;
    log.status = StatusCode::FORBIDDEN.as_u16();
    log.rule_name = Some(verdict.rule_name.clone());
    log.title = Some(verdict.title.clone());
    engine.queue.publish_rule_message(RuleMessageInfo {
        rule_name: verdict.rule_name.clone(),
        title: verdict.title.clone(),
        content: verdict.content.clone(),
        host_code: log.host_code.clone(),
    });
    plain_response(StatusCode::FORBIDDEN, &verdict.title)
}

/// Applies security headers, decides whether the request is logged
/// (`log_type` plus the host's `exclude_url_log` prefixes), and records the
/// request metric. The single tail every branch of `handle_request` funnels
/// through, so a short-circuit response gets the same treatment as one that
/// went through the full pipeline.
fn finish(
    engine: &Engine,
    meta: &ListenerMeta,
    start: Instant,
    host: &HostSafe,
    uri_path: &str,
    mut response: Response,
    mut log: WebLog,
) -> Response {
    apply_security_headers(&mut response, &engine.config.server.security_headers, meta.tls);

    log.duration_ms = start.elapsed().as_millis() as u64;
    log.truncate_bodies(engine.config.record.max_body_length, engine.config.record.max_res_body_length);

    let excluded = host.exclude_url_log.iter().any(|prefix| uri_path.starts_with(prefix.as_str()));
    let should_log = !excluded
        && match engine.config.record.log_type {
            LogType::All => true,
            LogType::AbnormalOnly => log.action != Action::Pass,
        };
    if should_log {
        engine.queue.publish_weblog(log);
    }

    crate::observability::metrics::record_http_request(&host.code, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}

async fn forward_to_backend(
    engine: &Engine,
    host: &crate::model::HostSafe,
    method: &http::Method,
    uri_path: &str,
    query: &str,
    headers: &http::HeaderMap,
    body: axum::body::Bytes,
    client_ip: IpAddr,
) -> Result<(Response, StatusCode), ProxyError> {
    let path_and_query = if query.is_empty() {
        uri_path.to_string()
    } else {
        format!("{uri_path}?{query}")
    };
    let listening_ports: Vec<u16> = engine.config.server.listeners.iter().map(|l| l.port).collect();

    let upstream = engine
        .proxy
        .forward(
            &host.backends,
            host.lb_strategy,
            method.clone(),
            &path_and_query,
            headers.clone(),
            body,
            &host.code,
            client_ip,
            &listening_ports,
        )
        .await?;

    let content_type = upstream
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let content_encoding = upstream
        .headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let global_host = engine.routing.global_host();
    let upstream_body = upstream.body.clone();
    let rewritten_body = match engine.rewriter.rewrite(
        host,
        &global_host,
        &path_and_query,
        content_type.as_deref(),
        content_encoding.as_deref(),
        upstream.body,
    ) {
        Ok(outcome) => outcome.body,
        Err(error) => {
            tracing::warn!(%error, "response rewrite failed, forwarding body unmodified");
            upstream_body
        }
    };

    let mut response = Response::new(Body::from(rewritten_body));
    *response.status_mut() = upstream.status;
    let mut response_headers = upstream.headers;
    response_headers.remove(CONTENT_LENGTH);
    *response.headers_mut() = response_headers;

    Ok((response, upstream.status))
}

fn client_ip_rejected_response(
    error: ClientIpError,
    engine: &Engine,
    host_code: &str,
    host_name: &str,
    start: Instant,
) -> Response {
    tracing::warn!(%error, "rejecting request with unresolvable client IP");
    let mut log = WebLog {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        host_code: host_code.to_string(),
        host_name: host_name.to_string(),
        client_ip: IpAddr::from([0, 0, 0, 0]),
        method: String::new(),
        uri: String::new(),
        status: StatusCode::BAD_REQUEST.as_u16(),
        action: Action::Forbid,
        guest_risk: GuestRisk::Suspicious,
        rule_name: None,
        title: Some("Unresolvable Client IP".to_string()),
        user_agent: None,
        referer: None,
        request_body_excerpt: None,
        response_body_excerpt: None,
        duration_ms: start.elapsed().as_millis() as u64,
        country: None,
        tenant_id: None,
        user_code: None,
    };
    log.truncate_bodies(engine.config.record.max_body_length, engine.config.record.max_res_body_length);
    engine.queue.publish_weblog(log);
    plain_response(StatusCode::BAD_REQUEST, &error.to_string())
}

fn plain_response(status: StatusCode, body: &str) -> Response {
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, "text/plain; charset=utf-8".parse().unwrap());
    response
}

trait IntoResponseWithHeaders {
    fn into_response_with_headers(self, engine: &Engine, meta: ListenerMeta) -> Response;
}

impl IntoResponseWithHeaders for StatusCode {
    fn into_response_with_headers(self, engine: &Engine, meta: ListenerMeta) -> Response {
        let mut response = plain_response(self, self.canonical_reason().unwrap_or(""));
        apply_security_headers(&mut response, &engine.config.server.security_headers, meta.tls);
        response
    }
}
