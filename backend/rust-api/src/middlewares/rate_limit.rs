use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::metrics::RATE_LIMIT_DECISIONS_TOTAL;
use crate::services::AppState;

/// Fixed-window limit for one class of endpoints.
struct Policy {
    scope: &'static str,
    limit_env: &'static str,
    default_limit: u32,
    window_seconds: u64,
}

// Public writes: user creation and answer submission
const PUBLIC_POLICY: Policy = Policy {
    scope: "public",
    limit_env: "RATE_LIMIT_PER_IP",
    default_limit: 120,
    window_seconds: 60,
};

// 10 attempts per 5 minutes
const LOGIN_POLICY: Policy = Policy {
    scope: "login",
    limit_env: "RATE_LIMIT_LOGIN_ATTEMPTS",
    default_limit: 10,
    window_seconds: 300,
};

const ADMIN_POLICY: Policy = Policy {
    scope: "admin",
    limit_env: "ADMIN_RATE_LIMIT_PER_USER",
    default_limit: 300,
    window_seconds: 60,
};

const RATE_LIMIT_SCRIPT: &str = r#"
    local key = KEYS[1]
    local limit = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])

    local current = redis.call('GET', key)

    if current == false then
        redis.call('SET', key, 1, 'EX', window)
        return 1
    end

    current = tonumber(current)

    if current >= limit then
        return 0
    end

    redis.call('INCR', key)
    return 1
"#;

fn extract_client_ip_from(headers: &HeaderMap, extensions: &axum::http::Extensions) -> String {
    // Preferred order: X-Forwarded-For, Forwarded, X-Real-IP, ConnectInfo
    if let Some(v) = headers.get("x-forwarded-for") {
        if let Ok(s) = v.to_str() {
            // comma separated list; first hop is the client
            return s.split(',').next().unwrap_or(s).trim().to_string();
        }
    }

    if let Some(v) = headers.get("forwarded") {
        if let Ok(s) = v.to_str() {
            for part in s.split(';') {
                let p = part.trim();
                if let Some(val) = p.strip_prefix("for=") {
                    return val.trim().trim_matches('"').to_string();
                }
            }
        }
    }

    if let Some(v) = headers.get("x-real-ip") {
        if let Ok(s) = v.to_str() {
            return s.trim().to_string();
        }
    }

    if let Some(ci) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return ci.0.ip().to_string();
    }

    "unknown".to_string()
}

fn limiting_disabled() -> bool {
    std::env::var("RATE_LIMIT_DISABLED").unwrap_or_default() == "1"
}

fn limit_for(policy: &Policy) -> u32 {
    std::env::var(policy.limit_env)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(policy.default_limit)
}

async fn enforce(
    state: &AppState,
    policy: &Policy,
    subject: &str,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(request).await);
    };
    if limiting_disabled() {
        tracing::debug!("Rate limiting disabled via RATE_LIMIT_DISABLED=1");
        return Ok(next.run(request).await);
    }

    let key = format!("ratelimit:{}:{}", policy.scope, subject);
    let allowed = check_rate_limit(redis, &key, limit_for(policy), policy.window_seconds)
        .await
        .map_err(|e| {
            tracing::error!(scope = policy.scope, "Rate limit check failed: {}", e);
            RATE_LIMIT_DECISIONS_TOTAL
                .with_label_values(&[policy.scope, "error"])
                .inc();
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !allowed {
        RATE_LIMIT_DECISIONS_TOTAL
            .with_label_values(&[policy.scope, "rejected"])
            .inc();
        tracing::warn!(scope = policy.scope, "Rate limit exceeded for {}", subject);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    RATE_LIMIT_DECISIONS_TOTAL
        .with_label_values(&[policy.scope, "allowed"])
        .inc();
    Ok(next.run(request).await)
}

/// Per-IP limit on public write endpoints.
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    enforce(&state, &PUBLIC_POLICY, &client_ip, request, next).await
}

pub async fn login_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let client_ip = extract_client_ip_from(request.headers(), request.extensions());
    enforce(&state, &LOGIN_POLICY, &client_ip, request, next).await
}

/// Keyed by the admin identity when authenticated, else by IP.
pub async fn admin_rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let subject = request
        .extensions()
        .get::<super::auth::JwtClaims>()
        .map(|claims| format!("user:{}", claims.sub))
        .unwrap_or_else(|| {
            format!(
                "ip:{}",
                extract_client_ip_from(request.headers(), request.extensions())
            )
        });
    enforce(&state, &ADMIN_POLICY, &subject, request, next).await
}

/// Check rate limit using Redis with Lua script for atomicity
async fn check_rate_limit(
    redis: &ConnectionManager,
    key: &str,
    limit: u32,
    window_seconds: u64,
) -> anyhow::Result<bool> {
    let mut conn = redis.clone();

    let allowed: u32 = redis::Script::new(RATE_LIMIT_SCRIPT)
        .key(key)
        .arg(limit)
        .arg(window_seconds)
        .invoke_async(&mut conn)
        .await?;

    Ok(allowed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_extract_client_ip_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4, 10.0.0.1".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "1.2.3.4");
    }

    #[test]
    fn test_extract_client_ip_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", "for=5.6.7.8;proto=http".parse().unwrap());
        let exts = axum::http::Extensions::new();
        assert_eq!(extract_client_ip_from(&headers, &exts), "5.6.7.8");
    }

    #[test]
    fn test_extract_client_ip_connectinfo() {
        let headers = HeaderMap::new();
        let mut exts = axum::http::Extensions::new();
        exts.insert(ConnectInfo::<SocketAddr>("7.7.7.7:1234".parse().unwrap()));
        assert_eq!(extract_client_ip_from(&headers, &exts), "7.7.7.7");
    }

    #[test]
    #[serial]
    fn test_limit_env_override() {
        std::env::set_var("RATE_LIMIT_LOGIN_ATTEMPTS", "3");
        assert_eq!(limit_for(&LOGIN_POLICY), 3);
        std::env::remove_var("RATE_LIMIT_LOGIN_ATTEMPTS");
        assert_eq!(limit_for(&LOGIN_POLICY), 10);
    }
}
