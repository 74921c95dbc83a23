//! Tally Web Server
//!
//! Axum-based REST API for the Tally monthly budget tracker.
//!
//! Security features:
//! - Cloudflare Access or API-key authentication (secure by default, use --no-auth for local dev)
//! - Every record, summary and preference is scoped to the authenticated owner
//! - Restrictive CORS policy
//! - Full audit logging for all API access (reads and writes)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Request, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use tally_core::{Database, ExpenseKind, Owner};

mod handlers;

/// Maximum JSON request body size (16 KB)
pub const MAX_BODY_SIZE: usize = 16 * 1024;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Owner used for every request when authentication is disabled
pub const LOCAL_DEV_OWNER: &str = "local-dev";

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Cloudflare Access JWT header (cryptographic proof of authentication)
const CF_ACCESS_JWT_HEADER: &str = "cf-access-jwt-assertion";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Cloudflare Access JWT validation configuration
#[derive(Clone, Default)]
pub struct CfJwtConfig {
    /// Cloudflare team name (e.g., "myteam" for myteam.cloudflareaccess.com)
    pub team_name: Option<String>,
    /// Application audience tag (aud claim) from the CF Access application settings
    pub audience: Option<String>,
}

impl CfJwtConfig {
    fn is_configured(&self) -> bool {
        self.team_name.is_some() && self.audience.is_some()
    }
}

/// An API key and the owner it authenticates as
#[derive(Clone)]
pub struct ApiKey {
    pub owner: String,
    pub key: String,
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey")
            .field("owner", &self.owner)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys for scripts and internal services (alternative to Cloudflare Access)
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<ApiKey>,
    /// Cloudflare Access JWT validation config (optional but recommended)
    pub cf_jwt: CfJwtConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
            cf_jwt: CfJwtConfig::default(),
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

/// How a request's identity was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    CloudflareJwt,
    CloudflareHeader,
    ApiKey,
    /// Authentication disabled
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CloudflareJwt => "cloudflare_jwt",
            Self::CloudflareHeader => "cloudflare_header",
            Self::ApiKey => "api_key",
            Self::None => "none",
        }
    }
}

/// Identity resolved by the auth middleware, stored in request extensions
#[derive(Debug, Clone)]
pub struct Session {
    pub owner: Owner,
    pub method: AuthMethod,
}

/// Owner of the current request
///
/// Fails with 401 when the auth middleware did not attach a session.
pub fn request_owner(request: &Request) -> Result<Owner, AppError> {
    let identity = request
        .extensions()
        .get::<Session>()
        .map(|s| s.owner.as_str());
    Ok(Owner::from_session(identity)?)
}

/// Authentication middleware - resolves the request owner from a Cloudflare Access JWT,
/// the Cloudflare Access header, or an API key
///
/// # Security Notes
///
/// **Cloudflare Access JWT** (recommended): The `Cf-Access-Jwt-Assertion` header contains a
/// cryptographically signed JWT. When `CF_TEAM_NAME` and `CF_AUD_TAG` are configured, this
/// JWT is validated against Cloudflare's public keys, providing cryptographic proof that
/// the request came through Cloudflare Access.
///
/// **Cloudflare Access headers** (fallback): The `CF-Access-Authenticated-User-Email` header
/// is safe behind Cloudflare Tunnel (which strips/rewrites CF headers), but can be spoofed
/// if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks. Each key
/// maps to the owner it acts for.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let session = match resolve_session(&state.config, request.headers(), &path).await {
        Some(session) => session,
        None => {
            warn!(path = %path, "Unauthorized request - no valid auth");
            return AppError::from(tally_core::Error::Unauthenticated).into_response();
        }
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

async fn resolve_session(config: &ServerConfig, headers: &HeaderMap, path: &str) -> Option<Session> {
    let session = |identity: &str, method: AuthMethod| {
        Owner::from_session(Some(identity))
            .ok()
            .map(|owner| Session { owner, method })
    };

    if !config.require_auth {
        return session(LOCAL_DEV_OWNER, AuthMethod::None);
    }

    // Check for Cloudflare Access JWT first (cryptographic verification)
    if config.cf_jwt.is_configured() {
        if let Some(jwt) = headers
            .get(CF_ACCESS_JWT_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            match validate_cf_jwt(jwt, &config.cf_jwt).await {
                Ok(identity) => {
                    info!(user = %identity, path = %path, "Authenticated via Cloudflare JWT");
                    if let Some(s) = session(&identity, AuthMethod::CloudflareJwt) {
                        return Some(s);
                    }
                }
                Err(e) => {
                    warn!(error = %e, path = %path, "Invalid Cloudflare JWT");
                    // Fall through to try other auth methods
                }
            }
        }
    }

    // Check for Cloudflare Access user header (trusted when behind CF Tunnel)
    let cf_user = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        // Warn if JWT config is set but we're falling back to header-only auth
        if config.cf_jwt.is_configured() {
            warn!(
                user = %email,
                path = %path,
                "Authenticated via CF header (JWT validation configured but no valid JWT)"
            );
        } else {
            info!(user = %email, path = %path, "Authenticated via Cloudflare Access header");
        }
        return session(email, AuthMethod::CloudflareHeader);
    }

    // Check for API key in Authorization header (Bearer token)
    let key_owner = headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .and_then(|key| owner_for_api_key(key, &config.api_keys));

    if let Some(owner) = key_owner {
        info!(user = %owner, path = %path, "Authenticated via API key");
        return session(owner, AuthMethod::ApiKey);
    }

    None
}

/// Validate a Cloudflare Access JWT
///
/// Fetches public keys from Cloudflare and validates the JWT signature, expiration,
/// and audience claim. Returns the email claim, or the subject when there is none.
async fn validate_cf_jwt(token: &str, config: &CfJwtConfig) -> Result<String, String> {
    use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

    let team_name = config
        .team_name
        .as_ref()
        .ok_or("Team name not configured")?;
    let audience = config.audience.as_ref().ok_or("Audience not configured")?;

    let header = decode_header(token).map_err(|e| format!("Invalid JWT header: {}", e))?;
    let kid = header.kid.ok_or("JWT missing key ID (kid)")?;

    let certs_url = format!(
        "https://{}.cloudflareaccess.com/cdn-cgi/access/certs",
        team_name
    );
    let keys = fetch_cf_public_keys(&certs_url)
        .await
        .map_err(|e| format!("Failed to fetch CF public keys: {}", e))?;

    let jwk = keys
        .iter()
        .find(|k| k.common.key_id.as_deref() == Some(&kid))
        .ok_or_else(|| format!("No matching key found for kid: {}", kid))?;
    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|e| format!("Invalid JWK: {}", e))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[format!("https://{}.cloudflareaccess.com", team_name)]);

    #[derive(serde::Deserialize)]
    struct Claims {
        email: Option<String>,
        sub: String,
    }

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("JWT validation failed: {}", e))?;

    Ok(token_data
        .claims
        .email
        .filter(|e| !e.trim().is_empty())
        .unwrap_or(token_data.claims.sub))
}

/// Fetch Cloudflare Access public keys from the certs endpoint
async fn fetch_cf_public_keys(url: &str) -> Result<Vec<jsonwebtoken::jwk::Jwk>, String> {
    #[derive(serde::Deserialize)]
    struct JwkSet {
        keys: Vec<jsonwebtoken::jwk::Jwk>,
    }

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| format!("HTTP request failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()));
    }

    let jwk_set: JwkSet = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse JWK set: {}", e))?;

    Ok(jwk_set.keys)
}

/// Find the owner of an API key using constant-time comparison
///
/// Every configured key is compared so the time taken does not reveal which
/// entry matched.
fn owner_for_api_key<'a>(provided: &str, keys: &'a [ApiKey]) -> Option<&'a str> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    let mut found = None;

    for entry in keys {
        let key_bytes = entry.key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len()
            && bool::from(provided_bytes.ct_eq(key_bytes))
            && found.is_none()
        {
            found = Some(entry.owner.as_str());
        }
    }
    found
}

/// Parse `TALLY_API_KEYS`: comma-separated `owner=key` pairs
///
/// Examples:
/// - "me@example.com=s3cret" - one key
/// - "me@example.com=k1,backup-job=k2" - several owners
pub fn parse_api_keys(input: &str) -> Vec<ApiKey> {
    input
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once('=') {
                Some((owner, key)) if !owner.trim().is_empty() && !key.trim().is_empty() => {
                    Some(ApiKey {
                        owner: owner.trim().to_string(),
                        key: key.trim().to_string(),
                    })
                }
                _ => {
                    warn!("Ignoring malformed API key entry (expected owner=key)");
                    None
                }
            }
        })
        .collect()
}

fn expense_routes(kind: ExpenseKind) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route(
            "/:id",
            get(handlers::get_expense)
                .patch(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        .layer(Extension(kind))
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Auth
        .route("/me", get(handlers::get_me))
        // Months
        .route("/months", get(handlers::list_months))
        .route("/months/:period", get(handlers::get_month))
        .route("/months/:period/summary", get(handlers::get_month_summary))
        .route(
            "/months/:period/analysis",
            get(handlers::get_month_analysis),
        )
        // Incomes
        .route("/income-categories", get(handlers::list_income_categories))
        .route(
            "/incomes",
            get(handlers::list_incomes).post(handlers::create_income),
        )
        .route(
            "/incomes/:id",
            get(handlers::get_income)
                .patch(handlers::update_income)
                .delete(handlers::delete_income),
        )
        // Expenses
        .nest("/fixed-expenses", expense_routes(ExpenseKind::Fixed))
        .nest("/variable-expenses", expense_routes(ExpenseKind::Variable))
        // Currency
        .route(
            "/preferences/currency",
            get(handlers::get_currency_preference).put(handlers::set_currency_preference),
        )
        .route("/currencies", get(handlers::list_currencies))
        // Audit
        .route("/audit", get(handlers::list_audit_log));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: restrict scripts to same-origin, allow inline styles
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!(
            "⚠️  Authentication disabled - every request acts as '{}', do not expose to network!",
            LOCAL_DEV_OWNER
        );
    } else if config.api_keys.is_empty() && !config.cf_jwt.is_configured() {
        info!("No API keys or Cloudflare JWT config; only the Cloudflare Access header is accepted");
    }

    let app = create_router(db, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    field: Option<String>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "validation",
            message: msg.to_string(),
            field: None,
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: "not_found",
            message: msg.to_string(),
            field: None,
            internal: None,
        }
    }

    fn from_core(err: &tally_core::Error) -> Option<Self> {
        use tally_core::Error as CoreError;

        let (status, message, field) = match err {
            CoreError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
                None,
            ),
            CoreError::Validation { field, .. } => {
                (StatusCode::BAD_REQUEST, err.to_string(), Some(field.clone()))
            }
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), None),
            CoreError::SummaryRecompute { period, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "The record was saved, but the summary for {} could not be updated",
                    period
                ),
                None,
            ),
            _ => return None,
        };

        Some(Self {
            status,
            kind: err.kind(),
            message,
            field,
            internal: None,
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let mut body = serde_json::json!({
            "error": self.message,
            "kind": self.kind,
        });
        if let Some(field) = self.field {
            body["field"] = serde_json::Value::String(field);
        }

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Domain errors carry their own status; everything else is internal
        if let Some(app_err) = err
            .downcast_ref::<tally_core::Error>()
            .and_then(AppError::from_core)
        {
            return app_err;
        }

        // Malformed path segments and query strings
        if let Some(rejection) = err.downcast_ref::<PathRejection>() {
            return Self::bad_request(&rejection.body_text());
        }
        if let Some(rejection) = err.downcast_ref::<QueryRejection>() {
            return Self::bad_request(&rejection.body_text());
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            field: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
