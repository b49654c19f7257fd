/// Middleware modules for the API server
///
/// - `security`: response security headers
///
/// Authentication lives in `app::jwt_auth_layer`, request tracing is
/// tower-http's `TraceLayer`.

pub mod security;
