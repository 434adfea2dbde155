use crate::forms::FormData;
/// Router module
///
/// HTTP plumbing for the registrar service:
///
/// - Method- and path-based routing with `:param` segments
/// - Global and route-specific middleware (pre and post)
/// - A small HTTP/1.1 server over raw tokio sockets that reads urlencoded
///   form bodies and closes the connection after each response
///
use crate::settings::Settings;
use crate::store::SchoolStore;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SchoolStore>,
    pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other(m) => m,
        }
    }
}

/// A parsed incoming request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: FormData,
    pub form: FormData,
}

impl Request {
    pub fn get(path: &str) -> Self {
        Self::new(Method::Get, path, FormData::default())
    }

    pub fn post(path: &str, form: FormData) -> Self {
        Self::new(Method::Post, path, form)
    }

    /// Build a request from a target that may carry a query string.
    pub fn new(method: Method, target: &str, form: FormData) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, FormData::parse(q.as_bytes())),
            None => (target, FormData::default()),
        };
        Request {
            method,
            path: path.to_string(),
            params: HashMap::new(),
            query,
            form,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Represents the outcome of an HTTP handler.
pub struct Response {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Response {
    /// Construct a new HTTP 200 response with HTML/text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Response {
            status_code: 200,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// HTTP 200 with an HTML content type.
    pub fn html(body: impl Into<String>) -> Self {
        let mut resp = Self::ok(body);
        resp.headers.insert(
            "Content-Type".to_string(),
            "text/html; charset=utf-8".to_string(),
        );
        resp
    }

    /// Construct a new HTTP 404 "not found" response.
    pub fn not_found() -> Self {
        Response {
            status_code: 404,
            body: "404 Not Found".to_string(),
            headers: HashMap::new(),
        }
    }

    pub fn bad_request(body: impl Into<String>) -> Self {
        Response {
            status_code: 400,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Response {
            status_code: 405,
            body: "405 Method Not Allowed".to_string(),
            headers: HashMap::new(),
        }
    }

    pub fn server_error(body: impl Into<String>) -> Self {
        Response {
            status_code: 500,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// HTTP 302 pointing the browser at `location`.
    pub fn redirect(location: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Location".to_string(), location.to_string());
        Response {
            status_code: 302,
            body: String::new(),
            headers,
        }
    }
}

/// Holds metadata about the current HTTP request and its extracted path parameters.
/// Middleware and handlers can modify/read this context.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub start_time: Option<Instant>,
}

/// Async handler functions for HTTP routes.
pub type Handler =
    Arc<dyn Fn(Request, AppState) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync>;

/// Wrap an async fn (or closure returning a future) as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request, AppState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(
        move |req: Request, state: AppState| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(f(req, state))
        },
    )
}

/// Synchronous pre-processing middleware executed before the handler.
/// If a middleware returns Some(Response), request handling stops and this response is sent.
pub type Middleware = Arc<dyn Fn(&mut RequestContext) -> Option<Response> + Send + Sync>;

/// Post-processing middleware executed after the handler.
pub type PostMiddleware = Arc<dyn Fn(&RequestContext, Response) -> Response + Send + Sync>;

/// Represents a registered HTTP route and its associated handler + middleware.
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path_pattern: String,
    pub handler: Handler,
    pub middlewares: Vec<Middleware>,
}

/// The application router: HTTP routes plus global middleware.
#[derive(Clone, Default)]
pub struct Router {
    pub routes: Vec<Route>,
    pub middlewares: Vec<Middleware>,
    pub post_middlewares: Vec<PostMiddleware>,
    pub app_state: Option<AppState>,
}

/// Serializes and sends an HTTP Response over a raw TCP socket connection.
async fn send_response(socket: &mut tokio::net::TcpStream, response: Response) {
    let mut headers = String::new();
    for (key, value) in response.headers {
        headers.push_str(&format!("{}: {}\r\n", key, value));
    }

    let response_text = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\
\r\n{}",
        response.status_code,
        status_text(response.status_code),
        response.body.len(),
        headers,
        response.body
    );

    let _ = socket.write_all(response_text.as_bytes()).await;
}

/// Maps status codes to HTTP status text for responses.
pub fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Read one request (request line, headers and a `Content-Length` body).
/// Returns `Ok(None)` when the peer closed before sending anything.
pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Request>, String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err("request headers too large".to_string());
        }
        let n = reader.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err("connection closed mid-request".to_string());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or("missing method")?;
    let target = parts.next().ok_or("missing request target")?;

    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| "invalid Content-Length".to_string())?;
            }
        }
    }
    if content_length > MAX_BODY_BYTES {
        return Err("request body too large".to_string());
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = reader.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            return Err("connection closed mid-body".to_string());
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(Some(Request::new(
        Method::parse(method),
        target,
        FormData::parse(&body),
    )))
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an HTTP route with method, path pattern, handler, and route-specific middleware.
    pub fn add_route(
        &mut self,
        method: Method,
        path_pattern: &str,
        handler: Handler,
        middlewares: Vec<Middleware>,
    ) {
        self.routes.push(Route {
            method,
            path_pattern: path_pattern.to_string(),
            handler,
            middlewares,
        });
    }

    /// Add a global pre-middleware to be run before all HTTP handlers.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.push(middleware);
    }

    /// Add a post-middleware to be run after each HTTP handler.
    pub fn add_post_middleware(&mut self, middleware: PostMiddleware) {
        self.post_middlewares.push(middleware);
    }

    pub fn set_app_state(&mut self, state: AppState) {
        self.app_state = Some(state);
    }

    /// Run middleware, the matching route and post-middleware for one request.
    pub async fn dispatch(&self, mut request: Request, state: AppState) -> Response {
        let mut ctx = RequestContext {
            method: request.method.clone(),
            path: request.path.clone(),
            params: HashMap::new(),
            start_time: None,
        };

        let response = 'handled: {
            for middleware in &self.middlewares {
                if let Some(response) = (middleware)(&mut ctx) {
                    break 'handled response;
                }
            }

            let mut path_matched = false;
            for route in &self.routes {
                let Some(params) = match_path(&route.path_pattern, &ctx.path) else {
                    continue;
                };
                path_matched = true;
                if route.method != ctx.method {
                    continue;
                }
                ctx.params = params;
                for middleware in &route.middlewares {
                    if let Some(response) = (middleware)(&mut ctx) {
                        break 'handled response;
                    }
                }
                request.params = ctx.params.clone();
                break 'handled (route.handler)(request, state).await;
            }

            if path_matched {
                Response::method_not_allowed()
            } else {
                Response::not_found()
            }
        };

        let mut response = response;
        for post_middleware in &self.post_middlewares {
            response = (post_middleware)(&ctx, response);
        }
        response
    }

    /// Bind the HTTP listener from `settings` and serve until the listener fails.
    pub async fn run(&self, settings: &Settings) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = settings.http_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!("HTTP server running on http://{}", addr);
        self.serve(listener).await
    }

    /// Accept connections on `listener`, one task per connection.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let state = self
            .app_state
            .clone()
            .ok_or("app state not set on router")?;

        loop {
            let (mut socket, peer) = listener.accept().await?;
            let router = self.clone();
            let state = state.clone();
            tokio::spawn(async move {
                let response = match read_request(&mut socket).await {
                    Ok(Some(request)) => router.dispatch(request, state).await,
                    Ok(None) => {
                        debug!("{} closed without sending a request", peer);
                        return;
                    }
                    Err(e) => {
                        warn!("Malformed request from {}: {}", peer, e);
                        Response::bad_request(e)
                    }
                };
                send_response(&mut socket, response).await;
            });
        }
    }
}

/// Pre-middleware stamping the request start time.
pub fn request_timer() -> Middleware {
    Arc::new(|ctx| {
        ctx.start_time = Some(Instant::now());
        None
    })
}

/// Post-middleware writing one access-log line per request.
pub fn access_log() -> PostMiddleware {
    Arc::new(|ctx, resp| {
        let elapsed = ctx
            .start_time
            .map(|t| format!("{:?}", t.elapsed()))
            .unwrap_or_else(|| "-".to_string());
        info!(
            "{} {} -> {} ({})",
            ctx.method.as_str(),
            ctx.path,
            resp.status_code,
            elapsed
        );
        resp
    })
}

#[macro_export]
macro_rules! route {
    ($router:expr, $( $method:ident $path:expr => { $handler:expr $(, $middleware:expr )* } ),* $(,)?) => {
        $(
            $router.add_route(
                $crate::router::Method::parse(stringify!($method)),
                $path,
                $crate::router::handler($handler),
                vec![$($middleware),*]
            );
        )*
    };
}

/// Matches a path pattern (e.g. `/foo/:id`) against a real path,
/// extracting parameters into a HashMap if matched, or None if not.
pub fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    let path_parts: Vec<&str> = path.trim_matches('/').split('/').collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();

    for (p, a) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = p.strip_prefix(':') {
            params.insert(name.to_string(), a.to_string());
        } else if p != a {
            return None;
        }
    }

    Some(params)
}
