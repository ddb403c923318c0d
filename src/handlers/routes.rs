//! HTTP surface over the auth and gallery services

use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::{header, StatusCode};
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::clock::SharedClock;
use crate::auth::user::Principal;
use crate::config::{AuthSettings, RepositoryPolicy};
use crate::constants::{API_PREFIX, REFRESH_COOKIE_NAME};
use crate::error::{Denial, GalleryError};
use crate::handlers::auth::{AuthService, LoginRequest, RefreshRequest, RegisterRequest};
use crate::handlers::gallery::{
    CommentRequest, CreatePhotoRequest, CreatePhotoshootRequest, GalleryService, UpdatePhotoRequest,
    UpdatePhotoshootRequest, UpdateUserRequest,
};
use crate::security::add_api_security_headers;
use crate::storage::SharedStorage;

const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub gallery: Arc<GalleryService>,
    pub storage: SharedStorage,
    /// Drops the `Secure` cookie attribute so plain-HTTP local setups work
    pub development_mode: bool,
}

impl AppState {
    pub fn new(
        storage: SharedStorage,
        settings: &AuthSettings,
        policy: RepositoryPolicy,
        clock: SharedClock,
        development_mode: bool,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(storage.clone(), settings, policy, clock)),
            gallery: Arc::new(GalleryService::new(storage.clone(), policy)),
            storage,
            development_mode,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

/// Render an error as `{"error": "..."}` with its mapped status
pub fn error_response(error: &GalleryError) -> Response {
    let status = error.status_code();
    let message = match error {
        GalleryError::RepositoryUnavailable(_) => "Service temporarily unavailable".to_string(),
        GalleryError::ConfigError(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };
    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    }

    let mut response = json_response(&ErrorBody { error: message }, status);
    if error.denial() == Some(Denial::Unauthenticated) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
    }
    response
}

fn respond<T: Serialize>(result: crate::error::Result<T>, status: StatusCode) -> Response {
    match result {
        Ok(value) => json_response(&value, status),
        Err(e) => error_response(&e),
    }
}

fn respond_empty(result: crate::error::Result<()>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

fn refresh_cookie(token: &str, max_age_secs: i64, development_mode: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/{}/auth; Max-Age={}",
        REFRESH_COOKIE_NAME, token, API_PREFIX, max_age_secs
    );
    if !development_mode {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(mut response: Response, cookie: String) -> Response {
    match header::HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => log::error!("Could not build refresh cookie: {}", e),
    }
    response
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn authorization() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Raw body capped at `MAX_BODY_BYTES`. A request that declares no length is
/// treated as empty and its body is never read.
fn optional_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    let declared = warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::bytes());
    let undeclared = warp::header::optional::<u64>("content-length").and_then(|length: Option<u64>| async move {
        match length {
            None => Ok(Bytes::new()),
            Some(_) => Err(warp::reject::not_found()),
        }
    });
    declared.or(undeclared).unify()
}

#[derive(Debug)]
struct AuthRejection(GalleryError);

impl warp::reject::Reject for AuthRejection {}

/// Resolve the caller from the bearer header. Placed ahead of body
/// extraction so a missing token is reported before a malformed body.
fn principal(state: AppState) -> impl Filter<Extract = (Principal,), Error = Rejection> + Clone {
    authorization().and_then(move |authorization: Option<String>| {
        let auth = state.auth.clone();
        async move {
            auth.authenticate(authorization.as_deref())
                .await
                .map_err(|e| warp::reject::custom(AuthRejection(e)))
        }
    })
}

/// Resolve the caller, then run `op`. Authentication failures short-circuit
/// before any resource is looked up.
async fn authenticated<T, F, Fut>(state: &AppState, authorization: Option<String>, status: StatusCode, op: F) -> Response
where
    T: Serialize,
    F: FnOnce(Principal) -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<T>>,
{
    match state.auth.authenticate(authorization.as_deref()).await {
        Ok(principal) => respond(op(principal).await, status),
        Err(e) => error_response(&e),
    }
}

async fn authenticated_empty<F, Fut>(state: &AppState, authorization: Option<String>, op: F) -> Response
where
    F: FnOnce(Principal) -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<()>>,
{
    match state.auth.authenticate(authorization.as_deref()).await {
        Ok(principal) => respond_empty(op(principal).await),
        Err(e) => error_response(&e),
    }
}

// Auth handlers

async fn handle_login(state: AppState, request: LoginRequest) -> Result<Response, Infallible> {
    let response = match state.auth.login(request).await {
        Ok(login) => {
            let max_age = state.auth.refresh_ttl_secs();
            let cookie = refresh_cookie(&login.refresh_token, max_age, state.development_mode);
            with_cookie(json_response(&login, StatusCode::OK), cookie)
        }
        Err(e) => error_response(&e),
    };
    Ok(response)
}

async fn handle_refresh(
    state: AppState,
    cookie: Option<String>,
    body: Bytes,
) -> Result<Response, Infallible> {
    // The HTTP-only cookie wins over a token in the body
    let presented = match cookie.filter(|c| !c.is_empty()) {
        Some(token) => Some(token),
        None if body.is_empty() => None,
        None => serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .map(|r| r.refresh_token),
    };

    let result = match presented {
        Some(token) => state.auth.refresh(&token).await,
        None => Err(GalleryError::InvalidOrExpiredRefreshToken),
    };
    Ok(respond(result, StatusCode::OK))
}

async fn handle_logout(state: AppState, authorization: Option<String>) -> Result<Response, Infallible> {
    let auth = state.auth.clone();
    let response = authenticated_empty(&state, authorization, |principal| async move {
        auth.logout(&principal).await
    })
    .await;

    if response.status().is_success() {
        return Ok(with_cookie(response, refresh_cookie("", 0, state.development_mode)));
    }
    Ok(response)
}

async fn handle_register(state: AppState, request: RegisterRequest) -> Result<Response, Infallible> {
    Ok(respond(state.auth.register(request).await, StatusCode::CREATED))
}

async fn handle_health(state: AppState) -> Result<Response, Infallible> {
    let healthy = state.storage.health_check().await.unwrap_or(false);
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    Ok(json_response(
        &serde_json::json!({ "status": if healthy { "ok" } else { "degraded" } }),
        status,
    ))
}

/// Build the complete route tree
pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let api = warp::path(API_PREFIX);

    // /api/auth/...
    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(handle_login);

    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(warp::cookie::optional(REFRESH_COOKIE_NAME))
        .and(optional_body())
        .and_then(handle_refresh);

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(authorization())
        .and_then(handle_logout);

    let auth_routes = login.or(refresh).or(logout).boxed();

    // /api/users/...
    let register = warp::path!("users")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(json_body())
        .and_then(handle_register);

    let list_users = warp::path!("users")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.list_users(&p).await
            })
            .await
        });

    let get_user = warp::path!("users" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|id: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.get_user(&p, id).await
            })
            .await
        });

    let update_user = warp::path!("users" / i64)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |id: i64, state: AppState, p: Principal, request: UpdateUserRequest| async move {
                respond(state.gallery.update_user(&p, id, request).await, StatusCode::OK)
            },
        );

    let delete_user = warp::path!("users" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|id: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated_empty(&state, authorization, |p| async move {
                gallery.delete_user(&p, id).await
            })
            .await
        });

    let user_routes = register
        .or(list_users)
        .or(get_user)
        .or(update_user)
        .or(delete_user)
        .boxed();

    // /api/photoshoots/...
    let list_photoshoots = warp::path!("photoshoots")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.list_photoshoots(&p).await
            })
            .await
        });

    let create_photoshoot = warp::path!("photoshoots")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |state: AppState, p: Principal, request: CreatePhotoshootRequest| async move {
                respond(state.gallery.create_photoshoot(&p, request).await, StatusCode::CREATED)
            },
        );

    let get_photoshoot = warp::path!("photoshoots" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|id: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.get_photoshoot(&p, id).await
            })
            .await
        });

    let update_photoshoot = warp::path!("photoshoots" / i64)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |id: i64, state: AppState, p: Principal, request: UpdatePhotoshootRequest| async move {
                respond(state.gallery.update_photoshoot(&p, id, request).await, StatusCode::OK)
            },
        );

    let delete_photoshoot = warp::path!("photoshoots" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|id: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated_empty(&state, authorization, |p| async move {
                gallery.delete_photoshoot(&p, id).await
            })
            .await
        });

    let photoshoot_routes = list_photoshoots
        .or(create_photoshoot)
        .or(get_photoshoot)
        .or(update_photoshoot)
        .or(delete_photoshoot)
        .boxed();

    // /api/photoshoots/:id/photos/...
    let list_photos = warp::path!("photoshoots" / i64 / "photos")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|shoot: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.list_photos(&p, shoot).await
            })
            .await
        });

    let create_photo = warp::path!("photoshoots" / i64 / "photos")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |shoot: i64, state: AppState, p: Principal, request: CreatePhotoRequest| async move {
                respond(state.gallery.create_photo(&p, shoot, request).await, StatusCode::CREATED)
            },
        );

    let get_photo = warp::path!("photoshoots" / i64 / "photos" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|shoot: i64, photo: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.get_photo(&p, shoot, photo).await
            })
            .await
        });

    let update_photo = warp::path!("photoshoots" / i64 / "photos" / i64)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |shoot: i64, photo: i64, state: AppState, p: Principal, request: UpdatePhotoRequest| async move {
                respond(state.gallery.update_photo(&p, shoot, photo, request).await, StatusCode::OK)
            },
        );

    let delete_photo = warp::path!("photoshoots" / i64 / "photos" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|shoot: i64, photo: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated_empty(&state, authorization, |p| async move {
                gallery.delete_photo(&p, shoot, photo).await
            })
            .await
        });

    let photo_routes = list_photos
        .or(create_photo)
        .or(get_photo)
        .or(update_photo)
        .or(delete_photo)
        .boxed();

    // /api/photoshoots/:id/photos/:id/comments/...
    let list_comments = warp::path!("photoshoots" / i64 / "photos" / i64 / "comments")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(|shoot: i64, photo: i64, state: AppState, authorization: Option<String>| async move {
            let gallery = state.gallery.clone();
            authenticated(&state, authorization, StatusCode::OK, |p| async move {
                gallery.list_comments(&p, shoot, photo).await
            })
            .await
        });

    let create_comment = warp::path!("photoshoots" / i64 / "photos" / i64 / "comments")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |shoot: i64, photo: i64, state: AppState, p: Principal, request: CommentRequest| async move {
                respond(state.gallery.create_comment(&p, shoot, photo, request).await, StatusCode::CREATED)
            },
        );

    let get_comment = warp::path!("photoshoots" / i64 / "photos" / i64 / "comments" / i64)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(
            |shoot: i64, photo: i64, comment: i64, state: AppState, authorization: Option<String>| async move {
                let gallery = state.gallery.clone();
                authenticated(&state, authorization, StatusCode::OK, |p| async move {
                    gallery.get_comment(&p, shoot, photo, comment).await
                })
                .await
            },
        );

    let update_comment = warp::path!("photoshoots" / i64 / "photos" / i64 / "comments" / i64)
        .and(warp::put())
        .and(with_state(state.clone()))
        .and(principal(state.clone()))
        .and(json_body())
        .then(
            |shoot: i64, photo: i64, comment: i64, state: AppState, p: Principal, request: CommentRequest| async move {
                respond(
                    state.gallery.update_comment(&p, shoot, photo, comment, request).await,
                    StatusCode::OK,
                )
            },
        );

    let delete_comment = warp::path!("photoshoots" / i64 / "photos" / i64 / "comments" / i64)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .and(authorization())
        .then(
            |shoot: i64, photo: i64, comment: i64, state: AppState, authorization: Option<String>| async move {
                let gallery = state.gallery.clone();
                authenticated_empty(&state, authorization, |p| async move {
                    gallery.delete_comment(&p, shoot, photo, comment).await
                })
                .await
            },
        );

    let comment_routes = list_comments
        .or(create_comment)
        .or(get_comment)
        .or(update_comment)
        .or(delete_comment)
        .boxed();

    let api_routes = api.and(
        auth_routes
            .or(user_routes)
            .or(photoshoot_routes)
            .or(photo_routes)
            .or(comment_routes),
    );

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_health);

    api_routes
        .or(health)
        .recover(handle_rejection)
        .map(|reply| add_api_security_headers(Reply::into_response(reply)))
}

/// Turn unmatched routes and malformed requests into JSON errors
async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(AuthRejection(error)) = rejection.find::<AuthRejection>() {
        return Ok(error_response(error));
    }

    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected application/json".to_string())
    } else if rejection.find::<warp::reject::InvalidHeader>().is_some() {
        (StatusCode::BAD_REQUEST, "Malformed request header".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        log::error!("Unhandled rejection: {:?}", rejection);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(json_response(&ErrorBody { error: message }, status))
}
