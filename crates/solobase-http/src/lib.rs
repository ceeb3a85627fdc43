//! HTTP dispatcher (C9): routing, request/response plumbing, and the hyper
//! [`Service`](hyper::service::Service) tying authentication, authorization,
//! and the storage/extension services together into one request pipeline.

mod body;
mod dto;
mod error;
mod handlers;
mod json;
mod router;
pub mod shutdown;
mod state;
mod service;

pub use body::ResponseBody;
pub use error::{HttpError, HttpResult, IntoErrorResponse};
pub use router::{resolve, requires_auth, route_class, Route};
pub use service::SolobaseService;
pub use state::AppState;
