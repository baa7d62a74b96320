//! HTTP interface of the campo server: router, session handling and the
//! error-to-status mapping of the wire contract.

pub mod http;

pub use http::{router, AppState};
pub use http::session::SessionStore;
