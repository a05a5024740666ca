//! Pluvio Serve
//!
//! Prediction service: the latest registered model is loaded once by
//! [`Predictor::load`] and shared read-only by the HTTP handlers.

pub mod api;
pub mod error;
pub mod logging;
pub mod predictor;
pub mod server;

pub use api::router;
pub use error::{ApiError, ServeError, ServeResult};
pub use logging::RequestLoggerLayer;
pub use predictor::Predictor;
pub use server::serve;
