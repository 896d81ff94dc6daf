//! Titanic survival prediction server, library interface.
//!
//! Exposes the router, shared state and handlers so integration tests and
//! the binary can construct the service programmatically.

pub mod api;
pub mod app;
pub mod config;
pub mod history;
pub mod logging;
pub mod shutdown;

pub use api::{
    health_handler, history_handler, load_handler, predict_handler, PassengerPayload,
    PredictionResponse,
};
pub use app::{build_app_state, build_router, AppState};
pub use history::{HistoryEntry, PredictionHistory};
pub use shutdown::{shutdown_signal, ShutdownCoordinator};
