// Library crate: the positioning engine plus the headless harness and
// command protocol used by tests and the console binary.

pub mod command;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod input;
pub mod persistence;
pub mod session;
pub mod state;
pub mod surface;
pub mod view;

pub use config::EngineConfig;
pub use error::{FileError, StoreError};
pub use session::{FlushReport, Session};
pub use state::Engine;
pub use view::ViewState;
