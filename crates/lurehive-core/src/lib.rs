pub mod classifier;
pub mod config;
pub mod extractor;
pub mod orchestrator;
pub mod persona;
pub mod reporter;
pub mod responder;
pub mod session;
pub mod session_lock;

pub use classifier::*;
pub use config::*;
pub use extractor::*;
pub use orchestrator::*;
pub use persona::*;
pub use reporter::*;
pub use responder::*;
pub use session::*;
pub use session_lock::*;
