//! Preview orchestration: debounced high-precision render requests with a
//! stale-response guard, plus a tokio driver.

pub mod driver;
pub mod orchestrator;
pub mod remote;

pub use driver::{PreviewEvent, PreviewHandle, spawn};
pub use orchestrator::{Display, IssuedRequest, PreviewOrchestrator, ResponseOutcome};
pub use remote::{InProcessRenderer, RemoteRenderer, RemoteRequest};
