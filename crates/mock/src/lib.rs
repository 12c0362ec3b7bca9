//! In-process mock of the OtherLink backend
//!
//! Serves the user, token, password-reset, OtherLink and link endpoints from
//! memory so the client can run without a real server. Configured latency and
//! random failures imitate a flaky network.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{MockError, MockResult};
pub use routes::router;
pub use server::MockServer;
pub use state::{MockState, MockUser};
