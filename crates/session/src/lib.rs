//! OtherLink session layer
//!
//! [`SessionManager`] owns the token pair and user record, [`guards`] turns
//! the session into allow/redirect/deny decisions per screen, and
//! [`OtherlinkWorkspace`] tracks which of the user's pages is selected.

pub mod config;
pub mod error;
pub mod error_messages;
pub mod guards;
pub mod manager;
pub mod two_factor;
pub mod workspace;

pub use error::{AuthError, AuthResult};
pub use guards::{Guard, GuardDecision, Route, RouteGuard, WorkspaceGuard, evaluate};
pub use manager::{LoginOutcome, Session, SessionManager};
pub use two_factor::{TwoFactorSession, format_countdown};
pub use workspace::{OtherlinkWorkspace, WorkspaceState};
