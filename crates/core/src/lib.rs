//! OtherLink client core: domain types, token persistence, configuration
//! and form validation

pub mod config;
pub mod error;
pub mod storage;
pub mod types;
pub mod validation;

pub use config::{ApiConfig, ApiMode, ClientConfig, MockConfig, OAuthConfig};
#[cfg(not(target_arch = "wasm32"))]
pub use config::StateDir;
pub use error::{CoreError, CoreResult};
#[cfg(target_arch = "wasm32")]
pub use storage::BrowserStore;
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStore;
pub use storage::{MemoryStore, StorageKey, TokenStore};
pub use types::{
    AccountLinking, Credentials, EntityId, Link, LinkDraft, LinkType, OAuthProvider, Otherlink,
    OtherlinkDraft, Pagination, PasswordChange, PasswordReset, Permission, ProfileUpdate,
    Registration, Role, TwoFactorChallenge, User, UserSummary,
};
pub use validation::{Validate, ValidationErrors};
