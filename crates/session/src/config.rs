//! Session-layer constants

/// Page requested when the workspace loads the user's OtherLinks
pub const WORKSPACE_PAGE: u32 = 1;

/// Large enough that a single request returns every page a user owns
pub const WORKSPACE_PAGE_SIZE: u32 = 100;
