pub mod activities;
pub mod concerns;
pub mod goals;
pub mod health;
pub mod journals;
pub mod mcp_http;
pub mod measurements;
pub mod policies;
pub mod users;
