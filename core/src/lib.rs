pub mod activity;
pub mod concern;
pub mod error;
pub mod goal;
pub mod journal;
pub mod measurement;
pub mod policy;
pub mod user;
pub mod validate;
