//! Application services — use-case orchestration.
//!
//! Each service module implements one step of the provisioning workflow by
//! composing domain logic with port trait calls. Services import only from
//! `crate::domain` and `crate::application::ports` — never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

pub mod context;
pub mod controller;
pub mod galaxy;
pub mod installer;
pub mod provision;
pub mod pull;
