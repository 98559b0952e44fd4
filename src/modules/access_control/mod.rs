//! # Access Control Module
//!
//! Coarse, group-based authorization.
//!
//! Every `(method, route)` pair carries a requirement class: `common`
//! routes are public, `login` routes need any signed-in caller, and
//! `default` routes (including every route without a rule) need a caller
//! whose groups grant the route's hash. Groups flagged root, or whose rule
//! set is the sentinel `all`, pass every `default` check.
//!
//! ## Features
//!
//! - **Requirement lookup**: cache-first, store fallback, default class on miss
//! - **Permission sets**: union of the caller's live groups, cached until
//!   membership changes
//! - **Membership**: first-class set operations, idempotent add and remove
//! - **Seeding**: built-in route table and super administrator bootstrap
//! - **API keys**: optional shared-secret check per deployment

mod api_key;
mod config;
mod group;
mod member_set;
mod permission;
mod resolver;
mod rule;
pub mod seed;

pub use api_key::{ApiKeyGate, ApiKeyOutcome, API_KEYS_CACHE_KEY, API_KEYS_TAG};
pub use config::AccessControlConfig;
pub use group::{MembershipChange, PermissionGroup, RuleSet};
pub use member_set::MemberSet;
pub use permission::{PermissionSet, GROUP_TAG};
pub use resolver::{authorize, Authorization, RuleResolver};
pub use rule::{PermissionRule, RequirementClass, RuleHash, RULES_TAG};
