//! Core Xylo library (session identity, dataset registry, chat orchestration, widgets).
//!
//! The state machines in [`registry`] and [`chat`] are pure and are driven by the
//! reducer in [`update`]. The [`runtime`] executes the effects the reducer returns
//! against the backend described by [`api`].

pub mod api;
pub mod chat;
pub mod config;
pub mod effects;
pub mod events;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod state;
pub mod store;
pub mod tasks;
pub mod update;
pub mod widgets;
