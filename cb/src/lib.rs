//! campusbot - university services chat bot for the MAX messenger
//!
//! Students, applicants, employees and leadership reach university services
//! through a role-aware button menu. One update at a time flows through:
//!
//! - [`messenger`] - MAX long polling or a local console, normalized into updates
//! - [`bot::lanes`] - per-chat ordering in front of the dialogue
//! - [`bot`] - the dialogue controller: language, login, menus, actions, forms
//! - [`state`] - the in-memory session store actor
//! - [`backend`] - the university REST API client
//!
//! Configuration lives in [`config`] and the command line in [`cli`].

pub mod backend;
pub mod bot;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod messenger;
pub mod notifier;
pub mod state;

pub use bot::{LaneDispatcher, MenuRegistry, Service};
pub use config::Config;
pub use domain::{Language, Role, Session, Stage, Update};
