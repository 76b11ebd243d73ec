//! Parley streams conversations with several LLM providers and lets replies
//! ask the client for work through inline, fenced blocks.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation model, the provider catalog, settings and
//!   profiles, credential storage, the inline block parsers, the tool registry,
//!   the human-input broker and the session pipeline that ties them together.
//! - [`commands`] implements the local slash-command interpreter (dice, dates,
//!   text transforms and the like) that answers without contacting a model.
//! - [`api`] defines chat and model-listing payloads shared with providers.
//! - [`utils`] holds smaller helpers: the calculator, URL handling, transcript
//!   and diagnostic logging.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`], which builds
//! a session from configuration and flags and drives the pipeline from a
//! line-oriented terminal loop.

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod utils;
