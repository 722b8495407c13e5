//! Domain layer containing business entities and logic.
//!
//! Defines entities, repository interfaces, and background processing
//! primitives independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`click_event`] - Click tracking event model
//! - [`click_worker`] - Asynchronous click processing worker
//! - [`periodic`] - Repeating background tasks with orderly shutdown
//!
//! # Click Processing Flow
//!
//! 1. Redirect handler resolves the short code and answers immediately
//! 2. [`click_event::ClickEvent`] is offered to a bounded channel (dropped when full)
//! 3. [`click_worker::run_click_worker`] persists it with retry logic
//! 4. The counter is updated via [`repositories::LinkRepository::record_click`]

pub mod click_event;
pub mod click_worker;
pub mod entities;
pub mod periodic;
pub mod repositories;
