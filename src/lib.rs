//! Runs a long-lived application as an OS service.
//!
//! [`coordinator::InstallCoordinator`] registers and removes the service,
//! [`bridge::LifecycleBridge`] drives the hosted application from the service
//! manager's control requests, and [`cli`] picks between them at startup.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod registry;

#[cfg(windows)]
pub mod windows_api;
