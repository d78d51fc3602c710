//! Launcher login coordinator.
//!
//! Signs a game launcher into an account, either through the OAuth 2.0
//! device authorization grant (RFC 8628) or by minting a local offline
//! identity. The [`auth::AuthCoordinator`] owns the interactive state; the
//! backend is reached through the [`auth::CommandBridge`] trait.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use launcher_auth::prelude::*;
//!
//! # async fn example() -> launcher_auth::error::Result<()> {
//! let config = LauncherConfig::load()?;
//! let bridge = LocalBridge::from_config(&config);
//! let progress = bridge.progress();
//! let coordinator = AuthCoordinator::new(
//!     config.coordinator.clone(),
//!     Arc::new(bridge),
//!     Arc::new(NoopHost),
//!     Arc::new(progress),
//! );
//!
//! coordinator.check_account().await;
//! if coordinator.current_account().is_none() {
//!     let challenge = coordinator.begin_device_flow().await?;
//!     println!("Enter {} at {}", challenge.user_code, challenge.verification_uri);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
