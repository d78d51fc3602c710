//! CLI handlers for login, status, and logout.

use std::sync::Arc;

use crate::auth::{AuthCoordinator, AuthPhase, LocalBridge, SystemHost};
use crate::config::LauncherConfig;

fn build_coordinator() -> Result<AuthCoordinator, Box<dyn std::error::Error>> {
    let config = LauncherConfig::load()?;
    let bridge = LocalBridge::from_config(&config);
    let progress = bridge.progress();
    Ok(AuthCoordinator::new(
        config.coordinator,
        Arc::new(bridge),
        Arc::new(SystemHost),
        Arc::new(progress),
    ))
}

/// Handle `launcher-auth login [--offline NAME]`.
pub async fn handle_login(offline: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator()?;

    if let Some(name) = offline {
        let account = coordinator.begin_offline_login(&name).await?;
        println!("✅ Playing offline as {} ({})", account.username, account.uuid);
        return Ok(());
    }

    let mut updates = coordinator.watch_snapshot();
    let challenge = coordinator.begin_device_flow().await?;
    println!("🔗 Visit: {}", challenge.verification_uri);
    println!("📋 Enter code: {}", challenge.user_code);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_status = String::new();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                if !snapshot.status_message.is_empty() && snapshot.status_message != last_status {
                    println!("⏳ {}", snapshot.status_message);
                    last_status = snapshot.status_message.clone();
                }
                match snapshot.phase {
                    AuthPhase::Authenticated => {
                        if let Some(account) = snapshot.current_account {
                            println!("✅ Signed in as {}", account.username);
                        }
                        return Ok(());
                    }
                    AuthPhase::Idle => {
                        return match snapshot.notice {
                            Some(notice) => Err(notice.into()),
                            None => Ok(()),
                        };
                    }
                    _ => {}
                }
            }
            _ = &mut ctrl_c => {
                coordinator.cancel_device_flow().await;
                eprintln!("Login cancelled");
                return Ok(());
            }
        }
    }
}

/// Handle `launcher-auth status`.
pub async fn handle_status() -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator()?;
    coordinator.check_account().await;
    match coordinator.current_account() {
        Some(account) => {
            println!("✅ {} ({})", account.username, account.kind);
            println!("   UUID: {}", account.uuid);
        }
        None => println!("❌ Not logged in"),
    }
    Ok(())
}

/// Handle `launcher-auth logout`.
pub async fn handle_logout() -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = build_coordinator()?;
    coordinator.logout().await?;
    println!("Logged out");
    Ok(())
}
