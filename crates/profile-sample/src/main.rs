//! # Profile Sample
//!
//! Loads a profile page from the user API configured by `FETCH_BASE_URL`.
//!
//! 1. The user and their friends load in parallel through one resource.
//! 2. Hovering the first friend prefetches their details.
//! 3. Opening that friend reads the details the hover already fetched.
//!
//! ```bash
//! FETCH_BASE_URL=http://localhost:8080 RUST_LOG=debug cargo run -p profile-sample
//! ```

use async_resource::tracing::setup_tracing;
use async_resource::{AsyncStatus, FetchConfig};
use profile_sample::lifecycle::ProfileSystem;
use profile_sample::model::Profile;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = FetchConfig::from_env().map_err(|e| e.to_string())?;
    let system = ProfileSystem::new(config).map_err(|e| e.to_string())?;
    info!(base_url = %system.config().base_url, "Starting profile demo");

    let page = system.profile_client.profile_page("u1");
    let span = tracing::info_span!("profile_page", user_id = "u1");
    let state = async {
        info!("Loading user and friends");
        page.fetch().await
    }
    .instrument(span)
    .await;

    let loaded = match (state.data(), state.error()) {
        (Some(data), _) => Ok(Profile::from(data.clone())),
        (_, Some(e)) => {
            error!(error = %e, status = ?e.status(), "Profile failed to load");
            Err(e.to_string())
        }
        _ => Err("profile load did not settle".to_string()),
    };
    let profile = match loaded {
        Ok(profile) => profile,
        Err(e) => {
            drop(page);
            system.shutdown().await?;
            return Err(e);
        }
    };
    info!(name = %profile.user.name, friends = profile.friends.len(), "Profile loaded");

    if let Some(friend) = profile.friends.first() {
        let span = tracing::info_span!("friend_details", friend_id = %friend.id);
        async {
            info!("Hovering friend");
            system.profile_client.prefetch_details(&friend.id);

            let details = system.profile_client.user_details(&friend.id);
            let state = details.fetch().await;
            match state.status() {
                AsyncStatus::Success => info!("Friend details shown"),
                _ => warn!(error = ?state.error(), "Friend details unavailable"),
            }
        }
        .instrument(span)
        .await;
    }

    match system.profile_client.cache_stats().await {
        Ok(stats) => info!(hits = stats.hits, misses = stats.misses, joins = stats.joins, "Cache stats"),
        Err(e) => warn!(error = %e, "Cache stats unavailable"),
    }

    drop(page);
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
