use crate::clients::ProfileError;
use crate::model::{Profile, User, UserDetails};
use async_resource::{
    fetch_parallel, AsyncResource, CacheStats, ParallelResource, PrefetchClient, RequestKey,
};
use std::sync::Arc;
use tracing::{debug, instrument};

pub fn user_key(user_id: &str) -> RequestKey {
    RequestKey::with_params("/users/:id", &[("id", user_id)])
}

pub fn friends_key(user_id: &str) -> RequestKey {
    RequestKey::with_params("/users/:id/friends", &[("id", user_id)])
}

pub fn details_key(user_id: &str) -> RequestKey {
    RequestKey::with_params("/users/:id/details", &[("id", user_id)])
}

/// Client for the profile page's data.
///
/// Every resource it hands out goes through the shared prefetch cache, so
/// the page, the friend list and any hover prefetch share requests.
#[derive(Clone)]
pub struct ProfileClient {
    cache: Arc<PrefetchClient>,
}

impl ProfileClient {
    pub fn new(cache: PrefetchClient) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    pub fn user(&self, user_id: &str) -> AsyncResource<User> {
        AsyncResource::new(self.cache.clone(), user_key(user_id))
    }

    /// The user and their friends, fetched together.
    pub fn profile_page(&self, user_id: &str) -> ParallelResource<(User, Vec<User>)> {
        ParallelResource::new(
            self.cache.clone(),
            [user_key(user_id), friends_key(user_id)],
        )
    }

    /// Points an existing page at another user; both requests restart.
    pub async fn switch_user(
        &self,
        page: &ParallelResource<(User, Vec<User>)>,
        user_id: &str,
    ) -> Result<Profile, ProfileError> {
        debug!(user_id, "Switching profile");
        let state = page.set_keys([user_key(user_id), friends_key(user_id)]).await;
        match (state.data(), state.error()) {
            (Some(data), _) => Ok(Profile::from(data.clone())),
            (None, Some(info)) => Err(info
                .cause
                .clone()
                .map(ProfileError::from)
                .unwrap_or_else(|| ProfileError::Unavailable(info.message.clone()))),
            (None, None) => Err(ProfileError::Unavailable("profile request superseded".into())),
        }
    }

    /// A friend's details, loaded when the friend is opened.
    pub fn user_details(&self, user_id: &str) -> AsyncResource<UserDetails> {
        AsyncResource::new(self.cache.clone(), details_key(user_id))
    }

    /// Hover trigger: warms a friend's details without waiting.
    #[instrument(skip(self))]
    pub fn prefetch_details(&self, user_id: &str) -> bool {
        debug!("Prefetching details");
        self.cache.prefetch(details_key(user_id))
    }

    /// One-shot profile load for callers that do not need observable state.
    #[instrument(skip(self))]
    pub async fn load_profile(&self, user_id: &str) -> Result<Profile, ProfileError> {
        debug!("Sending request");
        let keys = [user_key(user_id), friends_key(user_id)];
        let pair: (User, Vec<User>) = fetch_parallel(self.cache.as_ref(), &keys).await?;
        Ok(Profile::from(pair))
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, ProfileError> {
        Ok(self.cache.stats().await?)
    }
}
