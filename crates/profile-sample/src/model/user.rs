//! Data shapes served by the user API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// The extended record shown when a friend is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

/// A user together with their friends, as rendered on the profile page.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user: User,
    pub friends: Vec<User>,
}

impl From<(User, Vec<User>)> for Profile {
    fn from((user, friends): (User, Vec<User>)) -> Self {
        Self { user, friends }
    }
}
