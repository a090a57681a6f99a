//! Endpoint URLs of the Diigo API and outliner feed.

use urlencoding::encode;

/// Path of the versioned bookmarks API.
pub const API_PATH: &str = "/api/v2/bookmarks";

/// Path of the session-authenticated outliner feed.
pub const FEED_PATH: &str = "/interact_api/load_user_items";

/// Public profile URL of a library owner.
pub fn library_url(user: &str) -> String {
    format!("https://www.diigo.com/user/{}", encode(user))
}

/// Build an RFC 3986 encoded query string.
pub fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// URL builder bound to one library and API key.
#[derive(Debug, Clone)]
pub struct DiigoUrls {
    api_base: String,
    feed_base: String,
    key: String,
    user: String,
}

impl DiigoUrls {
    pub fn new(
        api_base: impl Into<String>,
        feed_base: impl Into<String>,
        key: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            feed_base: feed_base.into().trim_end_matches('/').to_string(),
            key: key.into(),
            user: user.into(),
        }
    }

    /// The set of bookmarks in the library. `key` and `user` are always
    /// appended after the caller's parameters.
    pub fn items(&self, params: &[(&str, String)]) -> String {
        let mut all: Vec<(&str, String)> = params.to_vec();
        all.push(("key", self.key.clone()));
        all.push(("user", self.user.clone()));
        format!("{}{}?{}", self.api_base, API_PATH, query_string(&all))
    }

    /// One page of the outliner feed.
    pub fn feed_items(&self, params: &[(&str, String)]) -> String {
        format!("{}{}?{}", self.feed_base, FEED_PATH, query_string(params))
    }
}
