//! Import subcommand for diigo-sync
//!
//! Pulls a Diigo library into an item set, either through the paged API
//! (basic auth + API key) or through the outliner feed (session cookie).

use crate::diigo::TransportMode;
use crate::error::{SyncError, SyncResult};
use crate::sync::ImportParams;
use chrono::{NaiveDate, NaiveDateTime};
use clap::Args;

/// Format of `--added-after`, interpreted as UTC.
pub const ADDED_AFTER_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Arguments for the import subcommand
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Item set receiving the imported items
    #[arg(long, value_name = "ID")]
    pub item_set: i64,

    /// Diigo user whose library is imported
    #[arg(long)]
    pub user: String,

    /// Diigo API key (paged API)
    #[arg(long, env = "DIIGO_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Basic auth login (defaults to --user)
    #[arg(long, env = "DIIGO_LOGIN")]
    pub login: Option<String>,

    /// Basic auth password (paged API)
    #[arg(long, env = "DIIGO_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Session cookie header value (outliner feed)
    #[arg(long, env = "DIIGO_SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    /// Remote interface to enumerate the library through
    #[arg(long, value_enum, default_value_t = TransportMode::Api)]
    pub transport: TransportMode,

    /// Resume offset: record offset (api) or page number (feed)
    #[arg(long, default_value_t = 0)]
    pub start: u64,

    /// Only import bookmarks updated after this UTC time (YYYY-MM-DDTHH:MM)
    #[arg(long, value_name = "DATETIME")]
    pub added_after: Option<String>,

    /// Download image annotations and attach them to their bookmark
    #[arg(long)]
    pub import_files: bool,

    /// Restrict the import to bookmarks matching this search
    #[arg(long)]
    pub what: Option<String>,

    /// Record the HTTP status of every bookmarked URL
    #[arg(long)]
    pub probe_links: bool,

    /// Skip the credential check before the run starts
    #[arg(long)]
    pub skip_verify: bool,
}

impl ImportArgs {
    /// `--added-after` as epoch seconds. A bare date means midnight UTC.
    pub fn cutoff_timestamp(&self) -> SyncResult<Option<i64>> {
        let Some(raw) = self.added_after.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, ADDED_AFTER_FORMAT) {
            return Ok(Some(dt.and_utc().timestamp()));
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            && let Some(dt) = date.and_hms_opt(0, 0, 0)
        {
            return Ok(Some(dt.and_utc().timestamp()));
        }
        Err(SyncError::invalid_params(format!(
            "invalid --added-after '{}': expected YYYY-MM-DDTHH:MM",
            raw
        )))
    }

    /// Login used for basic auth.
    pub fn login(&self) -> &str {
        self.login.as_deref().unwrap_or(self.user.as_str())
    }

    /// Check that the credentials the chosen transport needs are present.
    pub fn validate(&self) -> SyncResult<()> {
        if self.user.trim().is_empty() {
            return Err(SyncError::invalid_params("a Diigo user is required"));
        }
        let missing = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());
        match self.transport {
            TransportMode::Api => {
                if missing(&self.api_key) {
                    return Err(SyncError::invalid_params(
                        "an API key is required for the paged API (--api-key)",
                    ));
                }
                if missing(&self.password) {
                    return Err(SyncError::invalid_params(
                        "a password is required for the paged API (--password)",
                    ));
                }
            }
            TransportMode::Feed => {
                if missing(&self.session_cookie) {
                    return Err(SyncError::invalid_params(
                        "a session cookie is required for the feed (--session-cookie)",
                    ));
                }
            }
        }
        self.cutoff_timestamp()?;
        Ok(())
    }

    /// Job parameters for a registered import run.
    pub fn to_params(&self, import_id: i64, page_size: u64) -> SyncResult<ImportParams> {
        Ok(ImportParams {
            import_id,
            item_set_id: self.item_set,
            user: self.user.clone(),
            cutoff: self.cutoff_timestamp()?,
            resume_offset: self.start,
            page_size,
            import_files: self.import_files,
            probe_links: self.probe_links,
        })
    }
}
