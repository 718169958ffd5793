//! Storage key constants.

/// Keys used by the session vault.
pub struct StorageKeys;

impl StorageKeys {
    /// Supabase access token
    pub const ACCESS_TOKEN: &'static str = "supabase_access_token";

    /// Supabase refresh token
    pub const REFRESH_TOKEN: &'static str = "supabase_refresh_token";

    /// Session metadata (JSON)
    pub const SESSION_META: &'static str = "supabase_session_meta";
}
