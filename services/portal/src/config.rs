use serde::Deserialize;

use portal_core::config::Config;

/// Portal configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the hosted backend (e.g. "https://abc.supabase.co").
    pub supabase_url: String,
    /// Public (anon) API key sent with every request.
    pub supabase_anon_key: String,
    /// Bucket for employee profile images. Env var: `PROFILE_BUCKET`.
    #[serde(default = "default_profile_bucket")]
    pub profile_bucket: String,
    /// Bucket for family member images. Env var: `FAMILY_BUCKET`.
    #[serde(default = "default_family_bucket")]
    pub family_bucket: String,
    /// Emit JSON log lines instead of human-readable output. Env var: `LOG_JSON`.
    #[serde(default)]
    pub log_json: bool,
}

fn default_profile_bucket() -> String {
    "employee-profiles".to_owned()
}

fn default_family_bucket() -> String {
    "family-profiles".to_owned()
}

impl Config for PortalConfig {}
