/// Trait for loading configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` and call `Config::try_from_env()`
/// at startup. Field names map to upper-case variables, so `supabase_url`
/// reads `SUPABASE_URL`.
pub trait Config: Sized + ::serde::de::DeserializeOwned {
    fn try_from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// Load from an explicit set of pairs instead of the process environment.
    fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(pairs)
    }
}
