//! Shared `env_logger` initialization, so embedders other than the bundled
//! CLI can opt into the same log formatting without depending on the `cli`
//! feature themselves.

#[cfg(feature = "cli")]
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}
