use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size: usize,  // in bytes
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Clone)]
pub struct AdminConfig {
    pub key: String,
}

// Keep the admin secret out of `{:?}` output.
impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig").field("key", &"<redacted>").finish()
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.max_body_size", 64 * 1024)?
            .set_default("store.path", "users.json")?
            .set_default("auth.bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("admin.key", std::env::var("ADMIN_KEY").ok())?
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.admin.key.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "admin.key must be set (ADMIN_KEY or APP_ADMIN__KEY)".into(),
            ));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(config::ConfigError::Message(
                "auth.bcrypt_cost must be within 4..=31".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server: ServerConfig { host: "127.0.0.1".into(), port: 3000, max_body_size: 1024 },
            store: StoreConfig { path: "users.json".into() },
            auth: AuthConfig { bcrypt_cost: 4 },
            admin: AdminConfig { key: "secret".into() },
        }
    }

    #[test]
    fn rejects_blank_admin_key() {
        let mut config = sample();
        assert!(config.validate().is_ok());

        config.admin.key = "   ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_cost() {
        let mut config = sample();
        config.auth.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }

    // Only test in the crate that touches the process environment.
    #[test]
    fn reads_nested_keys_from_app_env() {
        if std::env::var("ADMIN_KEY").is_ok() { return; }
        std::env::set_var("APP_ADMIN__KEY", "from-app-env");
        std::env::set_var("APP_SERVER__MAX_BODY_SIZE", "2048");

        let loaded = Config::load();

        std::env::remove_var("APP_ADMIN__KEY");
        std::env::remove_var("APP_SERVER__MAX_BODY_SIZE");

        let config = loaded.expect("config loads from APP_* variables");
        assert_eq!(config.admin.key, "from-app-env");
        assert_eq!(config.server.max_body_size, 2048);
    }

    #[test]
    fn debug_output_hides_admin_key() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("secret"));
    }
}
