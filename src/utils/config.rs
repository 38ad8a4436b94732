use log::{info, warn};
use std::{env, fmt::Display, str::FromStr};

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Mongo,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreKind::Mongo),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreKind,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub admin_user_ids: Vec<String>,
}

/// Development-only signing secret used when `JWT_SECRET` is unset.
pub const DEFAULT_JWT_SECRET: &str = "secret";

impl Config {
    pub fn load() -> Self {
        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, tokens are signed with the development secret");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            host: try_load("HOST", "localhost"),
            port: try_load("PORT", "8000"),
            store: try_load("STORE", "mongo"),
            mongodb_uri: try_load("MONGODB_URI", "mongodb://localhost:27017"),
            database_name: try_load("DATABASE_NAME", "article_engagement"),
            jwt_secret,
            admin_user_ids: parse_id_list(&var("ADMIN_USER_IDS").unwrap_or_default()),
        }
    }

    /// Refuse settings that are only fit for local development.
    ///
    /// The persistent store must not run with the development signing secret.
    pub fn check(&self) -> Result<(), String> {
        if self.store == StoreKind::Mongo && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err("JWT_SECRET must be set when STORE=mongo".to_string());
        }
        Ok(())
    }
}

/// Split a comma separated id list, dropping blanks.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value: {e}, using default: {default}");
            match default.parse() {
                Ok(value) => value,
                Err(e) => panic!("default for {key} does not parse: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_list_ignores_blanks_and_whitespace() {
        assert_eq!(
            parse_id_list(" admin-1, ,admin-2,"),
            vec!["admin-1".to_string(), "admin-2".to_string()]
        );
        assert!(parse_id_list("").is_empty());
    }

    fn config(store: StoreKind, jwt_secret: &str) -> Config {
        Config {
            host: "localhost".to_string(),
            port: 8000,
            store,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database_name: "article_engagement".to_string(),
            jwt_secret: jwt_secret.to_string(),
            admin_user_ids: Vec::new(),
        }
    }

    #[test]
    fn mongo_store_needs_a_real_signing_secret() {
        assert!(config(StoreKind::Mongo, DEFAULT_JWT_SECRET).check().is_err());
        assert!(config(StoreKind::Mongo, "s3cr3t-from-vault").check().is_ok());
        assert!(config(StoreKind::Memory, DEFAULT_JWT_SECRET).check().is_ok());
    }

    #[test]
    fn store_kind_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert_eq!("mongodb".parse::<StoreKind>(), Ok(StoreKind::Mongo));
        assert!("sqlite".parse::<StoreKind>().is_err());
    }
}
