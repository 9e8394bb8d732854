use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::schema::UnseenCategoryPolicy;

pub const DEFAULT_MODEL_PATH: &str = "model.json";
pub const DEFAULT_META_PATH: &str = "meta.json";
pub const DEFAULT_PORT: u16 = 8501;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub model_path: PathBuf,
    pub meta_path: PathBuf,
    pub bind: SocketAddr,
    pub unseen_category: UnseenCategoryPolicy,
    /// `LOG_PRED=1`
    pub log_predictions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            meta_path: PathBuf::from(DEFAULT_META_PATH),
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            unseen_category: UnseenCategoryPolicy::default(),
            log_predictions: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any variable source; unset variables take their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(p) = get("MODEL_PATH") {
            cfg.model_path = PathBuf::from(p);
        }
        if let Some(p) = get("META_PATH") {
            cfg.meta_path = PathBuf::from(p);
        }
        if let Some(addr) = get("BIND_ADDR") {
            let ip: IpAddr = addr.trim().parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    var: "BIND_ADDR",
                    value: addr.clone(),
                    reason: e.to_string(),
                }
            })?;
            cfg.bind.set_ip(ip);
        }
        if let Some(port) = get("PORT") {
            let port_num: u16 = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    var: "PORT",
                    value: port.clone(),
                    reason: e.to_string(),
                }
            })?;
            cfg.bind.set_port(port_num);
        }
        if let Some(policy) = get("UNSEEN_CATEGORY") {
            cfg.unseen_category = policy.parse().map_err(|reason| ConfigError::Invalid {
                var: "UNSEEN_CATEGORY",
                value: policy.clone(),
                reason,
            })?;
        }
        cfg.log_predictions = get("LOG_PRED").as_deref() == Some("1");

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.bind.port(), 8501);
    }

    #[test]
    fn overrides() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("MODEL_PATH", "/srv/xgb.json"),
            ("PORT", "9000"),
            ("BIND_ADDR", "127.0.0.1"),
            ("UNSEEN_CATEGORY", "reject"),
            ("LOG_PRED", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("/srv/xgb.json"));
        assert_eq!(cfg.bind, SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(cfg.unseen_category, UnseenCategoryPolicy::Reject);
        assert!(cfg.log_predictions);
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
