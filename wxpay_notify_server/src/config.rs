//! Server configuration.
//!
//! Everything is read from `WXN_*` environment variables by [`ServerConfig::from_env_or_default`]. Bad values are
//! logged and replaced by their defaults, so that a typo in an optional setting does not take the notify endpoint
//! down. The APIv3 key has no default; [`crate::server::run_server`] refuses to start without a valid one.
use std::{env, net::IpAddr, path::PathBuf, time::Duration};

use log::*;
use wxpay_common::{parse_boolean_flag, Secret};
use wxpay_notify_engine::ProcessorOptions;

const DEFAULT_WXN_HOST: &str = "127.0.0.1";
const DEFAULT_WXN_PORT: u16 = 5000;
const DEFAULT_CERT_DIR: &str = "./cert";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for the notify routes, e.g. `/wxpay`. Empty by default.
    pub url_prefix: String,
    /// SQLite URL for the event store. `None` keeps processed events in memory.
    pub database_url: Option<String>,
    pub apiv3_key: Secret<String>,
    pub cert_dir: PathBuf,
    pub timestamp_tolerance: Duration,
    pub callback_timeout: Duration,
    pub reservation_ttl: Duration,
    pub cert_refresh_cooldown: Duration,
    pub cert_refresh_interval: Duration,
    /// If supplied, only these addresses may call the notify route.
    pub notify_whitelist: Option<Vec<IpAddr>>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let options = ProcessorOptions::default();
        Self {
            host: DEFAULT_WXN_HOST.to_string(),
            port: DEFAULT_WXN_PORT,
            url_prefix: String::default(),
            database_url: None,
            apiv3_key: Secret::default(),
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            timestamp_tolerance: options.timestamp_tolerance,
            callback_timeout: options.callback_timeout,
            reservation_ttl: options.reservation_ttl,
            cert_refresh_cooldown: options.certificate_refresh_cooldown,
            cert_refresh_interval: options.certificate_refresh_interval,
            notify_whitelist: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("WXN_HOST").ok().unwrap_or_else(|| DEFAULT_WXN_HOST.into());
        let port = env::var("WXN_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for WXN_PORT. {e} Using the default, {DEFAULT_WXN_PORT}, instead."
                    );
                    DEFAULT_WXN_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_WXN_PORT);
        let url_prefix = normalize_prefix(&env::var("WXN_URL_PREFIX").unwrap_or_default());
        let database_url = env::var("WXN_DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        if database_url.is_none() {
            warn!(
                "🪛️ WXN_DATABASE_URL is not set. Processed events are kept in memory and will be forgotten on restart. \
                 Do not run more than one instance like this."
            );
        }
        let apiv3_key = env::var("WXN_APIV3_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ WXN_APIV3_KEY is not set. Please set it to the merchant's APIv3 key.");
            String::default()
        });
        let cert_dir = env::var("WXN_CERT_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            info!("🪛️ WXN_CERT_DIR is not set. Using the default, {DEFAULT_CERT_DIR}.");
            PathBuf::from(DEFAULT_CERT_DIR)
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("WXN_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("WXN_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            url_prefix,
            database_url,
            apiv3_key: Secret::new(apiv3_key),
            cert_dir,
            timestamp_tolerance: seconds_from_env("WXN_TIMESTAMP_TOLERANCE", defaults.timestamp_tolerance),
            callback_timeout: seconds_from_env("WXN_CALLBACK_TIMEOUT", defaults.callback_timeout),
            reservation_ttl: seconds_from_env("WXN_RESERVATION_TTL", defaults.reservation_ttl),
            cert_refresh_cooldown: seconds_from_env("WXN_CERT_REFRESH_COOLDOWN", defaults.cert_refresh_cooldown),
            cert_refresh_interval: seconds_from_env("WXN_CERT_REFRESH_INTERVAL", defaults.cert_refresh_interval),
            notify_whitelist: configure_whitelist(env::var("WXN_NOTIFY_IP_WHITELIST").ok()),
            use_x_forwarded_for,
            use_forwarded,
        }
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            timestamp_tolerance: self.timestamp_tolerance,
            callback_timeout: self.callback_timeout,
            reservation_ttl: self.reservation_ttl,
            certificate_refresh_cooldown: self.cert_refresh_cooldown,
            certificate_refresh_interval: self.cert_refresh_interval,
        }
    }
}

/// `""` and `"/"` become `""`; anything else gets exactly one leading slash and no trailing one.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::default()
    } else {
        format!("/{trimmed}")
    }
}

fn seconds_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| trace!("🪛️ {var} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}. Using {}s.", default.as_secs()))
        })
        .ok()
        .unwrap_or(default)
}

pub fn configure_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
            return None;
        }
        let ip_addrs = s
            .split(',')
            .filter_map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in WXN_NOTIFY_IP_WHITELIST: {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The notify IP whitelist was configured, but is empty. The server will run, but will refuse every \
                 notification."
            );
        },
        None => {
            info!("🪛️ No notify IP whitelist is set. Notifications are authenticated by signature only.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Notify IP whitelist: {addrs}");
        },
    }
    whitelist
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prefixes() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("wxpay"), "/wxpay");
        assert_eq!(normalize_prefix("/wxpay/"), "/wxpay");
    }

    #[test]
    fn whitelists() {
        assert!(configure_whitelist(None).is_none());
        assert!(configure_whitelist(Some("none".into())).is_none());
        let list = configure_whitelist(Some("101.226.103.0, 2001:db8::1, nonsense".into())).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"101.226.103.0".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn defaults_match_the_engine() {
        let config = ServerConfig::new("0.0.0.0", 8080);
        assert_eq!(config.port, 8080);
        assert_eq!(config.processor_options(), ProcessorOptions::default());
        assert_eq!(config.cert_dir, PathBuf::from("./cert"));
    }
}
