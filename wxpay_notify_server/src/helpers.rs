use std::{net::IpAddr, str::FromStr, sync::OnceLock};

use actix_web::{http::header::HeaderMap, HttpRequest};
use log::{debug, trace};
use regex::Regex;
use wxpay_notify_engine::helpers::NotificationHeaders;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The first address in the `X-Forwarded-For` header, iif `use_x_forwarded_for` is set.
/// 2. The `for=` address in the `Forwarded` header, iif `use_forwarded` is set.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_for_regex().and_then(|re| re.captures(v)))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str().trim_matches('"'))
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

fn forwarded_for_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"for=(?P<ip>[^;,]+)"#).ok()).as_ref()
}

/// Copies the request headers into the engine's transport-neutral form. Values that are not valid UTF-8 are
/// dropped; none of the signed headers can legitimately contain such bytes.
pub fn notification_headers(headers: &HeaderMap) -> NotificationHeaders {
    headers.iter().filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))).collect()
}
