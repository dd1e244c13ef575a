//! Routing of intercepted requests to a caching strategy.

use reqwest::Method;

use super::WorkerConfig;
use crate::net::Request;

/// How the worker treats an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Non-GET: straight to the network, never cached.
    Passthrough,
    /// Basemap tile: network first, tile pool as offline fallback.
    Tile,
    /// Anything else: any pool first, network on miss.
    CacheFirst,
}

/// Classifies `request` under `config`.
pub fn classify(request: &Request, config: &WorkerConfig) -> RequestClass {
    if request.method != Method::GET {
        return RequestClass::Passthrough;
    }
    match request.url.host_str() {
        Some(host) if config.is_tile_host(host) => RequestClass::Tile,
        _ => RequestClass::CacheFirst,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://maps.example.org/").unwrap())
    }

    #[test]
    fn test_post_is_passthrough() {
        let request = Request::new(
            Method::POST,
            Url::parse("https://a.basemaps.cartocdn.com/light_all/1/0/0.png").unwrap(),
        );
        assert_eq!(classify(&request, &config()), RequestClass::Passthrough);
    }

    #[test]
    fn test_tile_host_is_tile() {
        let request =
            Request::parse_get("https://b.basemaps.cartocdn.com/light_all/8/224/101.png").unwrap();
        assert_eq!(classify(&request, &config()), RequestClass::Tile);
    }

    #[test]
    fn test_other_get_is_cache_first() {
        let request = Request::parse_get("https://maps.example.org/index.html").unwrap();
        assert_eq!(classify(&request, &config()), RequestClass::CacheFirst);

        let cdn = Request::parse_get("https://unpkg.com/leaflet@1.9.4/dist/leaflet.js").unwrap();
        assert_eq!(classify(&cdn, &config()), RequestClass::CacheFirst);
    }
}
