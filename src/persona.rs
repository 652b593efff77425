//! Static browser fingerprint personas.
//!
//! A persona bundles a user agent with a matching viewport, locale, timezone
//! and pixel density. One is picked at random per browsing session so that
//! rotated sessions do not all present the identical fingerprint.

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};

/// User agent passed to the browser process at launch.
///
/// Chrome's `--headless=new` mode injects "HeadlessChrome" into the default
/// UA, which many sites detect and block; sessions override this per-tab
/// with their persona's value.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// An immutable browser fingerprint. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Persona {
    /// Full user agent string.
    pub user_agent: &'static str,
    /// Viewport width and height in CSS pixels.
    pub viewport: (u32, u32),
    /// Accept-Language style locale, e.g. "en-US".
    pub locale: &'static str,
    /// IANA timezone identifier.
    pub timezone: &'static str,
    /// `navigator.platform` value matching the user agent.
    pub platform: &'static str,
    /// Device pixel density.
    pub device_scale_factor: f64,
}

/// The static persona table. Internally consistent combinations only: the
/// platform in the UA matches the viewport and density.
pub const PERSONAS: &[Persona] = &[
    Persona {
        user_agent: DEFAULT_USER_AGENT,
        viewport: (1920, 1080),
        locale: "en-US",
        timezone: "America/New_York",
        platform: "Win32",
        device_scale_factor: 1.0,
    },
    Persona {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
             AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        viewport: (1440, 900),
        locale: "en-US",
        timezone: "America/Los_Angeles",
        platform: "MacIntel",
        device_scale_factor: 1.0,
    },
    Persona {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) \
             Gecko/20100101 Firefox/133.0",
        viewport: (1536, 864),
        locale: "en-GB",
        timezone: "Europe/London",
        platform: "Win32",
        device_scale_factor: 1.25,
    },
    Persona {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
        viewport: (1680, 1050),
        locale: "en-US",
        timezone: "America/Chicago",
        platform: "MacIntel",
        device_scale_factor: 1.0,
    },
    Persona {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
             AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        viewport: (1366, 768),
        locale: "de-DE",
        timezone: "Europe/Berlin",
        platform: "Win32",
        device_scale_factor: 1.0,
    },
    Persona {
        user_agent: "Mozilla/5.0 (Linux; Android 14; Pixel 8) \
             AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
        viewport: (412, 915),
        locale: "en-US",
        timezone: "America/Denver",
        platform: "Linux armv81",
        device_scale_factor: 2.625,
    },
];

impl Persona {
    /// Picks a random persona from the static table.
    pub fn random() -> &'static Persona {
        let idx = rand::rng().random_range(0..PERSONAS.len());
        &PERSONAS[idx]
    }

    /// Whether the fingerprint should advertise touch capability, inferred
    /// from pixel density (high-density profiles are mobile devices here).
    pub fn has_touch(&self) -> bool {
        self.device_scale_factor > 1.5
    }

    /// Headers for the lightweight (plain HTTP) fetch path, derived from
    /// this persona.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        let accept_language = format!("{},en;q=0.8", self.locale);
        if let Ok(value) = HeaderValue::from_str(&accept_language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }
        headers
    }
}
