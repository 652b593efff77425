//! Search backend implementations.

mod bing;
mod brave;
mod duckduckgo;
mod google;

pub use bing::Bing;
pub use brave::BraveApi;
pub use duckduckgo::DuckDuckGo;
pub use google::GoogleBrowser;
