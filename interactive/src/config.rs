use std::cell::OnceCell;

use web_sys::window;

const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";

thread_local! {
    static CONFIG: OnceCell<Config> = const { OnceCell::new() };
}

/// Where the hosted backend lives. Set by the hosting page through meta tags.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub anon_key: String,
}

impl Config {
    pub fn get() -> Config {
        CONFIG.with(|cell| cell.get_or_init(Config::from_page).clone())
    }

    fn from_page() -> Config {
        let backend_url = meta("agora-backend-url")
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let anon_key = meta("agora-anon-key").unwrap_or_default();
        if anon_key.is_empty() {
            log::warn!("no agora-anon-key meta tag; backend calls will be rejected");
        }
        Config {
            backend_url,
            anon_key,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }

    /// Websocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> String {
        let base = self
            .backend_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!(
            "{base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        )
    }
}

fn meta(name: &str) -> Option<String> {
    let document = window()?.document()?;
    let el = document
        .query_selector(&format!("meta[name='{name}']"))
        .ok()
        .flatten()?;
    el.get_attribute("content").filter(|v| !v.is_empty())
}
