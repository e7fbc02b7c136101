use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Application (bot) id; doubles as the expected token audience.
    pub app_id: String,
    pub openid_config_url: String,
    pub graph_base_url: String,
    pub graph_token: Option<String>,
    /// Endpoint for the best-effort after-meeting signal, if any.
    pub after_meeting_url: Option<String>,
    pub auto_leave_delay_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3007),
            app_id: env::var("MICROSOFT_APP_ID").unwrap_or_default(),
            openid_config_url: env::var("BOT_OPENID_CONFIG_URL").unwrap_or_else(|_| {
                "https://login.botframework.com/v1/.well-known/openidconfiguration".to_string()
            }),
            graph_base_url: env::var("GRAPH_BASE_URL")
                .unwrap_or_else(|_| "https://graph.microsoft.com/beta".to_string()),
            graph_token: env::var("GRAPH_ACCESS_TOKEN").ok(),
            after_meeting_url: env::var("AFTER_MEETING_URL").ok(),
            auto_leave_delay_seconds: env::var("AUTO_LEAVE_DELAY")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3007,
            app_id: String::new(),
            openid_config_url:
                "https://login.botframework.com/v1/.well-known/openidconfiguration".to_string(),
            graph_base_url: "https://graph.microsoft.com/beta".to_string(),
            graph_token: None,
            after_meeting_url: None,
            auto_leave_delay_seconds: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_from_env_fallbacks() {
        let config = Config::default();
        assert_eq!(config.port, 3007);
        assert_eq!(config.auto_leave_delay_seconds, 60);
        assert!(config.openid_config_url.contains("openidconfiguration"));
    }
}
