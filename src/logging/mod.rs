//! Structured logging setup and helpers.
//!
//! Provides tracing initialization from [`LoggingConfig`] and the filter
//! directive builder used to enable per-component log levels.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels.
///
/// # Examples
///
/// ```
/// use switchboard::config::LoggingConfig;
/// use switchboard::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("router".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     component_levels: Some(component_levels),
///     ..Default::default()
/// };
///
/// assert_eq!(
///     build_filter_directives(&config),
///     "info,switchboard::router=debug"
/// );
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",switchboard::{}={}", component, level));
        }
    }

    filter_str
}

/// Initialize the global tracing subscriber from configuration.
///
/// Safe to call once per process; subsequent calls are ignored so tests
/// can initialize defensively.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(build_filter_directives(config))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };
    // Already-set subscriber means another component initialized logging
    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

/// Truncate message content for log output.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn base_level_only() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_directives(&config), "info");
    }

    #[test]
    fn component_levels_appended() {
        let mut levels = HashMap::new();
        levels.insert("router".to_string(), "debug".to_string());
        levels.insert("cost".to_string(), "trace".to_string());
        let config = LoggingConfig {
            component_levels: Some(levels),
            ..Default::default()
        };
        assert_eq!(
            build_filter_directives(&config),
            "info,switchboard::cost=trace,switchboard::router=debug"
        );
    }

    #[test]
    fn truncate_content_short_passthrough() {
        assert_eq!(truncate_content("hello", 10), "hello");
    }

    #[test]
    fn truncate_content_clips_long_input() {
        let long = "a".repeat(50);
        let truncated = truncate_content(&long, 10);
        assert_eq!(truncated, format!("{}...", "a".repeat(10)));
    }

    #[test]
    fn truncate_content_respects_char_boundaries() {
        let content = "héllo wörld with ünïcode chars";
        let truncated = truncate_content(content, 5);
        assert_eq!(truncated, "héllo...");
    }
}
