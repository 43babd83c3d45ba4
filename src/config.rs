//! Environment configuration

use crate::runtime::AgentTarget;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Agents from `A2A_AGENTS`, as `name=url` pairs separated by commas
    pub agents: Vec<AgentTarget>,
    /// Agent selected at startup
    pub default_agent: Option<String>,
    pub connect_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            agents: Vec::new(),
            default_agent: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            port: lookup("A2A_CHAT_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            agents: lookup("A2A_AGENTS")
                .map(|raw| parse_agents(&raw))
                .unwrap_or_default(),
            default_agent: lookup("A2A_DEFAULT_AGENT").filter(|name| !name.trim().is_empty()),
            connect_timeout: lookup("A2A_CONNECT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.connect_timeout, Duration::from_secs),
        }
    }

    /// The configured startup agent, if it names a known target
    pub fn startup_agent(&self) -> Option<&AgentTarget> {
        let name = self.default_agent.as_deref()?;
        let target = self.agents.iter().find(|agent| agent.name == name);
        if target.is_none() {
            tracing::warn!(agent = %name, "A2A_DEFAULT_AGENT names an unknown agent");
        }
        target
    }
}

fn parse_agents(raw: &str) -> Vec<AgentTarget> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((name, endpoint)) if !name.trim().is_empty() && !endpoint.trim().is_empty() => {
                Some(AgentTarget {
                    name: name.trim().to_string(),
                    endpoint: endpoint.trim().to_string(),
                })
            }
            _ => {
                tracing::warn!(entry = %entry, "Ignoring malformed A2A_AGENTS entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]), AppConfig::default());
    }

    #[test]
    fn test_agents_are_parsed_in_order() {
        let config = config(&[(
            "A2A_AGENTS",
            "planner=http://localhost:10001, architect = http://localhost:10002 ,broken,=http://x",
        )]);

        let names: Vec<_> = config.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["planner", "architect"]);
        assert_eq!(config.agents[1].endpoint, "http://localhost:10002");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("A2A_CHAT_PORT", "9100"),
            ("A2A_CONNECT_TIMEOUT_SECS", "5"),
            ("A2A_AGENTS", "planner=http://localhost:10001"),
            ("A2A_DEFAULT_AGENT", "planner"),
        ]);

        assert_eq!(config.port, 9100);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.startup_agent().map(|a| a.name.as_str()), Some("planner"));
    }

    #[test]
    fn test_unparsable_values_fall_back() {
        let config = config(&[
            ("A2A_CHAT_PORT", "not-a-port"),
            ("A2A_DEFAULT_AGENT", "ghost"),
        ]);

        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.startup_agent().is_none());
    }
}
