//! Channel names and subscription patterns.
//!
//! Patterns are either an exact channel name or a trailing-`*` glob
//! (`tasks:*` matches `tasks:created` and `tasks:updated`). Matching is
//! per-channel only; there is no ordering relationship across channels.

/// Well-known broadcast channels.
pub mod channels {
    pub const TASKS_CREATED: &str = "tasks:created";
    pub const TASKS_UPDATED: &str = "tasks:updated";
    pub const TASKS_ALL: &str = "tasks:*";
    pub const COORDINATION: &str = "coordination";
    pub const INSIGHTS: &str = "insights";
    pub const REVIEWS: &str = "reviews";

    /// Per-assistant sync channel, e.g. `sync:claude`.
    pub fn sync(assistant: &str) -> String {
        format!("sync:{assistant}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPattern {
    Exact(String),
    /// Everything up to (and excluding) the `*`.
    Prefix(String),
}

impl ChannelPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => ChannelPattern::Prefix(prefix.to_string()),
            None => ChannelPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, channel: &str) -> bool {
        match self {
            ChannelPattern::Exact(name) => channel == name,
            ChannelPattern::Prefix(prefix) => channel.starts_with(prefix.as_str()),
        }
    }
}

impl std::fmt::Display for ChannelPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelPattern::Exact(name) => f.write_str(name),
            ChannelPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let p = ChannelPattern::parse("coordination");
        assert!(p.matches("coordination"));
        assert!(!p.matches("coordination:extra"));
        assert!(!p.matches("insights"));
    }

    #[test]
    fn test_prefix_glob() {
        let p = ChannelPattern::parse("tasks:*");
        assert!(p.matches(channels::TASKS_CREATED));
        assert!(p.matches(channels::TASKS_UPDATED));
        assert!(!p.matches("task:created"));
        assert!(!p.matches("coordination"));
    }

    #[test]
    fn test_bare_star_matches_everything() {
        let p = ChannelPattern::parse("*");
        assert!(p.matches("anything"));
        assert!(p.matches("sync:claude"));
    }

    #[test]
    fn test_display_roundtrip() {
        for raw in ["tasks:*", "sync:claude", "*"] {
            assert_eq!(ChannelPattern::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_sync_channel_name() {
        assert_eq!(channels::sync("claude"), "sync:claude");
    }
}
