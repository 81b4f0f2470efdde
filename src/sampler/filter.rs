// Container selection by alias (MATCH_TYPE).

use crate::config::MatchType;
use crate::models::ContainerRef;

/// Alias that marks the sender's own container.
const SENDER_ALIAS: &str = "sender";

#[derive(Debug, Clone, Copy)]
pub struct ContainerFilter(MatchType);

impl ContainerFilter {
    pub fn new(match_type: MatchType) -> Self {
        Self(match_type)
    }

    /// Name to report the container under, or None when it is not selected.
    /// The first alias that passes the filter wins.
    pub fn select_name(&self, container: &ContainerRef) -> Option<String> {
        let is_sender = container.aliases.iter().any(|a| a == SENDER_ALIAS);
        match self.0 {
            MatchType::All => Some(container.display_name().to_string()),
            MatchType::NoSender if is_sender => None,
            MatchType::NoSender => Some(container.display_name().to_string()),
            MatchType::Uuid if is_sender => None,
            MatchType::Uuid => container
                .aliases
                .iter()
                .find(|a| uuid::Uuid::parse_str(a).is_ok())
                .cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(aliases: &[&str]) -> ContainerRef {
        ContainerRef::new("id1", aliases.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn all_uses_first_alias_or_id() {
        let f = ContainerFilter::new(MatchType::All);
        assert_eq!(f.select_name(&container(&["/web", "/alt"])), Some("web".into()));
        assert_eq!(f.select_name(&container(&[])), Some("id1".into()));
        assert_eq!(f.select_name(&container(&["sender"])), Some("sender".into()));
    }

    #[test]
    fn no_sender_skips_sender_container() {
        let f = ContainerFilter::new(MatchType::NoSender);
        assert_eq!(f.select_name(&container(&["sender"])), None);
        assert_eq!(f.select_name(&container(&["db"])), Some("db".into()));
    }

    #[test]
    fn uuid_selects_uuid_alias() {
        let f = ContainerFilter::new(MatchType::Uuid);
        let id = "6f1e2c1e-5d1a-11ee-8c99-0242ac120002";
        assert_eq!(f.select_name(&container(&["web", id])), Some(id.into()));
        assert_eq!(f.select_name(&container(&["web"])), None);
        assert_eq!(f.select_name(&container(&["sender", id])), None);
    }
}
