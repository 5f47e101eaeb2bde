use crate::app::ports::VenueResolver;
use crate::common::types::VenueFields;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Static venue assigned to every event of a source: a resolver id, or literal fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VenueOverride {
    VenueId { venue_id: u64 },
    Fields(VenueFields),
}

impl VenueOverride {
    /// The venue fields to write onto events. An id the resolver doesn't know (or no
    /// resolver at all) yields `None` and events keep their extracted venue.
    pub fn resolve(&self, resolver: Option<&dyn VenueResolver>) -> Option<VenueFields> {
        match self {
            VenueOverride::VenueId { venue_id } => {
                let venue = resolver.and_then(|r| r.resolve_venue_by_id(*venue_id));
                if venue.is_none() {
                    warn!("venue override {} could not be resolved", venue_id);
                }
                venue
            }
            VenueOverride::Fields(fields) => Some(fields.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::StaticVenueResolver;

    #[test]
    fn deserializes_id_or_fields() {
        let by_id: VenueOverride = toml::from_str("venue_id = 7").unwrap();
        assert_eq!(by_id, VenueOverride::VenueId { venue_id: 7 });

        let literal: VenueOverride = toml::from_str("name = \"Barboza\"\ncity = \"Seattle\"").unwrap();
        match literal {
            VenueOverride::Fields(fields) => {
                assert_eq!(fields.name.as_deref(), Some("Barboza"));
                assert_eq!(fields.city.as_deref(), Some("Seattle"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolves_ids_through_the_resolver() {
        let mut resolver = StaticVenueResolver::default();
        resolver.insert(
            7,
            VenueFields {
                name: Some("Neumos".into()),
                ..Default::default()
            },
        );
        let by_id = VenueOverride::VenueId { venue_id: 7 };
        assert_eq!(by_id.resolve(Some(&resolver)).and_then(|v| v.name).as_deref(), Some("Neumos"));
        assert_eq!(VenueOverride::VenueId { venue_id: 8 }.resolve(Some(&resolver)), None);
        assert_eq!(by_id.resolve(None), None);
    }
}
