use crate::app::ports::VenueResolver;
use crate::common::types::VenueFields;
use std::collections::HashMap;

/// Venue records declared in configuration (`[venues.<id>]`)
#[derive(Debug, Default, Clone)]
pub struct StaticVenueResolver {
    venues: HashMap<u64, VenueFields>,
}

impl StaticVenueResolver {
    pub fn new(venues: HashMap<u64, VenueFields>) -> Self {
        Self { venues }
    }

    pub fn insert(&mut self, id: u64, venue: VenueFields) {
        self.venues.insert(id, venue);
    }
}

impl VenueResolver for StaticVenueResolver {
    fn resolve_venue_by_id(&self, id: u64) -> Option<VenueFields> {
        self.venues.get(&id).cloned()
    }
}
