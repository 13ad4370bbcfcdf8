pub const SIGHTING_PREFIX: &str = "bigfoot:sighting:";
pub const SIGHTING_INDEX: &str = "bigfoot:sighting:index";
pub const SIGHTINGS_KEY: &str = "bigfoot:sightings";
pub const MOTD_KEY: &str = "bigfoot:motd";
pub const REPORTS_KEY: &str = "bigfoot:sightings:reported";

pub fn sighting_key(id: &str) -> String {
    format!("{SIGHTING_PREFIX}{id}")
}

/// Membership sets kept in step with each sighting's categorical fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexSet {
    All,
    ByState(String),
    ByClass(String),
}

impl IndexSet {
    pub fn key(&self) -> String {
        match self {
            IndexSet::All => SIGHTINGS_KEY.to_string(),
            IndexSet::ByState(state) => format!("{SIGHTINGS_KEY}:byState:{state}"),
            IndexSet::ByClass(class) => format!("{SIGHTINGS_KEY}:byClass:{class}"),
        }
    }
}
