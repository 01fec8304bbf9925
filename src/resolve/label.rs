//! Named-entity labels.

use serde::{Deserialize, Serialize};

/// An NER label in the OntoNotes scheme used by common taggers.
///
/// Unrecognised labels are preserved verbatim in [`EntityLabel::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityLabel {
    Person,
    Norp,
    Facility,
    Organization,
    Gpe,
    Location,
    Product,
    Event,
    WorkOfArt,
    Law,
    Language,
    Date,
    Time,
    Percent,
    Money,
    Quantity,
    Ordinal,
    Cardinal,
    /// No NER span overlapped any mention of the cluster.
    Unknown,
    Other(String),
}

impl EntityLabel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "PERSON",
            Self::Norp => "NORP",
            Self::Facility => "FAC",
            Self::Organization => "ORG",
            Self::Gpe => "GPE",
            Self::Location => "LOC",
            Self::Product => "PRODUCT",
            Self::Event => "EVENT",
            Self::WorkOfArt => "WORK_OF_ART",
            Self::Law => "LAW",
            Self::Language => "LANGUAGE",
            Self::Date => "DATE",
            Self::Time => "TIME",
            Self::Percent => "PERCENT",
            Self::Money => "MONEY",
            Self::Quantity => "QUANTITY",
            Self::Ordinal => "ORDINAL",
            Self::Cardinal => "CARDINAL",
            Self::Unknown => "UNKNOWN",
            Self::Other(label) => label,
        }
    }

    /// Whether this label's name appears in `set` (e.g. a configured place set).
    pub fn is_in(&self, set: &[String]) -> bool {
        set.iter().any(|l| l.eq_ignore_ascii_case(self.as_str()))
    }
}

impl From<&str> for EntityLabel {
    fn from(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "PERSON" | "PER" => Self::Person,
            "NORP" => Self::Norp,
            "FAC" => Self::Facility,
            "ORG" => Self::Organization,
            "GPE" => Self::Gpe,
            "LOC" => Self::Location,
            "PRODUCT" => Self::Product,
            "EVENT" => Self::Event,
            "WORK_OF_ART" => Self::WorkOfArt,
            "LAW" => Self::Law,
            "LANGUAGE" => Self::Language,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "PERCENT" => Self::Percent,
            "MONEY" => Self::Money,
            "QUANTITY" => Self::Quantity,
            "ORDINAL" => Self::Ordinal,
            "CARDINAL" => Self::Cardinal,
            "UNKNOWN" | "" => Self::Unknown,
            _ => Self::Other(label.trim().to_string()),
        }
    }
}

impl From<String> for EntityLabel {
    fn from(label: String) -> Self {
        Self::from(label.as_str())
    }
}

impl From<EntityLabel> for String {
    fn from(label: EntityLabel) -> Self {
        label.as_str().to_string()
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
