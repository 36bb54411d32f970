//! Disease element categories and the built-in survey catalog.

use serde::{Deserialize, Serialize};

/// The kind of community-contributed disease element.
///
/// Serialized as its numeric `type_id` so rows round-trip with the hosted
/// schema unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ElementType {
    Trigger,
    Symptom,
    Supplement,
}

impl ElementType {
    pub const ALL: [ElementType; 3] = [Self::Trigger, Self::Symptom, Self::Supplement];

    /// Numeric `type_id` used by the store.
    pub fn id(self) -> i64 {
        match self {
            Self::Trigger => 1,
            Self::Symptom => 2,
            Self::Supplement => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Trigger),
            2 => Some(Self::Symptom),
            3 => Some(Self::Supplement),
            _ => None,
        }
    }

    /// URL slug of the category page.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Trigger => "triggers",
            Self::Symptom => "symptoms",
            Self::Supplement => "supplements",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.slug() == slug)
    }

    /// Key of the name column in the stats table for this category.
    pub fn column_key(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Symptom => "symptom",
            Self::Supplement => "supplement",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Trigger => "Triggers",
            Self::Symptom => "Symptoms",
            Self::Supplement => "Supplements",
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl TryFrom<i64> for ElementType {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_id(value).ok_or_else(|| format!("unknown element type id {value}"))
    }
}

impl From<ElementType> for i64 {
    fn from(value: ElementType) -> Self {
        value.id()
    }
}

/// A card shown in the swipe survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    pub description: String,
}

impl SurveyCard {
    fn fallback(title: &str, description: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Public description of a category, as consumed by the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub slug: &'static str,
    #[serde(rename = "typeId")]
    pub type_id: ElementType,
    #[serde(rename = "columnKey")]
    pub column_key: &'static str,
    pub title: &'static str,
    #[serde(rename = "fallbackCards")]
    pub fallback_cards: Vec<SurveyCard>,
}

impl Category {
    pub fn of(element_type: ElementType) -> Self {
        Self {
            slug: element_type.slug(),
            type_id: element_type,
            column_key: element_type.column_key(),
            title: element_type.title(),
            fallback_cards: fallback_cards(element_type),
        }
    }

    pub fn all() -> Vec<Self> {
        ElementType::ALL.into_iter().map(Self::of).collect()
    }
}

/// Cards served when the store has no elements for a category yet.
pub fn fallback_cards(element_type: ElementType) -> Vec<SurveyCard> {
    let cards: &[(&str, &str)] = match element_type {
        ElementType::Trigger => &[
            ("Caffeine", "Coffee, energy drinks, pre-workout."),
            ("Alcohol", "Wine, beer, spirits."),
            ("Stress", "Acute stress, deadlines, arguments."),
            ("Lack of sleep", "Short or disrupted nights."),
            ("Cold exposure", "Cold weather or cold showers."),
        ],
        ElementType::Symptom => &[
            ("Palpitations", "Racing or fluttering heart sensations."),
            ("Dizziness", "Feeling lightheaded or unsteady."),
            ("Chest discomfort", "Tightness or pressure in the chest."),
            ("Shortness of breath", "Breathlessness with light activity."),
            ("Fatigue", "Unusual tiredness without clear cause."),
        ],
        ElementType::Supplement => &[
            ("Magnesium", "Supplemental magnesium (glycinate, citrate)."),
            ("Omega-3", "Fish oil or algae-based omega-3s."),
            ("CoQ10", "Ubiquinone/ubiquinol coenzyme Q10."),
            ("Electrolytes", "Electrolyte mixes with sodium/potassium."),
            ("Taurine", "Amino acid often used for calming effects."),
        ],
    };
    cards
        .iter()
        .map(|(title, description)| SurveyCard::fallback(title, description))
        .collect()
}
