//! Result categories
//!
//! A finished quiz is bucketed into one of four categories by the share of the
//! maximum score it reached. Each category has an advisory message; the
//! messages live in an [`AdviceTable`] so the copy can be swapped without
//! touching the thresholds.

use enum_map::{Enum, EnumMap, enum_map};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants::{
    category::{OPPORTUNITY_PERCENT, POTENTIAL_PERCENT, READY_PERCENT},
    quiz::MAX_ADVICE_LENGTH,
};

/// The four-tier qualitative bucket derived from a total score
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize,
)]
pub enum Category {
    /// Under 25% of the maximum
    FoundationNeeded,
    /// At least 25% of the maximum
    Opportunity,
    /// At least 50% of the maximum
    Potential,
    /// At least 75% of the maximum
    Ready,
}

impl Category {
    /// Bands in descending order, paired with their inclusive lower bound
    const BANDS: [(u32, Self); 3] = [
        (READY_PERCENT, Self::Ready),
        (POTENTIAL_PERCENT, Self::Potential),
        (OPPORTUNITY_PERCENT, Self::Opportunity),
    ];

    /// Maps a total score onto a category
    ///
    /// Lower bounds are inclusive, so a score landing exactly on a threshold
    /// takes the higher band. The comparison is done in integers
    /// (`score * 100 >= percent * max`) to keep exact boundaries exact.
    /// A `max_score` of zero yields [`Category::FoundationNeeded`].
    pub fn from_score(score: u32, max_score: u32) -> Self {
        if max_score == 0 {
            return Self::FoundationNeeded;
        }

        let scaled = u64::from(score) * 100;

        Self::BANDS
            .into_iter()
            .find(|(percent, _)| scaled >= u64::from(*percent) * u64::from(max_score))
            .map_or(Self::FoundationNeeded, |(_, category)| category)
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Ready => "Growth Ready",
            Self::Potential => "Growth Potential",
            Self::Opportunity => "Growth Opportunity",
            Self::FoundationNeeded => "Growth Foundation Needed",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Checks that every advisory message is present and of reasonable size
fn validate_advice(advice: &EnumMap<Category, String>, _ctx: &()) -> garde::Result {
    match advice
        .iter()
        .find(|(_, text)| text.trim().is_empty() || text.len() > MAX_ADVICE_LENGTH)
    {
        Some((category, _)) => Err(garde::Error::new(format!(
            "advice for `{category}` must be between 1 and {MAX_ADVICE_LENGTH} characters"
        ))),
        None => Ok(()),
    }
}

/// Advisory copy for each category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AdviceTable {
    #[garde(custom(validate_advice))]
    advice: EnumMap<Category, String>,
}

impl AdviceTable {
    /// Creates a table from explicit messages
    pub fn new(advice: EnumMap<Category, String>) -> Self {
        Self { advice }
    }

    /// Returns the message for `category`
    pub fn get(&self, category: Category) -> &str {
        &self.advice[category]
    }
}

impl Default for AdviceTable {
    fn default() -> Self {
        Self::new(enum_map! {
            Category::Ready => "You're ahead of most agencies. Focus on optimization, scaling what works, and advanced AI implementation.".to_owned(),
            Category::Potential => "You have foundations in place but significant room to systematize. A targeted sprint could unlock your next growth phase.".to_owned(),
            Category::Opportunity => "There are clear gaps in your operations that, once addressed, could dramatically change your growth trajectory.".to_owned(),
            Category::FoundationNeeded => "The good news: there's massive upside. You need foundational systems for pipeline, data, and automation.".to_owned(),
        })
    }
}
