//! Follow-up detection and resolution against the previous turn's listings.
//!
//! Resolution is deterministic and only ever looks at the listings the caller
//! sent back; the previous bot response is not parsed.

use std::sync::LazyLock;

use regex::Regex;

use inmo_core::config::VocabularyConfig;
use inmo_core::types::Listing;

use crate::extractor::parse_numeral;

/// Words that mark a message as a question about something already shown.
const FOLLOW_UP_WORDS: &[&str] = &[
    "más",
    "mas",
    "detalles",
    "detalle",
    "brindar",
    "brindame",
    "dime",
    "decime",
    "cuéntame",
    "cuentame",
    "contame",
    "información",
    "informacion",
    "características",
    "caracteristicas",
    "este",
    "esta",
    "ese",
    "esa",
    "primero",
    "primera",
    "segundo",
    "segunda",
    "tercero",
    "tercera",
];

const ORDINALS: &[(usize, &[&str])] = &[
    (0, &["primero", "primera", "primer", "1"]),
    (1, &["segundo", "segunda", "2"]),
    (2, &["tercero", "tercera", "tercer", "3"]),
];

/// A numeral with an optional `mil`/`k` multiplier.
static PRICE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d[\d.,]*)\s*(mil\b|k\b)?").expect("Invalid price mention pattern")
});

/// Why a listing was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Price,
    Neighborhood,
    Kind,
    Ordinal(usize),
    First,
}

/// A prior listing picked for a follow-up.
#[derive(Debug, Clone, Copy)]
pub struct FollowUpMatch<'a> {
    pub listing: &'a Listing,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default)]
pub struct FollowUpResolver {
    vocabulary: VocabularyConfig,
}

impl FollowUpResolver {
    pub fn new(vocabulary: VocabularyConfig) -> Self {
        Self { vocabulary }
    }

    /// Whether the text reads like a question about a listing already shown.
    pub fn is_follow_up(&self, text: &str) -> bool {
        words(text).any(|w| FOLLOW_UP_WORDS.contains(&w.as_str()))
    }

    /// Pick the prior listing the text refers to.
    ///
    /// Tried in order: price, neighborhood, kind, ordinal. Falls back to the
    /// first listing. `None` only when there are no prior listings.
    pub fn resolve<'a>(&self, text: &str, prior: &'a [Listing]) -> Option<FollowUpMatch<'a>> {
        let first = prior.first()?;
        let text = text.to_lowercase();

        let found = by_price(&text, prior)
            .map(|l| (l, Resolution::Price))
            .or_else(|| self.by_neighborhood(&text, prior).map(|l| (l, Resolution::Neighborhood)))
            .or_else(|| self.by_kind(&text, prior).map(|l| (l, Resolution::Kind)))
            .or_else(|| by_ordinal(&text, prior).map(|(i, l)| (l, Resolution::Ordinal(i))))
            .unwrap_or((first, Resolution::First));

        Some(FollowUpMatch {
            listing: found.0,
            resolution: found.1,
        })
    }

    fn by_neighborhood<'a>(&self, text: &str, prior: &'a [Listing]) -> Option<&'a Listing> {
        self.vocabulary
            .neighborhoods
            .iter()
            .map(|n| n.to_lowercase())
            .filter(|n| text.contains(n.as_str()))
            .find_map(|n| {
                prior.iter().find(|l| {
                    l.neighborhood.to_lowercase().contains(&n)
                        || l.title.to_lowercase().contains(&n)
                })
            })
    }

    fn by_kind<'a>(&self, text: &str, prior: &'a [Listing]) -> Option<&'a Listing> {
        let canonical = self
            .vocabulary
            .property_kinds
            .iter()
            .find(|m| text.contains(&m.keyword.to_lowercase()))?
            .canonical
            .to_lowercase();
        prior
            .iter()
            .find(|l| l.kind.to_lowercase().contains(&canonical))
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn by_price<'a>(text: &str, prior: &'a [Listing]) -> Option<&'a Listing> {
    PRICE_MENTION
        .captures_iter(text)
        .filter_map(|caps| {
            let value = parse_numeral(caps.get(1)?.as_str())?;
            match caps.get(2) {
                Some(_) => value.checked_mul(1000),
                None => Some(value),
            }
        })
        .find_map(|value| {
            prior
                .iter()
                .find(|l| l.price >= 0.0 && l.price.round() as u64 == value)
        })
}

fn by_ordinal<'a>(text: &str, prior: &'a [Listing]) -> Option<(usize, &'a Listing)> {
    let tokens: Vec<String> = words(text).collect();
    ORDINALS.iter().find_map(|(index, names)| {
        let mentioned = tokens.iter().any(|t| names.contains(&t.as_str()));
        if mentioned {
            prior.get(*index).map(|l| (*index, l))
        } else {
            None
        }
    })
}
