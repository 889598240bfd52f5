//! Rule-based filter extraction from free-form Spanish text.
//!
//! Every predicate class is extracted independently. Neighborhood, kind and
//! operation come from the configured vocabulary; numeric predicates come from
//! an ordered rule table where the first rule that yields a parseable numeral
//! wins for its predicate.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use inmo_core::config::VocabularyConfig;
use inmo_core::types::FilterSet;

// =============================================================================
// Patterns
// =============================================================================

/// Optional currency marker in front of a numeral.
const CURRENCY: &str = r"(?:u\$s|us\$|usd|u\$d|\$)?\s*";

/// Digits with thousands separators, e.g. `200.000` or `1,500,000`.
const NUMERAL: &str = r"([\d.,]+)";

/// Free words captured after a neighborhood preposition.
const PHRASE: &str = r"([a-záéíóúüñ\s]+)";

/// Predicate a numeric rule assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    MaxPrice,
    MinPrice,
    MinRooms,
    MinArea,
}

impl Target {
    fn is_set(self, filters: &FilterSet) -> bool {
        match self {
            Target::MaxPrice => filters.max_price.is_some(),
            Target::MinPrice => filters.min_price.is_some(),
            Target::MinRooms => filters.min_rooms.is_some(),
            Target::MinArea => filters.min_area.is_some(),
        }
    }

    fn is_price(self) -> bool {
        matches!(self, Target::MaxPrice | Target::MinPrice)
    }

    fn assign(self, filters: &mut FilterSet, value: u64) -> bool {
        match self {
            Target::MaxPrice => filters.max_price = Some(value as f64),
            Target::MinPrice => filters.min_price = Some(value as f64),
            Target::MinRooms => match u32::try_from(value) {
                Ok(rooms) => filters.min_rooms = Some(rooms),
                Err(_) => return false,
            },
            Target::MinArea => filters.min_area = Some(value as f64),
        }
        true
    }
}

struct NumericRule {
    target: Target,
    pattern: Regex,
}

/// Ordered numeric rules. Within a target, earlier rules take precedence.
static NUMERIC_RULES: LazyLock<Vec<NumericRule>> = LazyLock::new(|| {
    let rule = |target: Target, pattern: String| NumericRule {
        target,
        pattern: Regex::new(&pattern).expect("Invalid numeric rule"),
    };

    vec![
        rule(Target::MaxPrice, format!(r"\bhasta\s+{CURRENCY}{NUMERAL}")),
        rule(
            Target::MaxPrice,
            format!(r"\bm[aá]ximo\s+(?:de\s+)?{CURRENCY}{NUMERAL}"),
        ),
        rule(
            Target::MaxPrice,
            format!(r"\bprecio\s+(?:de\s+|m[aá]ximo\s+(?:de\s+)?)?{CURRENCY}{NUMERAL}"),
        ),
        rule(Target::MaxPrice, format!(r"\bmenos\s+de\s+{CURRENCY}{NUMERAL}")),
        rule(
            Target::MaxPrice,
            format!(r"{CURRENCY}{NUMERAL}\s*(?:pesos|d[oó]lares|usd)\b"),
        ),
        rule(Target::MaxPrice, format!(r"\bde\s+{CURRENCY}{NUMERAL}")),
        rule(Target::MaxPrice, format!(r"\bvalor\s+(?:de\s+)?{CURRENCY}{NUMERAL}")),
        rule(
            Target::MinPrice,
            format!(r"\b(?:desde|m[aá]s\s+de)\s+{CURRENCY}{NUMERAL}"),
        ),
        rule(Target::MinRooms, r"(\d+)\s*amb".to_string()),
        rule(Target::MinArea, r"(\d+)\s*(?:m2|m²|mts2?|metros)".to_string()),
    ]
});

/// Prepositional neighborhood patterns, tried after the vocabulary scan.
static NEIGHBORHOOD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(r"\ben\s+{PHRASE}"),
        format!(r"\bbarrio\s+{PHRASE}"),
        format!(r"\bzona\s+{PHRASE}"),
        format!(r"\bde\s+{PHRASE}$"),
        format!(r"\bel\s+de\s+{PHRASE}"),
        format!(r"\bla\s+de\s+{PHRASE}"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid neighborhood pattern"))
    .collect()
});

/// A numeral followed by one of these is a size, not a price.
static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:amb|m2|m²|mts|metros|dorm|ba[ñn]o)").expect("Invalid unit pattern")
});

/// A ceiling match right after one of these words is really a floor.
static FLOOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\bdesde|\bm[aá]s)\s*$").expect("Invalid floor pattern"));

// =============================================================================
// FilterExtractor
// =============================================================================

/// Extracts a [`FilterSet`] from a user message.
#[derive(Debug, Clone, Default)]
pub struct FilterExtractor {
    vocabulary: VocabularyConfig,
}

impl FilterExtractor {
    pub fn new(vocabulary: VocabularyConfig) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &VocabularyConfig {
        &self.vocabulary
    }

    /// Extract every predicate the text carries a confident signal for.
    pub fn extract(&self, text: &str) -> FilterSet {
        let text = text.to_lowercase();

        let mut filters = FilterSet {
            neighborhood: self.extract_neighborhood(&text),
            kind: self.extract_kind(&text),
            operation: self.extract_operation(&text),
            ..FilterSet::default()
        };
        apply_numeric_rules(&text, &mut filters);

        debug!(?filters, "Filters extracted");
        filters
    }

    /// Neighborhood from the vocabulary, then from prepositional phrases.
    pub fn extract_neighborhood(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();

        if let Some(found) = self
            .vocabulary
            .neighborhoods
            .iter()
            .map(|n| n.to_lowercase())
            .find(|n| text.contains(n.as_str()))
        {
            return Some(found);
        }

        NEIGHBORHOOD_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures_iter(&text)
                .filter_map(|caps| caps.get(1))
                .find_map(|phrase| self.match_phrase(phrase.as_str()))
        })
    }

    /// Canonical property kind for the first keyword found.
    pub fn extract_kind(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.vocabulary
            .property_kinds
            .iter()
            .find(|m| text.contains(&m.keyword.to_lowercase()))
            .map(|m| m.canonical.to_lowercase())
    }

    /// Canonical operation for the first keyword found.
    pub fn extract_operation(&self, text: &str) -> Option<String> {
        let text = text.to_lowercase();
        self.vocabulary
            .operations
            .iter()
            .find(|m| text.contains(&m.keyword.to_lowercase()))
            .map(|m| m.canonical.to_lowercase())
    }

    /// Find a known neighborhood inside a captured phrase.
    ///
    /// Sub-phrases are tried from the left, longest first, and compared
    /// without accents. Kind and operation keywords are never neighborhoods.
    fn match_phrase(&self, phrase: &str) -> Option<String> {
        let words: Vec<&str> = phrase.split_whitespace().collect();

        for start in 0..words.len() {
            for end in (start + 1..=words.len()).rev() {
                let candidate = words[start..end].join(" ");
                if self.vocabulary.is_kind_or_operation_keyword(&candidate) {
                    continue;
                }
                let folded = fold_accents(&candidate);
                if let Some(found) = self
                    .vocabulary
                    .neighborhoods
                    .iter()
                    .find(|n| fold_accents(&n.to_lowercase()) == folded)
                {
                    return Some(found.to_lowercase());
                }
            }
        }
        None
    }
}

// =============================================================================
// Numeric rules
// =============================================================================

fn apply_numeric_rules(text: &str, filters: &mut FilterSet) {
    for rule in NUMERIC_RULES.iter() {
        if rule.target.is_set(filters) {
            continue;
        }

        for caps in rule.pattern.captures_iter(text) {
            let (Some(whole), Some(numeral)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            if rule.target.is_price() && UNIT_SUFFIX.is_match(&text[numeral.end()..]) {
                continue;
            }
            if rule.target == Target::MaxPrice && FLOOR_PREFIX.is_match(&text[..whole.start()]) {
                continue;
            }

            match parse_numeral(numeral.as_str()) {
                Some(value) if rule.target.assign(filters, value) => break,
                _ => debug!(numeral = numeral.as_str(), "Numeral skipped"),
            }
        }
    }
}

/// Parse a numeral with `.`/`,` thousands separators.
///
/// Returns `None` when nothing but separators remains or the value overflows.
pub fn parse_numeral(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != '.' && *c != ',').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Lowercase and strip Spanish diacritics for loose comparison.
pub fn fold_accents(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}
