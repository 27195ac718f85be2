//! Rule-based field classification.
//!
//! Two ordered rule tables, each evaluated top to bottom with the first
//! matching predicate winning:
//!
//! * [`LAYOUT_RULES`]: the main cascade used by `detect`/`detect_flat`.
//!   Distinguishes titles, labels and table cells so the schema builder can
//!   group and drop them.
//! * [`INFERENCE_RULES`]: the smaller set used by hybrid detection when a
//!   document has no embedded form. Every line is assumed to be a field
//!   prompt; the default is `text_field`.
//!
//! Both tables are public data so precedence can be inspected and tested
//! independently of the control flow that walks them.

use crate::field::FieldType;
use crate::geometry::Polygon;
use once_cell::sync::Lazy;
use regex::Regex;

/// Lower-cased, trimmed text plus the raw form some rules need.
#[derive(Debug, Clone)]
pub struct ClassifierInput<'a> {
    pub raw: &'a str,
    pub lower: String,
    /// Character (not byte) count of the raw text.
    pub len: usize,
}

impl<'a> ClassifierInput<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.trim().to_lowercase(),
            len: raw.chars().count(),
        }
    }
}

/// One row of a rule table.
pub struct ClassifierRule {
    pub name: &'static str,
    pub predicate: fn(&ClassifierInput<'_>) -> bool,
    pub result: FieldType,
}

// ── Layout cascade ───────────────────────────────────────────────────────

static RE_CHECKBOX_GLYPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\[\]☐☑✓✗xX]\s*").unwrap());
static RE_CHECKBOX_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(new|additional|damaged|lost|yes|no|male|female|mr|ms|mrs)$").unwrap()
});
static RE_RADIO_GLYPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[○●]\s*").unwrap());

const TABLE_HEADER_KEYWORDS: &[&str] = &["no.", "date", "name", "nric", "contact", "address"];
const PERSONAL_DATA_KEYWORDS: &[&str] = &[
    "name",
    "nric",
    "contact",
    "address",
    "email",
    "phone",
    "date of birth",
    "occupation",
];
const HEADING_KEYWORDS: &[&str] = &["application", "form", "details", "information", "section"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|k| haystack.contains(k))
}

/// At least one cased character and no lower-case ones.
fn is_all_caps(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

fn looks_like_checkbox(input: &ClassifierInput<'_>) -> bool {
    RE_CHECKBOX_GLYPH.is_match(&input.lower)
        || RE_CHECKBOX_ANSWER.is_match(&input.lower)
        || RE_RADIO_GLYPH.is_match(&input.lower)
}

fn looks_like_table_cell(input: &ClassifierInput<'_>) -> bool {
    input.len < 50 && contains_any(&input.lower, TABLE_HEADER_KEYWORDS)
}

fn looks_like_text_prompt(input: &ClassifierInput<'_>) -> bool {
    input.raw.ends_with(':') || contains_any(&input.lower, PERSONAL_DATA_KEYWORDS)
}

fn looks_like_title(input: &ClassifierInput<'_>) -> bool {
    input.len < 60 && (is_all_caps(input.raw) || contains_any(&input.lower, HEADING_KEYWORDS))
}

fn is_short(input: &ClassifierInput<'_>) -> bool {
    input.len < 30
}

/// Main cascade. Anything unmatched is [`FieldType::NonFillable`].
pub static LAYOUT_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        name: "checkbox glyph or enumerated answer",
        predicate: looks_like_checkbox,
        result: FieldType::Checkbox,
    },
    ClassifierRule {
        name: "short tabular header",
        predicate: looks_like_table_cell,
        result: FieldType::TableCell,
    },
    ClassifierRule {
        name: "colon or personal-data prompt",
        predicate: looks_like_text_prompt,
        result: FieldType::TextField,
    },
    ClassifierRule {
        name: "upper-case or heading keyword",
        predicate: looks_like_title,
        result: FieldType::Title,
    },
    ClassifierRule {
        name: "short text",
        predicate: is_short,
        result: FieldType::Label,
    },
];

// ── Inference rules ──────────────────────────────────────────────────────

static RE_INFER_GLYPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[\[\]☐☑✓✗○●]").unwrap());
static RE_SHORT_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(yes|no|n/a|male|female|other|mr|mrs|ms|dr)\.?$").unwrap()
});
static RE_DATE_PROMPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(date|dob|d\.o\.b|dd\s*/\s*mm|mm\s*/\s*dd|yyyy|expiry)\b").unwrap()
});

const SIGNATURE_KEYWORDS: &[&str] = &["signature", "sign here"];
const INFER_PERSONAL_KEYWORDS: &[&str] = &[
    "name",
    "nric",
    "passport",
    "contact",
    "address",
    "email",
    "phone",
    "mobile",
    "occupation",
    "postal",
];

fn infer_checkbox(input: &ClassifierInput<'_>) -> bool {
    RE_INFER_GLYPH.is_match(&input.lower) || RE_SHORT_ANSWER.is_match(&input.lower)
}

fn infer_signature(input: &ClassifierInput<'_>) -> bool {
    contains_any(&input.lower, SIGNATURE_KEYWORDS)
}

fn infer_date(input: &ClassifierInput<'_>) -> bool {
    RE_DATE_PROMPT.is_match(&input.lower)
}

fn infer_text_prompt(input: &ClassifierInput<'_>) -> bool {
    input.lower.ends_with(':') || contains_any(&input.lower, INFER_PERSONAL_KEYWORDS)
}

/// Layout-free rules for hybrid detection. Anything unmatched is
/// [`FieldType::TextField`].
pub static INFERENCE_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        name: "checkbox glyph or short answer",
        predicate: infer_checkbox,
        result: FieldType::Checkbox,
    },
    ClassifierRule {
        name: "signature prompt",
        predicate: infer_signature,
        result: FieldType::Signature,
    },
    ClassifierRule {
        name: "date prompt",
        predicate: infer_date,
        result: FieldType::DateField,
    },
    ClassifierRule {
        name: "colon or personal-data prompt",
        predicate: infer_text_prompt,
        result: FieldType::TextField,
    },
];

/// Walk `rules` and return the first match, or `fallback`.
pub fn apply_rules(rules: &[ClassifierRule], text: &str, fallback: FieldType) -> FieldType {
    let input = ClassifierInput::new(text);
    rules
        .iter()
        .find(|rule| (rule.predicate)(&input))
        .map(|rule| rule.result)
        .unwrap_or(fallback)
}

/// Classify a recognised line with the layout cascade.
///
/// The polygon is accepted for interface stability; no current rule reads it.
pub fn classify(text: &str, _polygon: &Polygon) -> FieldType {
    apply_rules(LAYOUT_RULES, text, FieldType::NonFillable)
}

/// Classify a recognised line with the inference rules.
pub fn infer(text: &str) -> FieldType {
    apply_rules(INFERENCE_RULES, text, FieldType::TextField)
}
