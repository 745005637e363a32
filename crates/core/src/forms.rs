//! Form field classification
//!
//! Job forms arrive as free-form field lists whose labels vary by template
//! ("Tech Notes", "Work Performed", "Customer Concern", ...). Classification
//! is a declarative table of category/keyword pairs consumed by one function,
//! so the heuristic stays data rather than scattered control flow.

/// Output buckets for classified form fields.
///
/// When several fields match the same category their values are joined with
/// newlines in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedFormFields {
    pub technician_notes: Option<String>,
    pub customer_concerns: Option<String>,
    pub recommendations_made: Option<String>,
    pub equipment_condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldCategory {
    TechnicianNotes,
    CustomerConcerns,
    RecommendationsMade,
    EquipmentCondition,
}

struct FieldRule {
    category: FieldCategory,
    keywords: &'static [&'static str],
}

/// Keyword-substring rules, evaluated in order; first match wins per field.
const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        category: FieldCategory::CustomerConcerns,
        keywords: &["concern", "complaint", "issue reported", "reason for call"],
    },
    FieldRule {
        category: FieldCategory::RecommendationsMade,
        keywords: &["recommend", "suggested", "proposal", "quote provided"],
    },
    FieldRule {
        category: FieldCategory::EquipmentCondition,
        keywords: &["equipment", "condition", "system age", "unit model"],
    },
    FieldRule {
        category: FieldCategory::TechnicianNotes,
        keywords: &["tech note", "technician note", "work performed", "work summary", "notes"],
    },
];

/// Classify a form's field list into the four report buckets.
///
/// Matching is case-insensitive substring comparison on the field label.
/// Fields with empty values and fields matching no rule are ignored.
pub fn classify_fields(fields: &[(String, String)]) -> ClassifiedFormFields {
    let mut classified = ClassifiedFormFields::default();

    for (name, value) in fields {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if let Some(category) = classify_label(name) {
            let bucket = match category {
                FieldCategory::TechnicianNotes => &mut classified.technician_notes,
                FieldCategory::CustomerConcerns => &mut classified.customer_concerns,
                FieldCategory::RecommendationsMade => &mut classified.recommendations_made,
                FieldCategory::EquipmentCondition => &mut classified.equipment_condition,
            };
            append_value(bucket, value);
        }
    }

    classified
}

fn classify_label(name: &str) -> Option<FieldCategory> {
    let lowered = name.to_ascii_lowercase();
    FIELD_RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|rule| rule.category)
}

fn append_value(bucket: &mut Option<String>, value: &str) {
    match bucket {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(value);
        }
        None => *bucket = Some(value.to_string()),
    }
}
