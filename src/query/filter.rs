//! Filter and free-text search composition.
//!
//! Both entry points are pure query builders: they produce [`SqlFragment`]
//! predicates over the `vehicles` table and never execute anything. Field
//! matching is driven by a declarative table so adding a filterable field is
//! one table row, not another branch in a conditional chain.
//!
//! Identifier fields (plate, chassis, registration numbers) match on
//! *normalized* substrings: both the stored value and the filter value are
//! lowercased and stripped of non-alphanumerics, so `"ABC-1234"`,
//! `"abc 1234"`, and `"abc1234"` all find each other. The stored side is the
//! write-time-maintained `*_norm` shadow column.

use uuid::Uuid;

use super::fragment::{SqlFragment, SqlParam};

/// Lowercases and strips non-alphanumeric characters.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// How a filter value is compared against its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Matcher {
    /// Substring match on a normalized shadow column.
    NormalizedContains,
    /// Case-insensitive substring match.
    Contains,
    /// Exact match.
    Exact,
}

/// One row of the filter dispatch table: which column a field targets and how
/// it is matched.
struct FilterField {
    column: &'static str,
    matcher: Matcher,
}

impl FilterField {
    const fn new(column: &'static str, matcher: Matcher) -> Self {
        Self { column, matcher }
    }

    fn text_condition(&self, value: &str) -> Option<SqlFragment> {
        match self.matcher {
            Matcher::NormalizedContains => {
                let normalized = normalize(value);
                if normalized.is_empty() {
                    return None;
                }
                Some(SqlFragment::with_params(
                    format!("{} LIKE ?", self.column),
                    vec![SqlParam::string(format!("%{}%", normalized))],
                ))
            }
            Matcher::Contains => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                Some(SqlFragment::with_params(
                    format!("LOWER({}) LIKE ?", self.column),
                    vec![SqlParam::string(format!("%{}%", trimmed.to_lowercase()))],
                ))
            }
            Matcher::Exact => Some(SqlFragment::with_params(
                format!("{} = ?", self.column),
                vec![SqlParam::string(value)],
            )),
        }
    }
}

const PLATE_NUMBER: FilterField = FilterField::new("plate_norm", Matcher::NormalizedContains);
const CHASSIS_NUMBER: FilterField = FilterField::new("chassis_norm", Matcher::NormalizedContains);
const REGISTRATION_NUMBER: FilterField =
    FilterField::new("registration_norm", Matcher::NormalizedContains);
const DRIVER_NAME: FilterField = FilterField::new("driver_name", Matcher::Contains);
const OFFICE_NAME: FilterField = FilterField::new("office_name", Matcher::Contains);
const VEHICLE_TYPE: FilterField = FilterField::new("vehicle_type", Matcher::Exact);
const ENGINE_TYPE: FilterField = FilterField::new("engine_type", Matcher::Exact);

/// Field filters for browsing vehicles. Absent fields do not constrain the
/// result; present fields AND together.
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    /// Normalized-substring match on the plate number.
    pub plate_number: Option<String>,
    /// Normalized-substring match on the chassis number.
    pub chassis_number: Option<String>,
    /// Normalized-substring match on the registration number.
    pub registration_number: Option<String>,
    /// Substring match on the driver's name.
    pub driver_name: Option<String>,
    /// Substring match on the assigned office's name.
    pub office_name: Option<String>,
    /// Exact match on the assigned office.
    pub office_id: Option<Uuid>,
    /// Exact match on the vehicle category.
    pub vehicle_type: Option<String>,
    /// Exact match on the engine category.
    pub engine_type: Option<String>,
    /// Exact match on the wheel count.
    pub wheels: Option<i64>,
}

impl VehicleFilter {
    /// A filter that matches everything.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builds the combined predicate for every present filter field.
    ///
    /// Empty when no field is set; the caller splices the fragment into its
    /// WHERE clause either way.
    pub fn predicate(&self) -> SqlFragment {
        let text_fields: [(&Option<String>, &FilterField); 7] = [
            (&self.plate_number, &PLATE_NUMBER),
            (&self.chassis_number, &CHASSIS_NUMBER),
            (&self.registration_number, &REGISTRATION_NUMBER),
            (&self.driver_name, &DRIVER_NAME),
            (&self.office_name, &OFFICE_NAME),
            (&self.vehicle_type, &VEHICLE_TYPE),
            (&self.engine_type, &ENGINE_TYPE),
        ];

        let mut combined = SqlFragment::empty();
        for (value, field) in text_fields {
            if let Some(value) = value {
                if let Some(condition) = field.text_condition(value) {
                    combined = combined.and(condition);
                }
            }
        }

        if let Some(office_id) = &self.office_id {
            combined = combined.and(SqlFragment::with_params(
                "office_id = ?",
                vec![SqlParam::string(office_id.to_string())],
            ));
        }
        if let Some(wheels) = self.wheels {
            combined = combined.and(SqlFragment::with_params(
                "wheels = ?",
                vec![SqlParam::integer(wheels)],
            ));
        }

        combined
    }
}

/// Builds the free-text search predicate: the normalized identifier fields,
/// the driver's name, and the assigned office's name, ORed together.
///
/// Returns `None` for a blank term; a blank search matches nothing, not
/// everything, and the caller short-circuits to an empty page.
pub fn search_predicate(term: &str) -> Option<SqlFragment> {
    if term.trim().is_empty() {
        return None;
    }

    let mut combined = SqlFragment::empty();
    for field in [&PLATE_NUMBER, &CHASSIS_NUMBER, &REGISTRATION_NUMBER] {
        if let Some(condition) = field.text_condition(term) {
            combined = combined.or(condition);
        }
    }
    for field in [&DRIVER_NAME, &OFFICE_NAME] {
        if let Some(condition) = field.text_condition(term) {
            combined = combined.or(condition);
        }
    }

    // A term of only punctuation normalizes away entirely; without any
    // condition the fragment would match everything, so treat it as blank.
    if combined.is_empty() {
        return None;
    }

    Some(combined)
}
