use crate::results::ResultSet;

/// Cheap pre-check run before any model is touched.
///
/// `None` means no field restriction and always passes. Otherwise at least
/// one hit must carry at least one of the named fields as a top-level key;
/// values are not inspected.
pub fn is_applicable(results: &ResultSet, searchable_fields: Option<&[String]>) -> bool {
    match searchable_fields {
        None => true,
        Some(fields) => results
            .hits()
            .iter()
            .any(|hit| fields.iter().any(|field| hit.contains_field(field))),
    }
}
