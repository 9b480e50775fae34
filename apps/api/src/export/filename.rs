//! Download file name derived from the profile's full name.

use crate::content::sanitize::strip_diacritics;

const FALLBACK: &str = "Curriculum_Vitae";

/// `CV_<Name>.pdf`, ASCII letters, digits and underscores only.
pub fn export_filename(full_name: Option<&str>) -> String {
    let name = full_name.map(slug).filter(|s| !s.is_empty());
    format!("CV_{}.pdf", name.as_deref().unwrap_or(FALLBACK))
}

fn slug(name: &str) -> String {
    let kept: String = strip_diacritics(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}
