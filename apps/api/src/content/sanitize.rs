//! Content sanitizer: turns raw store records into display-ready CV content.
//!
//! Records edited by hand in the admin panel or imported from spreadsheets carry
//! artifacts: doubled quotes, literal `\n` escapes, trailing commas, shouting
//! company names. Everything here is a pure function of its input.
//!
//! Experiences are also re-ordered reverse-chronologically:
//! start year desc → start month (parsed from the display period) desc →
//! open-ended before dated → manual sort hint asc.

use std::cmp::Reverse;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::cv::{Contact, CvSnapshot, Education, Experience, Language, Profile, Skill};

// ────────────────────────────────────────────────────────────────────────────
// Text
// ────────────────────────────────────────────────────────────────────────────

/// Cleans a free-text value.
///
/// - `""` becomes `"`
/// - literal `\r\n`, `\n`, `\r` escape sequences become spaces
/// - whitespace runs collapse to one space, ends are trimmed
/// - one trailing comma is dropped
/// - a quote wrapping the whole value, or an unpaired quote at either end, is dropped
pub fn sanitize_text(text: &str) -> String {
    let text = text
        .replace("\"\"", "\"")
        .replace("\\r\\n", " ")
        .replace("\\n", " ")
        .replace("\\r", " ");
    let text = collapse_whitespace(&text);
    let text = text.strip_suffix(',').unwrap_or(&text).trim_end();
    strip_stray_quotes(text).trim().to_string()
}

/// `sanitize_text` for optional columns. Values that clean up to nothing become `None`.
pub fn sanitize_opt(text: Option<&str>) -> Option<String> {
    text.map(sanitize_text).filter(|s| !s.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_stray_quotes(text: &str) -> &str {
    let quotes = text.matches('"').count();
    if quotes == 2 && text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return &text[1..text.len() - 1];
    }
    if quotes % 2 == 1 {
        if let Some(rest) = text.strip_prefix('"') {
            return rest;
        }
        if let Some(rest) = text.strip_suffix('"') {
            return rest;
        }
    }
    text
}

/// Removes diacritics by decomposing (NFD) and dropping combining marks.
pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Company names
// ────────────────────────────────────────────────────────────────────────────

fn legal_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i),\s*(s\.[la])\.?\s*").expect("valid regex"))
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid regex"))
}

/// Formats a company name for print.
///
/// `Hotel "BENIDORM PLAZA"` → `Hotel "Benidorm Plaza"`
/// `Deutsches Haus,S.L"casa Alemana"` → `Deutsches Haus, S.L. "Casa Alemana"`
pub fn format_company_name(company: &str) -> String {
    let cleaned = sanitize_text(company);
    let punctuated = legal_suffix_re().replace_all(&cleaned, |caps: &Captures| {
        format!(", {}. ", caps[1].to_uppercase())
    });
    let cased = quoted_re().replace_all(&punctuated, |caps: &Captures| {
        format!("\"{}\"", title_case(&caps[1]))
    });
    collapse_whitespace(&cased)
}

fn title_case(text: &str) -> String {
    text.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Chronological ordering
// ────────────────────────────────────────────────────────────────────────────

#[rustfmt::skip]
const MONTH_NAMES: &[(&str, u32)] = &[
    ("january", 1), ("jan", 1), ("enero", 1), ("ene", 1),
    ("february", 2), ("feb", 2), ("febrero", 2),
    ("march", 3), ("mar", 3), ("marzo", 3),
    ("april", 4), ("apr", 4), ("abril", 4), ("abr", 4),
    ("may", 5), ("mayo", 5),
    ("june", 6), ("jun", 6), ("junio", 6),
    ("july", 7), ("jul", 7), ("julio", 7),
    ("august", 8), ("aug", 8), ("agosto", 8), ("ago", 8),
    ("september", 9), ("sept", 9), ("sep", 9), ("septiembre", 9), ("setiembre", 9), ("set", 9),
    ("october", 10), ("oct", 10), ("octubre", 10),
    ("november", 11), ("nov", 11), ("noviembre", 11),
    ("december", 12), ("dec", 12), ("diciembre", 12), ("dic", 12),
];

fn period_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{1,2}[/.-]\d{4}\b|\p{L}+").expect("valid regex"))
}

/// Extracts the start month (1..=12) from a display period such as
/// "Mar 2021 - Present", "Septiembre 2019 – Junio 2020" or "03/2021 - 06/2022".
/// The first month-like token wins.
pub fn parse_start_month(period: &str) -> Option<u32> {
    let folded = strip_diacritics(period).to_lowercase();
    period_token_re().find_iter(&folded).find_map(|m| {
        let token = m.as_str();
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            let month: u32 = token.split(&['/', '.', '-'][..]).next()?.parse().ok()?;
            (1..=12).contains(&month).then_some(month)
        } else {
            MONTH_NAMES
                .iter()
                .find(|(name, _)| *name == token)
                .map(|(_, month)| *month)
        }
    })
}

/// Sorts experiences most-recent first. The sort is stable: fully tied records keep
/// their incoming order.
pub fn sort_experiences_chronologically(experiences: &mut [Experience]) {
    experiences.sort_by_cached_key(|exp| {
        (
            Reverse(exp.start_year),
            Reverse(exp.period_display.as_deref().and_then(parse_start_month)),
            Reverse(exp.is_open_ended()),
            exp.sort_order.unwrap_or(0),
        )
    });
}

// ────────────────────────────────────────────────────────────────────────────
// Per-family sanitizers
// ────────────────────────────────────────────────────────────────────────────

pub fn sanitize_profile(profile: Option<Profile>) -> Option<Profile> {
    profile.map(|p| Profile {
        full_name: sanitize_text(&p.full_name),
        profession: sanitize_opt(p.profession.as_deref()),
        nationality: sanitize_opt(p.nationality.as_deref()),
        availability_status: sanitize_opt(p.availability_status.as_deref()),
        professional_summary: sanitize_opt(p.professional_summary.as_deref()),
        location: sanitize_opt(p.location.as_deref()),
        photo_url: p.photo_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        ..p
    })
}

/// Cleans every record, then orders them. Month parsing reads the cleaned period,
/// so escapes left in the raw text cannot hide the start month.
pub fn sanitize_experiences(experiences: Vec<Experience>) -> Vec<Experience> {
    let mut experiences: Vec<Experience> = experiences
        .into_iter()
        .map(|exp| Experience {
            company: format_company_name(&exp.company),
            role: sanitize_text(&exp.role),
            period_display: sanitize_opt(exp.period_display.as_deref()),
            duration: sanitize_opt(exp.duration.as_deref()),
            ..exp
        })
        .collect();
    sort_experiences_chronologically(&mut experiences);
    experiences
}

pub fn sanitize_education(education: Vec<Education>) -> Vec<Education> {
    education
        .into_iter()
        .map(|edu| Education {
            title: sanitize_text(&edu.title),
            description: sanitize_opt(edu.description.as_deref()),
            institution: sanitize_opt(edu.institution.as_deref()),
            ..edu
        })
        .collect()
}

pub fn sanitize_languages(languages: Vec<Language>) -> Vec<Language> {
    languages
        .into_iter()
        .map(|lang| Language {
            name: sanitize_text(&lang.name),
            level: sanitize_text(&lang.level),
            ..lang
        })
        .collect()
}

pub fn sanitize_skills(skills: Vec<Skill>) -> Vec<Skill> {
    skills
        .into_iter()
        .map(|skill| Skill {
            title: sanitize_text(&skill.title),
            description: sanitize_opt(skill.description.as_deref()),
            ..skill
        })
        .collect()
}

/// Cleans contact values and orders them by their sort hint (missing hints first).
pub fn sanitize_contacts(mut contacts: Vec<Contact>) -> Vec<Contact> {
    contacts.sort_by_key(|c| c.sort_order.unwrap_or(0));
    contacts
        .into_iter()
        .map(|contact| Contact {
            value: sanitize_text(&contact.value),
            label: sanitize_opt(contact.label.as_deref()),
            ..contact
        })
        .collect()
}

/// Applies every family sanitizer. The result is what both the CV view and the
/// PDF export render.
pub fn sanitize_snapshot(snapshot: CvSnapshot) -> CvSnapshot {
    CvSnapshot {
        profile: sanitize_profile(snapshot.profile),
        experiences: sanitize_experiences(snapshot.experiences),
        education: sanitize_education(snapshot.education),
        languages: sanitize_languages(snapshot.languages),
        skills: sanitize_skills(snapshot.skills),
        contacts: sanitize_contacts(snapshot.contacts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn experience(
        company: &str,
        start_year: i32,
        end_year: Option<i32>,
        period: Option<&str>,
        sort_order: Option<i32>,
    ) -> Experience {
        Experience {
            id: Uuid::new_v4(),
            company: company.to_string(),
            role: "Receptionist".to_string(),
            duration: None,
            period_display: period.map(str::to_string),
            start_year,
            end_year,
            sort_order,
        }
    }

    fn companies(experiences: &[Experience]) -> Vec<&str> {
        experiences.iter().map(|e| e.company.as_str()).collect()
    }

    // ── sanitize_text ────────────────────────────────────────────────────────

    #[test]
    fn test_sanitize_text_collapses_doubled_quotes() {
        assert_eq!(sanitize_text(r#"Hotel ""Sol"""#), r#"Hotel "Sol""#);
    }

    #[test]
    fn test_sanitize_text_replaces_literal_escapes() {
        assert_eq!(
            sanitize_text(r"Front desk\nNight shift\r\nWeekends"),
            "Front desk Night shift Weekends"
        );
    }

    #[test]
    fn test_sanitize_text_drops_trailing_comma_and_whitespace() {
        assert_eq!(sanitize_text("  Guest   relations ,  "), "Guest relations");
    }

    #[test]
    fn test_sanitize_text_unwraps_fully_quoted_value() {
        assert_eq!(sanitize_text(r#""Barcelona""#), "Barcelona");
    }

    #[test]
    fn test_sanitize_text_drops_orphan_quote() {
        assert_eq!(sanitize_text(r#"Madrid""#), "Madrid");
        assert_eq!(sanitize_text(r#""Madrid"#), "Madrid");
    }

    #[test]
    fn test_sanitize_text_keeps_balanced_inner_quotes() {
        assert_eq!(sanitize_text(r#"Hotel "PLAZA""#), r#"Hotel "PLAZA""#);
    }

    #[test]
    fn test_sanitize_opt_empty_becomes_none() {
        assert_eq!(sanitize_opt(Some("  ,")), None);
        assert_eq!(sanitize_opt(None), None);
    }

    // ── format_company_name ──────────────────────────────────────────────────

    #[test]
    fn test_company_quoted_segment_is_title_cased() {
        assert_eq!(
            format_company_name(r#"Hotel "BENIDORM PLAZA""#),
            r#"Hotel "Benidorm Plaza""#
        );
    }

    #[test]
    fn test_company_legal_suffix_is_punctuated() {
        assert_eq!(
            format_company_name(r#"Deutsches Haus,S.L"casa Alemana""#),
            r#"Deutsches Haus, S.L. "Casa Alemana""#
        );
        assert_eq!(format_company_name("Grupo Costa,s.a"), "Grupo Costa, S.A.");
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("José Ñúñez"), "Jose Nunez");
    }

    // ── parse_start_month ────────────────────────────────────────────────────

    #[test]
    fn test_parse_start_month_english_and_spanish() {
        assert_eq!(parse_start_month("Mar 2021 - Present"), Some(3));
        assert_eq!(parse_start_month("Septiembre 2019 – Junio 2020"), Some(9));
        assert_eq!(parse_start_month("Diciembre 2018 a Enero 2019"), Some(12));
    }

    #[test]
    fn test_parse_start_month_numeric() {
        assert_eq!(parse_start_month("03/2021 - 06/2022"), Some(3));
        assert_eq!(parse_start_month("13/2021"), None);
    }

    #[test]
    fn test_parse_start_month_none_when_absent() {
        assert_eq!(parse_start_month("2019 - 2020"), None);
        assert_eq!(parse_start_month("2012-2015"), None);
        assert_eq!(parse_start_month(""), None);
    }

    // ── ordering ─────────────────────────────────────────────────────────────

    #[test]
    fn test_sort_by_start_year_desc() {
        let mut exps = vec![
            experience("A", 2018, Some(2019), None, None),
            experience("B", 2022, Some(2023), None, None),
            experience("C", 2020, Some(2021), None, None),
        ];
        sort_experiences_chronologically(&mut exps);
        assert_eq!(companies(&exps), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_sort_same_year_by_parsed_month_desc() {
        let mut exps = vec![
            experience("Feb", 2021, Some(2021), Some("Feb 2021 - Apr 2021"), None),
            experience("None", 2021, Some(2021), Some("2021"), None),
            experience("Oct", 2021, Some(2022), Some("Octubre 2021 - Enero 2022"), None),
        ];
        sort_experiences_chronologically(&mut exps);
        assert_eq!(companies(&exps), vec!["Oct", "Feb", "None"]);
    }

    #[test]
    fn test_sort_open_ended_before_dated() {
        let mut exps = vec![
            experience("Dated", 2020, Some(2022), Some("May 2020"), None),
            experience("Current", 2020, None, Some("May 2020"), None),
        ];
        sort_experiences_chronologically(&mut exps);
        assert_eq!(companies(&exps), vec!["Current", "Dated"]);
    }

    #[test]
    fn test_sort_remaining_ties_by_sort_hint_asc() {
        let mut exps = vec![
            experience("Third", 2020, Some(2021), None, Some(3)),
            experience("First", 2020, Some(2022), None, Some(1)),
            experience("Unset", 2020, Some(2023), None, None),
        ];
        sort_experiences_chronologically(&mut exps);
        assert_eq!(companies(&exps), vec!["Unset", "First", "Third"]);
    }

    #[test]
    fn test_sanitize_experiences_orders_then_formats() {
        let exps = vec![
            experience(r#"Hotel "FIESTA""#, 2021, Some(2022), None, None),
            experience(r#"Hotel "PLAZA""#, 2023, None, None, None),
        ];
        let out = sanitize_experiences(exps);
        assert_eq!(
            companies(&out),
            vec![r#"Hotel "Plaza""#, r#"Hotel "Fiesta""#]
        );
    }

    #[test]
    fn test_sanitize_experiences_orders_by_cleaned_period() {
        let exps = vec![
            experience("Feb", 2021, Some(2021), Some("Feb 2021"), None),
            experience("Oct", 2021, Some(2022), Some(r"\nOct 2021"), None),
        ];
        let out = sanitize_experiences(exps);
        assert_eq!(companies(&out), vec!["Oct", "Feb"]);
        assert_eq!(out[0].period_display.as_deref(), Some("Oct 2021"));
    }

    #[test]
    fn test_sanitize_contacts_orders_by_hint() {
        use crate::models::cv::ContactKind;
        let contact = |kind, value: &str, order| Contact {
            id: Uuid::new_v4(),
            kind,
            value: value.to_string(),
            label: Some(String::new()),
            icon_name: None,
            sort_order: order,
        };
        let out = sanitize_contacts(vec![
            contact(ContactKind::Email, "a@b.es ", Some(2)),
            contact(ContactKind::Phone, "+34 600", Some(1)),
        ]);
        assert_eq!(out[0].kind, ContactKind::Phone);
        assert_eq!(out[1].value, "a@b.es");
        assert_eq!(out[1].label, None);
    }
}
