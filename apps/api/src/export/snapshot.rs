//! Snapshot assembly: reads every entity family and produces one sanitized,
//! ordered `CvSnapshot`, or `Pending` if any family is not yet available.

use thiserror::Error;
use tracing::debug;

use crate::content::sanitize::sanitize_snapshot;
use crate::content::source::{ContentError, ContentSource, Fetch};
use crate::models::cv::{CvSnapshot, Experience};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("experience at '{company}' ends in {end_year}, before it starts in {start_year}")]
    InvalidPeriod {
        company: String,
        start_year: i32,
        end_year: i32,
    },
}

/// Reads all families concurrently. A snapshot is never built from partial data:
/// a single pending family makes the whole snapshot pending.
pub async fn assemble(source: &dyn ContentSource) -> Result<Fetch<CvSnapshot>, SnapshotError> {
    let (profile, experiences, education, languages, skills, contacts) = tokio::join!(
        source.profile(),
        source.experiences(),
        source.education(),
        source.languages(),
        source.skills(),
        source.contacts(),
    );

    let (
        Fetch::Ready(profile),
        Fetch::Ready(experiences),
        Fetch::Ready(education),
        Fetch::Ready(languages),
        Fetch::Ready(skills),
        Fetch::Ready(contacts),
    ) = (profile?, experiences?, education?, languages?, skills?, contacts?)
    else {
        debug!("Snapshot pending: at least one content family not yet available");
        return Ok(Fetch::Pending);
    };

    validate_periods(&experiences)?;

    Ok(Fetch::Ready(sanitize_snapshot(CvSnapshot {
        profile,
        experiences,
        education,
        languages,
        skills,
        contacts,
    })))
}

fn validate_periods(experiences: &[Experience]) -> Result<(), SnapshotError> {
    match experiences
        .iter()
        .find(|e| e.end_year.is_some_and(|end| end < e.start_year))
    {
        Some(bad) => Err(SnapshotError::InvalidPeriod {
            company: bad.company.clone(),
            start_year: bad.start_year,
            end_year: bad.end_year.unwrap_or(bad.start_year),
        }),
        None => Ok(()),
    }
}
