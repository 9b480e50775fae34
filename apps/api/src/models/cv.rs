use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public projection of the CV owner's profile (`profile_public`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub profession: Option<String>,
    pub photo_url: Option<String>,
    pub nationality: Option<String>,
    pub nationality_flag: Option<String>,
    pub availability_status: Option<String>,
    pub professional_summary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub company: String,
    pub role: String,
    /// Free text, e.g. "2 years 3 months".
    pub duration: Option<String>,
    /// Free text, e.g. "Mar 2021 - Present". Start month is parsed from here.
    pub period_display: Option<String>,
    pub start_year: i32,
    /// `None` means the position is current.
    pub end_year: Option<i32>,
    pub sort_order: Option<i32>,
}

impl Experience {
    pub fn is_open_ended(&self) -> bool {
        self.end_year.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub institution: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: Uuid,
    pub name: String,
    /// Proficiency label, e.g. "Native" or "B2".
    pub level: String,
    pub proficiency_percent: Option<i32>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl Language {
    /// Proficiency as a percentage in 0..=100. Missing values count as full proficiency.
    pub fn proficiency(&self) -> u8 {
        self.proficiency_percent.map_or(100, |p| p.clamp(0, 100) as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub icon_name: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Phone,
    Location,
    Email,
    Website,
    Whatsapp,
    Linkedin,
}

impl ContactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContactKind::Phone => "Phone",
            ContactKind::Location => "Location",
            ContactKind::Email => "Email",
            ContactKind::Website => "Website",
            ContactKind::Whatsapp => "WhatsApp",
            ContactKind::Linkedin => "LinkedIn",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub value: String,
    pub label: Option<String>,
    #[serde(default)]
    pub icon_name: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Read-only aggregate of all CV content used for one export run or one CV view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CvSnapshot {
    pub profile: Option<Profile>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl CvSnapshot {
    pub fn contact(&self, kind: ContactKind) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.kind == kind)
    }
}
