//! Shared types between the portal server and the remote event backend

use serde::{Deserialize, Serialize};

/// A competition as served by the remote catalog, normalized at the
/// collaborator boundary. Immutable once fetched; replaced wholesale on
/// refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    /// Backend identifier. The backend occasionally omits it; submissions
    /// fall back to 1, matching the backend's oldest seeded row.
    pub id: Option<i64>,
    pub name: String,
    /// Base fee in whole rupiah.
    pub fee: u64,
    /// Roster cap advertised by the catalog. When absent the fixed rule
    /// table in [`crate::rules`] applies.
    pub max_team_size: Option<usize>,
}

impl Competition {
    pub fn named(name: impl Into<String>, fee: u64) -> Self {
        Self {
            id: None,
            name: name.into(),
            fee,
            max_team_size: None,
        }
    }
}

/// An uploaded document held in memory until the draft is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The team leader. All five fields are mandatory once a competition is
/// selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamLeader {
    pub name: String,
    pub phone: String,
    pub photo: Option<Attachment>,
    pub surat: Option<Attachment>,
    pub pakta: Option<Attachment>,
}

/// A team member beyond the leader. Insertion order is display order only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamMember {
    pub name: String,
    pub phone: String,
    pub photo: Option<Attachment>,
    pub surat: Option<Attachment>,
    pub pakta: Option<Attachment>,
}

/// Accompanying adult roles offered on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfficialRole {
    Coach,
    GuruPendamping,
    Official,
}

impl OfficialRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coach => "coach",
            Self::GuruPendamping => "guru_pendamping",
            Self::Official => "official",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Coach => "Coach",
            Self::GuruPendamping => "Guru Pendamping",
            Self::Official => "Official",
        }
    }
}

impl std::str::FromStr for OfficialRole {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coach" => Ok(Self::Coach),
            "guru_pendamping" => Ok(Self::GuruPendamping),
            "official" => Ok(Self::Official),
            other => Err(crate::CoreError::Validation(format!(
                "unknown official role: {other}"
            ))),
        }
    }
}

/// An optional accompanying adult. The list is unordered and unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Official {
    pub role: OfficialRole,
    pub name: String,
    pub phone: String,
    pub photo: Option<Attachment>,
}

impl Official {
    pub fn blank(role: OfficialRole) -> Self {
        Self {
            role,
            name: String::new(),
            phone: String::new(),
            photo: None,
        }
    }
}

/// Editable field of a leader or member card. Keyed updates go through this
/// enum instead of reflective field access.
#[derive(Debug, Clone)]
pub enum PersonField {
    Name(String),
    Phone(String),
    Photo(Attachment),
    Surat(Attachment),
    Pakta(Attachment),
}

/// Editable field of an official card.
#[derive(Debug, Clone)]
pub enum OfficialField {
    Name(String),
    Phone(String),
    Photo(Attachment),
}

/// The full in-progress registration. Exists only in transient session
/// state; submitted in full or not at all.
#[derive(Debug, Clone, Default)]
pub struct RegistrationDraft {
    pub competition: Option<Competition>,
    pub team_name: String,
    pub leader: TeamLeader,
    pub members: Vec<TeamMember>,
    pub officials: Vec<Official>,
    pub school: Option<String>,
    pub email: String,
    pub whatsapp: String,
    pub total_fee: u64,
}

impl RegistrationDraft {
    /// Leader plus members.
    pub fn headcount(&self) -> usize {
        self.members.len() + 1
    }
}
