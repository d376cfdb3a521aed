//! Draft validation
//!
//! Mirrors the `required` attributes the rendered form carries, so a draft
//! that passes here is one the browser would also have accepted. Runs again
//! server-side because the form markup is not a trust boundary.

use crate::{rules, CoreError, RegistrationDraft};

/// Validates a draft against the required-field rules for its selected
/// competition. Returns the first missing field as a user-facing message.
pub fn validate_draft(draft: &RegistrationDraft) -> Result<(), CoreError> {
    let Some(competition) = &draft.competition else {
        return Err(missing("pilih kompetisi terlebih dahulu"));
    };

    if draft.team_name.trim().is_empty() {
        return Err(missing("nama tim wajib diisi"));
    }

    if draft.leader.name.trim().is_empty() || draft.leader.phone.trim().is_empty() {
        return Err(missing("nama dan nomor HP ketua tim wajib diisi"));
    }
    if draft.leader.photo.is_none() || draft.leader.surat.is_none() || draft.leader.pakta.is_none()
    {
        return Err(missing("dokumen ketua tim belum lengkap"));
    }

    for (idx, member) in draft.members.iter().enumerate() {
        if member.name.trim().is_empty() || member.phone.trim().is_empty() {
            return Err(missing(&format!("data anggota {} belum lengkap", idx + 1)));
        }
        if member.photo.is_none() || member.surat.is_none() || member.pakta.is_none() {
            return Err(missing(&format!(
                "dokumen anggota {} belum lengkap",
                idx + 1
            )));
        }
    }

    for (idx, official) in draft.officials.iter().enumerate() {
        if official.name.trim().is_empty() || official.phone.trim().is_empty() {
            return Err(missing(&format!(
                "data pendamping {} belum lengkap",
                idx + 1
            )));
        }
        if official.photo.is_none() {
            return Err(missing(&format!(
                "pas foto pendamping {} belum diunggah",
                idx + 1
            )));
        }
    }

    if rules::school_required(&competition.name)
        && draft.school.as_deref().map_or(true, |s| s.trim().is_empty())
    {
        return Err(missing("asal sekolah wajib diisi untuk kompetisi ini"));
    }

    if draft.email.trim().is_empty() || !draft.email.contains('@') {
        return Err(missing("alamat email tidak valid"));
    }
    if draft.whatsapp.trim().is_empty() {
        return Err(missing("nomor WhatsApp wajib diisi"));
    }

    // A stale form can still post more member blocks than the cap allows.
    let cap = rules::roster_cap(competition);
    if draft.headcount() > cap {
        return Err(missing(&format!(
            "maksimal {cap} orang (termasuk ketua) untuk {}",
            competition.name
        )));
    }

    Ok(())
}

fn missing(message: &str) -> CoreError {
    CoreError::Validation(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attachment, Competition, Official, OfficialRole, TeamMember};

    fn attachment() -> Option<Attachment> {
        Some(Attachment::new("doc.pdf", "application/pdf", vec![0u8; 8]))
    }

    fn filled_draft(competition: &str) -> RegistrationDraft {
        let mut draft = RegistrationDraft {
            competition: Some(Competition::named(competition, 100_000)),
            team_name: "Garuda".into(),
            school: Some("SMA 3".into()),
            email: "kapten@example.com".into(),
            whatsapp: "0812000".into(),
            ..Default::default()
        };
        draft.leader.name = "Sinta".into();
        draft.leader.phone = "0812111".into();
        draft.leader.photo = attachment();
        draft.leader.surat = attachment();
        draft.leader.pakta = attachment();
        draft
    }

    #[test]
    fn test_complete_draft_passes() {
        assert!(validate_draft(&filled_draft("Basket Putra")).is_ok());
    }

    #[test]
    fn test_school_required_outside_exemption_set() {
        let mut draft = filled_draft("Basket Putra");
        draft.school = None;
        assert!(validate_draft(&draft).is_err());

        draft.school = Some("   ".into());
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn test_school_optional_for_exempt_competitions() {
        for name in ["Modern Dance", "Band", "English Debate"] {
            let mut draft = filled_draft(name);
            draft.school = None;
            assert!(validate_draft(&draft).is_ok(), "{name} should be exempt");
        }
    }

    #[test]
    fn test_member_documents_are_required() {
        let mut draft = filled_draft("Band");
        draft.members.push(TeamMember {
            name: "Joko".into(),
            phone: "0812222".into(),
            photo: attachment(),
            surat: None,
            pakta: attachment(),
        });
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn test_official_photo_required_once_added() {
        let mut draft = filled_draft("Band");
        let mut official = Official::blank(OfficialRole::Coach);
        official.name = "Pak Budi".into();
        official.phone = "0813".into();
        draft.officials.push(official);
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn test_no_competition_selected_fails() {
        let mut draft = filled_draft("Band");
        draft.competition = None;
        assert!(validate_draft(&draft).is_err());
    }
}
