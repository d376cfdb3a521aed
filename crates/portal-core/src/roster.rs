//! Team composition bookkeeping
//!
//! The roster is the leader, the member list, and the officials list for the
//! currently selected competition. Index arguments on update/remove come
//! from server-rendered markup, so an out-of-bounds index is a programming
//! error and panics rather than surfacing to the user.

use crate::{
    rules, Competition, CoreError, Official, OfficialField, OfficialRole, PersonField, TeamLeader,
    TeamMember,
};

#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub leader: TeamLeader,
    pub members: Vec<TeamMember>,
    pub officials: Vec<Official>,
}

impl Roster {
    /// Leader plus members.
    pub fn headcount(&self) -> usize {
        self.members.len() + 1
    }

    /// Appends a blank member card, unless the team is already at the cap
    /// for the selected competition.
    pub fn add_member(&mut self, competition: &Competition) -> Result<(), CoreError> {
        let cap = rules::roster_cap(competition);
        if self.members.len() >= cap.saturating_sub(1) {
            return Err(CoreError::TeamFull {
                cap,
                competition: competition.name.clone(),
            });
        }
        self.members.push(TeamMember::default());
        Ok(())
    }

    pub fn update_leader(&mut self, field: PersonField) {
        let leader = &mut self.leader;
        if let Some((slot, value)) = apply_person_field(&mut leader.name, &mut leader.phone, field)
        {
            match slot {
                AttachmentSlot::Photo => leader.photo = Some(value),
                AttachmentSlot::Surat => leader.surat = Some(value),
                AttachmentSlot::Pakta => leader.pakta = Some(value),
            }
        }
    }

    pub fn update_member(&mut self, index: usize, field: PersonField) {
        let member = &mut self.members[index];
        if let Some((slot, value)) = apply_person_field(&mut member.name, &mut member.phone, field)
        {
            match slot {
                AttachmentSlot::Photo => member.photo = Some(value),
                AttachmentSlot::Surat => member.surat = Some(value),
                AttachmentSlot::Pakta => member.pakta = Some(value),
            }
        }
    }

    pub fn remove_member(&mut self, index: usize) {
        self.members.remove(index);
    }

    pub fn add_official(&mut self, role: OfficialRole) {
        self.officials.push(Official::blank(role));
    }

    pub fn update_official(&mut self, index: usize, field: OfficialField) {
        let official = &mut self.officials[index];
        match field {
            OfficialField::Name(name) => official.name = name,
            OfficialField::Phone(phone) => official.phone = phone,
            OfficialField::Photo(photo) => official.photo = Some(photo),
        }
    }

    pub fn remove_official(&mut self, index: usize) {
        self.officials.remove(index);
    }

    /// Drops everything back to the empty initial state. Used when the
    /// selected competition changes: caps and the school exemption differ,
    /// so prior entries no longer apply.
    pub fn clear(&mut self) {
        self.leader = TeamLeader::default();
        self.members.clear();
        self.officials.clear();
    }
}

enum AttachmentSlot {
    Photo,
    Surat,
    Pakta,
}

fn apply_person_field(
    name: &mut String,
    phone: &mut String,
    field: PersonField,
) -> Option<(AttachmentSlot, crate::Attachment)> {
    match field {
        PersonField::Name(value) => {
            *name = value;
            None
        }
        PersonField::Phone(value) => {
            *phone = value;
            None
        }
        PersonField::Photo(value) => Some((AttachmentSlot::Photo, value)),
        PersonField::Surat(value) => Some((AttachmentSlot::Surat, value)),
        PersonField::Pakta(value) => Some((AttachmentSlot::Pakta, value)),
    }
}
