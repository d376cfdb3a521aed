//! Competition-specific rule table: fees, roster caps, school exemption
//!
//! Ported from the fee and cap logic the organizers publish in the event
//! guidebook. All functions here are pure and keyed on the competition's
//! display name, which is the stable identifier across catalog refetches.

use crate::Competition;

/// Competitions priced per head past the included five.
pub const SHORT_MOVIE: &str = "Short Movie";
/// Headcount covered by the Short Movie base fee, leader included.
pub const SHORT_MOVIE_INCLUDED: usize = 5;
/// Surcharge per extra person, in whole rupiah.
pub const SHORT_MOVIE_EXTRA_FEE: u64 = 20_000;

/// Roster cap when a competition is not in the fixed table and the catalog
/// does not advertise one.
pub const DEFAULT_ROSTER_CAP: usize = 100;

/// Total fee for the draft: flat base fee per team, except Short Movie
/// which charges per head past the included five.
///
/// An unselected or unknown competition costs nothing.
pub fn total_fee(competition: Option<&Competition>, member_count: usize) -> u64 {
    let Some(competition) = competition else {
        return 0;
    };

    let base = competition.fee;
    if competition.name != SHORT_MOVIE {
        return base;
    }

    let headcount = member_count + 1;
    if headcount <= SHORT_MOVIE_INCLUDED {
        base
    } else {
        base + (headcount - SHORT_MOVIE_INCLUDED) as u64 * SHORT_MOVIE_EXTRA_FEE
    }
}

/// Maximum team size including the leader.
///
/// The catalog may advertise its own cap; otherwise the fixed table from the
/// guidebook applies, and unlisted competitions default to 100.
pub fn roster_cap(competition: &Competition) -> usize {
    if let Some(cap) = competition.max_team_size {
        return cap;
    }

    match competition.name.as_str() {
        "Basket Putra" | "Basket Putri" => 12,
        "Voli Putra" | "Voli Putri" => 12,
        "Futsal Putra SMP" | "Futsal Putra SMA" => 12,
        "E-sport MLBB SMP" | "E-sport MLBB SMA" => 7,
        "Modern Dance" => 10,
        "KIR" => 3,
        "Band" => 7,
        "English Debate" => 3,
        _ => DEFAULT_ROSTER_CAP,
    }
}

/// Whether the school field must be filled for this competition.
///
/// A fixed exemption set registers without a school affiliation.
pub fn school_required(competition_name: &str) -> bool {
    !matches!(competition_name, "Modern Dance" | "Band" | "English Debate")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str, fee: u64) -> Competition {
        Competition::named(name, fee)
    }

    #[test]
    fn test_no_selection_costs_nothing() {
        assert_eq!(total_fee(None, 0), 0);
        assert_eq!(total_fee(None, 11), 0);
    }

    #[test]
    fn test_flat_fee_ignores_member_count() {
        let basket = comp("Basket Putra", 250_000);
        assert_eq!(total_fee(Some(&basket), 0), 250_000);
        assert_eq!(total_fee(Some(&basket), 11), 250_000);
    }

    #[test]
    fn test_short_movie_within_included_headcount() {
        let movie = comp("Short Movie", 150_000);
        // 4 members + leader = 5 people, still covered by the base fee
        assert_eq!(total_fee(Some(&movie), 4), 150_000);
    }

    #[test]
    fn test_short_movie_charges_per_extra_head() {
        let movie = comp("Short Movie", 150_000);
        // 7 members + leader = 8 people, 3 past the included 5
        assert_eq!(total_fee(Some(&movie), 7), 150_000 + 3 * 20_000);
    }

    #[test]
    fn test_roster_caps_from_table() {
        assert_eq!(roster_cap(&comp("Basket Putri", 0)), 12);
        assert_eq!(roster_cap(&comp("E-sport MLBB SMA", 0)), 7);
        assert_eq!(roster_cap(&comp("KIR", 0)), 3);
        assert_eq!(roster_cap(&comp("English Debate", 0)), 3);
        assert_eq!(roster_cap(&comp("Short Movie", 0)), DEFAULT_ROSTER_CAP);
    }

    #[test]
    fn test_catalog_cap_overrides_table() {
        let mut comp = comp("Band", 0);
        comp.max_team_size = Some(9);
        assert_eq!(roster_cap(&comp), 9);
    }

    #[test]
    fn test_school_exemption_set() {
        assert!(!school_required("Modern Dance"));
        assert!(!school_required("Band"));
        assert!(!school_required("English Debate"));
        assert!(school_required("Basket Putra"));
        assert!(school_required("Short Movie"));
    }
}
