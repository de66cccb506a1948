pub mod plurality;

use crate::models::{CandidateId, PartyId};

pub use plurality::{select_winners, tally};

// Ranked standings for a contest, best first
#[derive(Debug, Clone, PartialEq)]
pub struct Tally {
    pub winner_quota: u32,
    pub standings: Vec<Standing>,
}

// One candidate's position in the tally
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub candidate_id: CandidateId,
    pub party_id: PartyId,
    pub ballots: u32,
    pub rank: usize,
    pub is_winner: bool,
}

impl Tally {
    pub fn winners(&self) -> impl Iterator<Item = &Standing> {
        self.standings.iter().filter(|standing| standing.is_winner)
    }

    pub fn total_ballots(&self) -> u64 {
        self.standings.iter().map(|standing| u64::from(standing.ballots)).sum()
    }
}
