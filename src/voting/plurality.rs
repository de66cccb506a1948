use crate::error::{Error, Result};
use crate::models::{CandidateCount, CandidateId};
use crate::voting::{Standing, Tally};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

/// Picks the `winner_quota` candidates with the most ballots.
///
/// Ties are broken by candidate identifier, highest first, so the outcome does
/// not depend on the order the counts were entered in.
pub fn select_winners(
    candidate_counts: &[CandidateCount],
    winner_quota: u32,
) -> Result<BTreeSet<CandidateId>> {
    let ranked = rank(candidate_counts, winner_quota)?;

    Ok(ranked
        .into_iter()
        .take(winner_quota as usize)
        .map(|count| count.candidate_id.clone())
        .collect())
}

/// Full standings for a preview, same ordering as `select_winners`.
pub fn tally(candidate_counts: &[CandidateCount], winner_quota: u32) -> Result<Tally> {
    let ranked = rank(candidate_counts, winner_quota)?;

    let standings = ranked
        .into_iter()
        .enumerate()
        .map(|(i, count)| Standing {
            candidate_id: count.candidate_id.clone(),
            party_id: count.party_id.clone(),
            ballots: count.ballots,
            rank: i + 1,
            is_winner: i < winner_quota as usize,
        })
        .collect();

    Ok(Tally {
        winner_quota,
        standings,
    })
}

fn rank(candidate_counts: &[CandidateCount], winner_quota: u32) -> Result<Vec<&CandidateCount>> {
    let mut seen = HashSet::new();
    for count in candidate_counts {
        if !seen.insert(&count.candidate_id) {
            return Err(Error::DuplicateCandidate(count.candidate_id.clone()));
        }
    }

    if winner_quota == 0 || winner_quota as usize > candidate_counts.len() {
        return Err(Error::InvalidQuota {
            quota: winner_quota,
            candidates: candidate_counts.len(),
        });
    }

    let mut ranked: Vec<&CandidateCount> = candidate_counts.iter().collect();
    ranked.sort_by(|a, b| by_ballots_then_id(a, b));
    Ok(ranked)
}

// Descending on (ballots, candidate id)
fn by_ballots_then_id(a: &CandidateCount, b: &CandidateCount) -> Ordering {
    b.ballots
        .cmp(&a.ballots)
        .then_with(|| b.candidate_id.cmp(&a.candidate_id))
}
