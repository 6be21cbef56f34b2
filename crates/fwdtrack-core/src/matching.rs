use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::ForwardDataset,
    utils::{
        enums::TrackType,
        variables::{is_in_acceptance, pseudorapidity},
    },
    FwdTrackResult,
};

/// The matching $`\chi^2`$ threshold used when none is configured.
pub const DEFAULT_CHI2_THRESHOLD: f64 = 100.0;

/// A global muon proposed as the match of a standalone track.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Row of the global muon in the track table.
    pub entry: usize,
    /// Its MCH-MFT matching $`\chi^2`$.
    pub chi2: f64,
    /// Its truth mask (0 for a correct match).
    pub mc_mask: u8,
    /// Its pseudorapidity.
    pub eta: f64,
}

/// Candidates grouped by the row of the standalone track they were matched to, in first-seen
/// order.
pub type CandidateGroups = IndexMap<usize, Vec<MatchCandidate>>;

/// The best candidate for each standalone track which has one.
pub type BestMatches = IndexMap<usize, MatchCandidate>;

/// Collect every in-acceptance global muon whose matching $`\chi^2`$ lies in
/// `[0, threshold)` and which points at a standalone track, grouped by that track's row.
///
/// Passing [`f64::INFINITY`] collects every candidate with a non-negative $`\chi^2`$, which
/// can then be reselected at several thresholds with [`select_best_matches`].
///
/// # Errors
///
/// Returns [`FwdTrackError::MissingTable`](crate::FwdTrackError::MissingTable) if the dataset
/// has no truth labels.
pub fn collect_match_candidates(
    dataset: &ForwardDataset,
    threshold: f64,
) -> FwdTrackResult<CandidateGroups> {
    let labels = dataset.require_labels()?;
    let mut groups = CandidateGroups::new();
    for (row, track) in dataset.tracks.iter() {
        if !track.is(TrackType::GlobalMuon) {
            continue;
        }
        let chi2 = track.chi2_match_mch_mft;
        if !(chi2 >= 0.0 && chi2 < threshold) {
            continue;
        }
        let eta = pseudorapidity(track.tgl);
        if !is_in_acceptance(eta) {
            continue;
        }
        let Ok(target) = usize::try_from(track.index_match_mch_track) else {
            continue;
        };
        groups.entry(target).or_default().push(MatchCandidate {
            entry: row,
            chi2,
            mc_mask: labels.mc_mask[row],
            eta,
        });
    }
    debug!(
        "Collected {} match candidates for {} standalone tracks",
        groups.values().map(Vec::len).sum::<usize>(),
        groups.len()
    );
    Ok(groups)
}

/// Pick the candidate with the smallest $`\chi^2`$ in `[0, threshold)` from each group.
///
/// The scan keeps the first of equal minima. Groups without any qualifying candidate are
/// left out of the result.
pub fn select_best_matches(candidates: &CandidateGroups, threshold: f64) -> BestMatches {
    let mut best_matches = BestMatches::with_capacity(candidates.len());
    for (&target, group) in candidates {
        let mut best: Option<MatchCandidate> = None;
        for candidate in group {
            if !(candidate.chi2 >= 0.0 && candidate.chi2 < threshold) {
                continue;
            }
            match best {
                Some(current) if current.chi2 <= candidate.chi2 => {}
                _ => best = Some(*candidate),
            }
        }
        match best {
            Some(candidate) => {
                debug!(
                    "Track {target}: best of {} candidates is row {} (chi2 = {}, mask = {})",
                    group.len(),
                    candidate.entry,
                    candidate.chi2,
                    candidate.mc_mask
                );
                best_matches.insert(target, candidate);
            }
            None => debug!("Track {target}: no candidate below chi2 = {threshold}"),
        }
    }
    best_matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_dataset;
    use crate::FwdTrackError;
    use approx::assert_relative_eq;

    fn candidate(entry: usize, chi2: f64, mc_mask: u8) -> MatchCandidate {
        MatchCandidate {
            entry,
            chi2,
            mc_mask,
            eta: -3.0,
        }
    }

    #[test]
    fn test_lowest_chi2_wins() {
        let mut groups = CandidateGroups::new();
        groups.insert(7, vec![candidate(1, 5.0, 0), candidate(2, 3.0, 1)]);
        let best = select_best_matches(&groups, DEFAULT_CHI2_THRESHOLD);
        assert_eq!(best.len(), 1);
        assert_relative_eq!(best[&7].chi2, 3.0);
        assert_eq!(best[&7].mc_mask, 1);
    }

    #[test]
    fn test_out_of_range_candidates_are_excluded() {
        let mut groups = CandidateGroups::new();
        groups.insert(0, vec![candidate(1, -1.0, 0), candidate(2, 100.0, 0)]);
        groups.insert(1, vec![candidate(3, 250.0, 0), candidate(4, 99.5, 1)]);
        let best = select_best_matches(&groups, 100.0);
        assert!(!best.contains_key(&0));
        assert_eq!(best[&1].entry, 4);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let mut groups = CandidateGroups::new();
        groups.insert(0, vec![candidate(5, 2.0, 1), candidate(6, 2.0, 0)]);
        let best = select_best_matches(&groups, 10.0);
        assert_eq!(best[&0].entry, 5);
    }

    #[test]
    fn test_collect_groups_by_target() {
        let dataset = test_dataset();
        let groups = collect_match_candidates(&dataset, DEFAULT_CHI2_THRESHOLD).unwrap();
        let targets: Vec<usize> = groups.keys().copied().collect();
        assert_eq!(targets, vec![0, 3]);
        let entries: Vec<usize> = groups[&0].iter().map(|c| c.entry).collect();
        assert_eq!(entries, vec![1, 2]);
        assert_eq!(groups[&0][1].mc_mask, 1);
        assert_relative_eq!(groups[&3][0].eta, -3.0, epsilon = 1e-9);

        let best = select_best_matches(&groups, DEFAULT_CHI2_THRESHOLD);
        assert_eq!(best[&0].entry, 2);
        assert_eq!(best[&3].entry, 4);
    }

    #[test]
    fn test_unbounded_collection_keeps_high_chi2() {
        let dataset = test_dataset();
        let groups = collect_match_candidates(&dataset, f64::INFINITY).unwrap();
        assert_eq!(groups[&5][0].entry, 8);
        assert!(select_best_matches(&groups, 100.0).get(&5).is_none());
    }

    #[test]
    fn test_collect_requires_labels() {
        let mut dataset = test_dataset();
        dataset.labels = None;
        assert!(matches!(
            collect_match_candidates(&dataset, 100.0),
            Err(FwdTrackError::MissingTable { .. })
        ));
    }
}
