//! Promotion of reranked values into the authoritative hit fields.

use super::ResultSet;

/// Moves each hit's scratch score/highlights into `original_score` /
/// `highlights` and drops the correlation id.
///
/// Every step is guarded by presence, so hits a strategy skipped keep their
/// data and a second call changes nothing. Returns the number of hits whose
/// score was promoted.
pub fn finalize(results: &mut ResultSet) -> usize {
    let mut promoted = 0usize;

    for (hit, scratch) in results.iter_mut_with_scratch() {
        if let Some(score) = scratch.reranker_score.take() {
            hit.original_score = Some(score);
            promoted += 1;
        }

        if let Some(highlights) = scratch.highlights_reranked.take() {
            hit.highlights = Some(highlights);
        }

        scratch.reranked_id = None;
    }

    tracing::debug!(promoted, total = results.len(), "Finalized reranked results");
    promoted
}
