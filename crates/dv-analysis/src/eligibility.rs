use std::collections::BTreeSet;

use dv_core::{CohortReferendum, DelegateWindow, ReferendumIndex};

/// A referendum is eligible for a delegate when it was created or last
/// updated inside the delegate's window. Referenda without either block
/// cannot be placed and are always eligible.
pub fn is_eligible(referendum: &CohortReferendum, window: &DelegateWindow) -> bool {
    match (referendum.created_at_block, referendum.updated_at_block) {
        (None, None) => {
            tracing::debug!(
                referendum = referendum.index,
                "referendum has no block numbers; treating as eligible"
            );
            true
        }
        (created, updated) => {
            created.is_some_and(|block| window.contains(block))
                || updated.is_some_and(|block| window.contains(block))
        }
    }
}

pub fn eligible_referenda<'a, I>(referenda: I, window: &DelegateWindow) -> BTreeSet<ReferendumIndex>
where
    I: IntoIterator<Item = &'a CohortReferendum>,
{
    referenda
        .into_iter()
        .filter(|referendum| is_eligible(referendum, window))
        .map(|referendum| referendum.index)
        .collect()
}
