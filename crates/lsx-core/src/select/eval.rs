//! Inclusion decision for one subject.
//!
//! Exclusions win outright. With no inclusive criteria everything else is
//! included. Otherwise OR mode needs one constraining category hit and AND
//! mode needs all of them.

use super::criterion::Subject;
use super::store::SelectionStore;

/// Decide whether `subject` is included, marking every criterion it
/// matches along the way.
pub fn evaluate(store: &mut SelectionStore, subject: &Subject<'_>) -> bool {
    let and_mode = store.and_mode();
    let mut excluded = false;
    let mut constraining = 0usize;
    let mut hits = 0usize;

    for (category, criteria) in store.categories_mut() {
        let mut has_inclusive = false;
        let mut hit = false;
        for criterion in criteria.iter_mut() {
            let matched = criterion.selector.matches(subject);
            if matched {
                criterion.matched = true;
            }
            if criterion.exclude {
                excluded |= matched;
            } else {
                has_inclusive = true;
                hit |= matched;
            }
        }
        if has_inclusive && category.is_constraining() {
            constraining += 1;
            if hit {
                hits += 1;
            }
        }
    }

    if excluded {
        return false;
    }
    if constraining == 0 {
        return true;
    }
    if and_mode {
        hits == constraining
    } else {
        hits > 0
    }
}

impl SelectionStore {
    pub fn evaluate(&mut self, subject: &Subject<'_>) -> bool {
        evaluate(self, subject)
    }
}
