//! The `candidates` module drives the combinatorial enumeration of candidate
//! phrases: slot composition, structured reordering, and the Cartesian
//! product over per-slot word choices.
//!

use crate::word_list::NUM_WORDS_IN_LIST;
use crate::{mnemonic, RecoveryError, RecoveryResult};

/// A slot holds the set of admissible words for one position of the phrase.
///
/// A known slot carries the expansion of an input token; an unknown slot
/// stands for the full word list without materializing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The admissible word indices, in expansion order.
    Known(Vec<u16>),
    /// Any word of the word list is admissible.
    Unknown,
}

impl Slot {
    /// The function returns the number of admissible words for the slot.
    pub fn num_choices(&self) -> usize {
        match self {
            Slot::Known(indices) => indices.len(),
            Slot::Unknown => NUM_WORDS_IN_LIST,
        }
    }

    /// The function returns the word index of the choice at the given position.
    pub fn choice(&self, position: usize) -> u16 {
        match self {
            Slot::Known(indices) => indices[position],
            // For an unknown slot, the choices are the word-list indices themselves.
            Slot::Unknown => position as u16,
        }
    }
}

/// The function selects the phrase length.
///
/// If a length hint is given, it is validated against the input; otherwise
/// the smallest legal length that covers the known tokens, the inserted
/// unknown slots, and the largest requested missing position is chosen.
///
/// * `num_tokens` - The number of known input tokens.
/// * `missing_positions` - The 1-indexed positions of missing words.
/// * `length_hint` - The explicitly requested phrase length, if any.
pub fn select_length(
    num_tokens: usize,
    missing_positions: &[usize],
    length_hint: Option<usize>,
) -> RecoveryResult<usize> {
    // The number of words that must fit into the phrase.
    let num_words = num_tokens + missing_positions.len();
    // The largest missing position must be covered as well.
    let max_position = missing_positions.iter().copied().max().unwrap_or(0);
    let required = num_words.max(max_position);
    match length_hint {
        Some(length) => {
            if !mnemonic::is_legal_length(length) {
                return Err(RecoveryError::InvalidLength(format!(
                    "The requested length {} is not one of 12, 15, 18, 21, or 24.",
                    length
                )));
            }
            if length < required {
                return Err(RecoveryError::InvalidLength(format!(
                    "The requested length {} cannot hold the given input ({} words required).",
                    length, required
                )));
            }
            Ok(length)
        }
        None => mnemonic::PHRASE_LENGTHS
            .iter()
            .copied()
            .find(|length| *length >= required)
            .ok_or_else(|| {
                RecoveryError::InvalidLength(format!(
                    "The input requires {} words, which exceeds the maximum phrase length.",
                    required
                ))
            }),
    }
}

/// The function composes the ordered sequence of slots for the phrase.
///
/// The known slots keep their input order. Unknown slots are inserted at the
/// 1-indexed missing positions in ascending order, each insertion shifting
/// the subsequent known slots to the right. If the sequence is still shorter
/// than the phrase length, unknown slots are appended at the end.
///
/// * `known_slots` - The slots of the known tokens, in input order.
/// * `missing_positions` - The 1-indexed positions of missing words.
/// * `length` - The phrase length.
pub fn compose_slots(
    known_slots: Vec<Slot>,
    missing_positions: &[usize],
    length: usize,
) -> RecoveryResult<Vec<Slot>> {
    // The missing positions are processed in ascending order.
    let mut positions: Vec<usize> = missing_positions.to_vec();
    positions.sort_unstable();
    positions.dedup();
    let mut slots: Vec<Slot> = known_slots;
    for position in positions {
        if position < 1 || position > length {
            return Err(RecoveryError::InvalidLength(format!(
                "The missing position {} is outside the phrase of length {}.",
                position, length
            )));
        }
        // Insert the unknown slot, shifting subsequent slots to the right.
        // A position beyond the current end is an append.
        let insertion_index = (position - 1).min(slots.len());
        slots.insert(insertion_index, Slot::Unknown);
    }
    if slots.len() > length {
        return Err(RecoveryError::InvalidLength(format!(
            "The input holds {} words, which exceeds the phrase length {}.",
            slots.len(),
            length
        )));
    }
    // Append unknown slots for the remaining positions.
    while slots.len() < length {
        slots.push(Slot::Unknown);
    }
    Ok(slots)
}

/// The function generates the reorder permutations for the given length.
///
/// The identity is always included. With reordering enabled, the transpose
/// of every rectangular layout `rows x columns = length` with at least two
/// rows and two columns is added. Output position `i * columns + j` takes
/// input position `j * rows + i`, so applying the `rows x columns` entry to
/// a phrase that was copied column-major from a grid with `rows` rows
/// restores the row-major phrase. Duplicates are removed.
///
/// * `length` - The phrase length.
/// * `reorder` - Flag indicating whether reordering is enabled.
pub fn reorder_permutations(length: usize, reorder: bool) -> Vec<Vec<usize>> {
    // The identity permutation comes first.
    let mut permutations: Vec<Vec<usize>> = vec![(0..length).collect()];
    if !reorder {
        return permutations;
    }
    for rows in 2..=length / 2 {
        if length % rows != 0 {
            continue;
        }
        let columns = length / rows;
        if columns < 2 {
            continue;
        }
        // The transpose of the rows x columns layout.
        let mut permutation = vec![0; length];
        for row in 0..rows {
            for column in 0..columns {
                permutation[row * columns + column] = column * rows + row;
            }
        }
        if !permutations.contains(&permutation) {
            permutations.push(permutation);
        }
    }
    permutations
}

/// The function returns true if some word occurs three or more times.
///
/// Phrases in practice rarely repeat a word; candidates with three or more
/// occurrences of the same word are pruned.
///
/// * `indices` - The word indices of the candidate phrase.
pub fn has_repetition(indices: &[u16]) -> bool {
    for (position, index) in indices.iter().enumerate() {
        let mut occurrences = 1;
        for other in &indices[position + 1..] {
            if other == index {
                occurrences += 1;
                if occurrences >= 3 {
                    return true;
                }
            }
        }
    }
    false
}

/// This struct enumerates all candidate index tuples.
///
/// For every reorder permutation, the Cartesian product of the per-slot word
/// choices is iterated with an array of per-slot cursors, so the memory use
/// is linear in the phrase length. Within one permutation, the enumeration
/// order is lexicographic over the per-slot choice lists.
pub struct CandidateStream<'a> {
    /// The slot sequence before reordering.
    slots: &'a [Slot],
    /// The reorder permutations.
    permutations: Vec<Vec<usize>>,
    /// The index of the current permutation.
    permutation_index: usize,
    /// The per-slot cursors into the permuted slot sequence.
    cursors: Vec<usize>,
    /// True if all candidates have been produced.
    done: bool,
}

impl<'a> CandidateStream<'a> {
    /// The function creates a candidate stream over the given slots.
    ///
    /// * `slots` - The slot sequence.
    /// * `reorder` - Flag indicating whether reordering is enabled.
    pub fn new(slots: &'a [Slot], reorder: bool) -> Self {
        let permutations = reorder_permutations(slots.len(), reorder);
        // A slot without choices makes the whole product empty.
        let done = slots.is_empty() || slots.iter().any(|slot| slot.num_choices() == 0);
        CandidateStream {
            slots,
            permutations,
            permutation_index: 0,
            cursors: vec![0; slots.len()],
            done,
        }
    }

    /// The function returns the total number of candidates in the stream,
    /// saturating at `u64::MAX` for products beyond the representable range.
    pub fn num_candidates(&self) -> u64 {
        if self.slots.iter().any(|slot| slot.num_choices() == 0) {
            return 0;
        }
        let per_permutation = self
            .slots
            .iter()
            .fold(1u64, |product, slot| {
                product.saturating_mul(slot.num_choices() as u64)
            });
        per_permutation.saturating_mul(self.permutations.len() as u64)
    }

    /// The function returns the slot at the given output position of the
    /// current permutation.
    fn permuted_slot(&self, position: usize) -> &Slot {
        &self.slots[self.permutations[self.permutation_index][position]]
    }

    /// The function advances the odometer to the next candidate.
    fn advance(&mut self) {
        // Advance the rightmost cursor first; carry on overflow.
        for position in (0..self.cursors.len()).rev() {
            self.cursors[position] += 1;
            if self.cursors[position] < self.permuted_slot(position).num_choices() {
                return;
            }
            self.cursors[position] = 0;
        }
        // All cursors overflowed: move to the next permutation.
        self.permutation_index += 1;
        if self.permutation_index >= self.permutations.len() {
            self.done = true;
        }
    }
}

impl<'a> Iterator for CandidateStream<'a> {
    type Item = Vec<u16>;

    fn next(&mut self) -> Option<Vec<u16>> {
        if self.done {
            return None;
        }
        // Produce the candidate for the current cursors.
        let candidate: Vec<u16> = (0..self.cursors.len())
            .map(|position| self.permuted_slot(position).choice(self.cursors[position]))
            .collect();
        self.advance();
        Some(candidate)
    }
}

// ******************************** TESTS ********************************

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_list::WordList;

    /// The 24-word example phrase used throughout the documentation.
    const EXAMPLE_PHRASE: &str = "ladder long kangaroo inherit unknown prize else second enter \
                                  addict mystery valve riot attitude area blind fabric symbol \
                                  skill sunset goose shock gasp grape";

    #[test]
    /// The function tests the length selection without a hint.
    fn test_select_length() {
        // 11 known tokens and no missing positions require 12 words.
        assert_eq!(select_length(11, &[], None).unwrap(), 12);
        assert_eq!(select_length(12, &[], None).unwrap(), 12);
        assert_eq!(select_length(13, &[], None).unwrap(), 15);
        assert_eq!(select_length(23, &[24], None).unwrap(), 24);
        // A missing position beyond the token count grows the length.
        assert_eq!(select_length(11, &[24], None).unwrap(), 24);
        // Too many words cannot be accommodated.
        assert!(select_length(25, &[], None).is_err());
    }

    #[test]
    /// The function tests the length selection with a hint.
    fn test_select_length_with_hint() {
        assert_eq!(select_length(11, &[], Some(24)).unwrap(), 24);
        // The hint must be a legal length.
        assert!(select_length(11, &[], Some(13)).is_err());
        // The hint must accommodate the input.
        assert!(select_length(13, &[], Some(12)).is_err());
        assert!(select_length(11, &[15], Some(12)).is_err());
    }

    #[test]
    /// The function tests the slot composition.
    fn test_compose_slots() {
        let known = vec![Slot::Known(vec![1]), Slot::Known(vec![2])];
        // An unknown slot is inserted at position 2, shifting the second
        // known slot to the right; a fourth slot is appended. The phrase
        // length 12 fills the rest with unknown slots.
        let slots = compose_slots(known, &[2], 12).unwrap();
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0], Slot::Known(vec![1]));
        assert_eq!(slots[1], Slot::Unknown);
        assert_eq!(slots[2], Slot::Known(vec![2]));
        assert!(slots[3..].iter().all(|slot| *slot == Slot::Unknown));
        // A missing position outside the phrase is rejected.
        let known = vec![Slot::Known(vec![1])];
        assert!(compose_slots(known, &[13], 12).is_err());
    }

    #[test]
    /// The function tests the reorder permutation generation.
    fn test_reorder_permutations() {
        // Without reordering, only the identity is generated.
        let permutations = reorder_permutations(24, false);
        assert_eq!(permutations.len(), 1);
        // For 24 words, the layouts 2x12, 3x8, 4x6, 6x4, 8x3, and 12x2
        // contribute one transpose each.
        let permutations = reorder_permutations(24, true);
        assert_eq!(permutations.len(), 7);
        // Every entry is a permutation of the positions.
        for permutation in &permutations {
            let mut sorted = permutation.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..24).collect::<Vec<usize>>());
        }
        // A prime length has no rectangular layout at all.
        // (No legal phrase length is prime, but the generator is total.)
        assert_eq!(reorder_permutations(13, true).len(), 1);
    }

    #[test]
    /// The function tests that a transpose is an involution exactly for
    /// square layouts.
    ///
    /// Among the legal phrase lengths only 16 would have a square layout;
    /// 12 and 24 have none, so none of their transposes is self-inverse.
    fn test_transpose_involution() {
        for (length, expected_transposes, expected_involutions) in
            &[(12usize, 4usize, 0usize), (16, 3, 1), (24, 6, 0)]
        {
            let permutations = reorder_permutations(*length, true);
            assert_eq!(permutations.len() - 1, *expected_transposes);
            let num_involutions = permutations
                .iter()
                .skip(1)
                .filter(|permutation| {
                    (0..*length).all(|position| permutation[permutation[position]] == position)
                })
                .count();
            assert_eq!(num_involutions, *expected_involutions);
        }
    }

    #[test]
    /// The function tests that fully known slots produce a single candidate.
    fn test_single_candidate() {
        let slots: Vec<Slot> = (0..12).map(|index| Slot::Known(vec![index as u16])).collect();
        let stream = CandidateStream::new(&slots, false);
        assert_eq!(stream.num_candidates(), 1);
        let candidates: Vec<Vec<u16>> = stream.collect();
        assert_eq!(candidates, vec![(0..12).collect::<Vec<u16>>()]);
    }

    #[test]
    /// The function tests that an unknown slot enumerates the full word list.
    fn test_unknown_slot_candidates() {
        let mut slots: Vec<Slot> = (0..23).map(|index| Slot::Known(vec![index as u16])).collect();
        slots.push(Slot::Unknown);
        let stream = CandidateStream::new(&slots, false);
        assert_eq!(stream.num_candidates(), 2048);
        assert_eq!(stream.count(), 2048);
    }

    #[test]
    /// The function tests that an empty slot produces no candidates.
    fn test_unsatisfiable_slot() {
        let slots = vec![Slot::Known(vec![1]), Slot::Known(vec![])];
        let stream = CandidateStream::new(&slots, false);
        assert_eq!(stream.num_candidates(), 0);
        assert_eq!(stream.count(), 0);
    }

    #[test]
    /// The function tests the lexicographic enumeration order.
    fn test_enumeration_order() {
        let slots = vec![Slot::Known(vec![5, 7]), Slot::Known(vec![1, 2, 3])];
        let candidates: Vec<Vec<u16>> = CandidateStream::new(&slots, false).collect();
        assert_eq!(
            candidates,
            vec![
                vec![5, 1],
                vec![5, 2],
                vec![5, 3],
                vec![7, 1],
                vec![7, 2],
                vec![7, 3],
            ]
        );
    }

    #[test]
    /// The function tests that the stream never yields a tuple twice when
    /// all slots are distinct singletons.
    fn test_no_duplicates_without_reorder() {
        let slots = vec![
            Slot::Known(vec![1, 2]),
            Slot::Known(vec![3]),
            Slot::Known(vec![4, 5]),
        ];
        let candidates: Vec<Vec<u16>> = CandidateStream::new(&slots, false).collect();
        let mut deduplicated = candidates.clone();
        deduplicated.sort();
        deduplicated.dedup();
        assert_eq!(candidates.len(), deduplicated.len());
    }

    #[test]
    /// The function tests the repetition filter.
    fn test_has_repetition() {
        assert!(!has_repetition(&[1, 2, 3, 4]));
        // Two occurrences are allowed.
        assert!(!has_repetition(&[1, 2, 1, 3]));
        // Three occurrences are pruned.
        assert!(has_repetition(&[1, 2, 1, 3, 1]));
        assert!(has_repetition(&[7; 12]));
    }

    #[test]
    /// The function tests the recovery of a phrase that was written down
    /// column-major from a 4x6 grid.
    fn test_transposed_phrase_recovery() {
        let list = WordList::default_english();
        let phrase_indices = list.indices_of_phrase(EXAMPLE_PHRASE).unwrap();
        // Copy the phrase column-major from the 4-row, 6-column layout.
        let mut written = vec![0u16; 24];
        for row in 0..4 {
            for column in 0..6 {
                written[column * 4 + row] = phrase_indices[row * 6 + column];
            }
        }
        // The written-down order itself fails the checksum.
        assert!(!crate::mnemonic::is_valid(&written).unwrap());
        // Enumerate with reordering: one candidate per permutation.
        let slots: Vec<Slot> = written
            .iter()
            .map(|index| Slot::Known(vec![*index]))
            .collect();
        let candidates: Vec<Vec<u16>> = CandidateStream::new(&slots, true).collect();
        assert_eq!(candidates.len(), 7);
        // Exactly one candidate passes the checksum, and it is the original.
        let valid: Vec<&Vec<u16>> = candidates
            .iter()
            .filter(|candidate| crate::mnemonic::is_valid(candidate).unwrap())
            .collect();
        assert_eq!(valid, vec![&phrase_indices]);
    }
}
