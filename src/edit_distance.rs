//! The `edit_distance` module provides the Levenshtein distance computation
//! and the expansion of input tokens into sets of word-list words.
//!

use crate::word_list::WordList;

/// The sentinel that denotes an unknown word in the input.
pub const UNKNOWN_TOKEN: &str = "?";

/// The result of expanding a single input token.
pub struct Expansion {
    /// The matching word indices, ordered by ascending distance and index.
    pub indices: Vec<u16>,
    /// True if the token itself is a word-list word.
    pub in_word_list: bool,
}

/// The function computes the Levenshtein distance between two strings.
///
/// The distance is computed over code points using the classical
/// dynamic-programming recurrence with two rows.
///
/// * `first` - The first string.
/// * `second` - The second string.
pub fn distance(first: &str, second: &str) -> usize {
    let first_chars: Vec<char> = first.chars().collect();
    let second_chars: Vec<char> = second.chars().collect();
    if first_chars.is_empty() {
        return second_chars.len();
    }
    // The previous row of the distance table.
    let mut previous_row: Vec<usize> = (0..=second_chars.len()).collect();
    // Fill the table row by row.
    for (row, first_char) in first_chars.iter().enumerate() {
        let mut current_row = vec![row + 1];
        for (column, second_char) in second_chars.iter().enumerate() {
            // The cost of substituting the current characters.
            let substitution = previous_row[column] + (first_char != second_char) as usize;
            // The cost of inserting or deleting a character.
            let insertion = current_row[column] + 1;
            let deletion = previous_row[column + 1] + 1;
            current_row.push(substitution.min(insertion).min(deletion));
        }
        previous_row = current_row;
    }
    previous_row[second_chars.len()]
}

/// The function expands a token into the set of word-list words within the
/// given edit distance.
///
/// The returned indices are ordered by ascending distance, with ties broken
/// by the word-list index, so that the expansion is deterministic.
/// The token `?` (or an empty token) expands to the full word list.
/// If no word is within the given distance, the returned set is empty.
///
/// * `token` - The input token.
/// * `max_distance` - The maximum edit distance.
/// * `word_list` - The word list.
pub fn expand(token: &str, max_distance: usize, word_list: &WordList) -> Expansion {
    // The unknown token expands to the full word list.
    if token.is_empty() || token == UNKNOWN_TOKEN {
        return Expansion {
            indices: (0..word_list.all().count() as u16).collect(),
            in_word_list: false,
        };
    }
    let in_word_list = word_list.contains(token);
    // Collect all words within the maximum distance together with their distance.
    let mut matches: Vec<(usize, u16)> = word_list
        .all()
        .enumerate()
        .filter_map(|(index, word)| {
            let word_distance = distance(token, word);
            if word_distance <= max_distance {
                Some((word_distance, index as u16))
            } else {
                None
            }
        })
        .collect();
    // Order by ascending distance, ties broken by the word-list index.
    matches.sort();
    Expansion {
        indices: matches.into_iter().map(|(_, index)| index).collect(),
        in_word_list,
    }
}

// ******************************** TESTS ********************************

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// The function provides basic tests for the distance computation.
    fn test_distance() {
        assert_eq!(distance("", ""), 0);
        assert_eq!(distance("abandon", "abandon"), 0);
        assert_eq!(distance("", "zoo"), 3);
        assert_eq!(distance("zoo", ""), 3);
        // One substitution.
        assert_eq!(distance("price", "prize"), 1);
        // One deletion.
        assert_eq!(distance("blind", "bind"), 1);
        // One insertion.
        assert_eq!(distance("gap", "gasp"), 1);
        // A combination of operations.
        assert_eq!(distance("altitude", "attitude"), 1);
        assert_eq!(distance("kitten", "sitting"), 3);
    }

    #[test]
    /// The function tests that the distance is computed over code points.
    fn test_distance_code_points() {
        // The words differ in a single (multi-byte) character.
        assert_eq!(distance("caf\u{e9}", "cafe"), 1);
        assert_eq!(distance("\u{e9}l\u{e8}ve", "\u{e9}l\u{e9}ve"), 1);
    }

    #[test]
    /// The function tests the expansion of the unknown token.
    fn test_expand_unknown() {
        let list = WordList::default_english();
        let expansion = expand(UNKNOWN_TOKEN, 0, &list);
        assert_eq!(expansion.indices.len(), 2048);
        assert!(!expansion.in_word_list);
        let expansion = expand("", 3, &list);
        assert_eq!(expansion.indices.len(), 2048);
    }

    #[test]
    /// The function tests the expansion of a word-list word.
    fn test_expand_word_list_member() {
        let list = WordList::default_english();
        // With distance 0, a word-list word expands to itself.
        let expansion = expand("prize", 0, &list);
        assert_eq!(expansion.indices.len(), 1);
        assert_eq!(list.word_of(expansion.indices[0]), "prize");
        assert!(expansion.in_word_list);
        // With a positive distance, the word itself is listed first.
        let expansion = expand("prize", 1, &list);
        assert!(expansion.indices.len() > 1);
        assert_eq!(list.word_of(expansion.indices[0]), "prize");
        assert!(expansion.in_word_list);
    }

    #[test]
    /// The function tests the expansion of tokens outside the word list.
    fn test_expand_typo() {
        let list = WordList::default_english();
        // 'altitude' is not in the word list; 'attitude' is one edit away.
        let expansion = expand("altitude", 1, &list);
        assert!(!expansion.in_word_list);
        let words: Vec<&str> = expansion
            .indices
            .iter()
            .map(|index| list.word_of(*index))
            .collect();
        assert_eq!(words, vec!["attitude"]);
        // 'gap' is itself a word and has close neighbors.
        let expansion = expand("gap", 1, &list);
        assert!(expansion.in_word_list);
        let words: Vec<&str> = expansion
            .indices
            .iter()
            .map(|index| list.word_of(*index))
            .collect();
        assert_eq!(words, vec!["gap", "gas", "gasp"]);
        // With distance 0, an unknown token expands to nothing.
        let expansion = expand("altitude", 0, &list);
        assert!(expansion.indices.is_empty());
        assert!(!expansion.in_word_list);
    }

    #[test]
    /// The function tests the ordering of the expansion.
    fn test_expand_ordering() {
        let list = WordList::default_english();
        let expansion = expand("price", 1, &list);
        // 'price' itself comes first, followed by the distance-1 neighbors
        // in word-list order.
        let words: Vec<&str> = expansion
            .indices
            .iter()
            .map(|index| list.word_of(*index))
            .collect();
        assert_eq!(words, vec!["price", "pride", "prize", "rice"]);
    }
}
