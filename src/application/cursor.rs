use crate::domain::card_number::space_positions;

/// Where the cursor belongs after an edit has been reformatted.
///
/// # Arguments
///
/// * `new_formatted_length` - Length of the text after reformatting.
/// * `edit_start` - Offset at which the edit began.
/// * `added_digits` - Digits inserted by the edit, zero for a deletion.
/// * `pan_length` - PAN length whose grouping was used for formatting.
pub fn compute_cursor(
    new_formatted_length: usize,
    edit_start: usize,
    added_digits: usize,
    pan_length: usize,
) -> usize {
    let gaps = space_positions(pan_length);

    let gaps_jumped = gaps
        .iter()
        .filter(|&&gap| edit_start <= gap && edit_start + added_digits >= gap)
        .count();

    // A deletion right after a separator also steps back over the separator.
    let skip_back = added_digits == 0 && gaps.iter().any(|&gap| edit_start == gap + 1);

    let mut position = edit_start + added_digits + gaps_jumped;
    if skip_back && position > 0 {
        position -= 1;
    }

    position.min(new_formatted_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_across_a_separator() {
        // "4242" + "4" -> "4242 4"
        assert_eq!(compute_cursor(6, 4, 1, 16), 6);
    }

    #[test]
    fn test_result_is_clamped_to_text_length() {
        assert_eq!(compute_cursor(5, 4, 1, 16), 5);
        assert_eq!(compute_cursor(4, 3, 1, 16), 4);
    }

    #[test]
    fn test_typing_inside_a_group() {
        assert_eq!(compute_cursor(3, 2, 1, 16), 3);
        assert_eq!(compute_cursor(11, 2, 1, 16), 3);
    }

    #[test]
    fn test_delete_after_separator_steps_back() {
        // "4242 4|242" delete at 5 -> cursor before the separator
        assert_eq!(compute_cursor(8, 5, 0, 16), 4);
        assert_eq!(compute_cursor(13, 10, 0, 16), 9);
        assert_eq!(compute_cursor(15, 12, 0, 15), 11);
    }

    #[test]
    fn test_delete_inside_a_group() {
        assert_eq!(compute_cursor(8, 2, 0, 16), 2);
        assert_eq!(compute_cursor(8, 7, 0, 16), 7);
    }

    #[test]
    fn test_paste_into_empty_field() {
        assert_eq!(compute_cursor(19, 0, 16, 16), 19);
        assert_eq!(compute_cursor(17, 0, 15, 15), 17);
        assert_eq!(compute_cursor(23, 0, 19, 19), 23);
    }

    #[test]
    fn test_zero_length_text() {
        assert_eq!(compute_cursor(0, 0, 0, 16), 0);
        assert_eq!(compute_cursor(0, 1, 0, 16), 0);
    }
}
