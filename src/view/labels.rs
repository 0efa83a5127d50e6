/*!
# Label Refinement Passes

Two in-place passes over one view's finished control list:

- association pairs each label with the control it most plausibly
  describes, using the approximate grid coordinates reconstructed during
  the walk, falling back to document order;
- merging collapses multi-fragment labels (one visual caption split
  across adjacent markup runs) into a single compound label.

Both passes run after the traversal and before any cross-view folding.
*/

use crate::model::ControlDefinition;
use crate::view::context::decode_grid_token;

/// Pairs labels with nearby controls.
///
/// For each label, in document order: same-row controls to the right
/// (lowest column wins), else any control on the immediately-following
/// row (lowest column wins), else the next control by document index.
/// The association is bidirectional; a control without its own label
/// additionally receives the label's text.
pub fn associate_labels(controls: &mut [ControlDefinition]) {
    let label_indices: Vec<usize> = controls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.control_type.is_label())
        .map(|(i, _)| i)
        .collect();

    let candidate_indices: Vec<usize> = controls
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.control_type.is_label() && !c.control_type.is_structural())
        .map(|(i, _)| i)
        .collect();

    for &label_index in &label_indices {
        let (label_row, label_column) =
            decode_grid_token(&controls[label_index].grid_position).unwrap_or((0, 0));
        let label_doc_index = controls[label_index].document_index;

        let target = find_same_row(controls, &candidate_indices, label_row, label_column)
            .or_else(|| find_next_row(controls, &candidate_indices, label_row))
            .or_else(|| find_by_document_order(controls, &candidate_indices, label_doc_index));

        if let Some(target_index) = target {
            let label_text = controls[label_index].label.clone();
            let target_doc_index = controls[target_index].document_index;

            controls[label_index].associated_control = Some(target_doc_index);
            controls[target_index].associated_label = Some(label_doc_index);
            if controls[target_index].label.is_empty() {
                controls[target_index].label = label_text;
            }
        }
    }
}

fn find_same_row(
    controls: &[ControlDefinition],
    candidates: &[usize],
    row: u32,
    column: u32,
) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .filter_map(|i| {
            let (r, c) = decode_grid_token(&controls[i].grid_position)?;
            (r == row && c > column).then_some((i, c))
        })
        .min_by_key(|&(_, c)| c)
        .map(|(i, _)| i)
}

fn find_next_row(
    controls: &[ControlDefinition],
    candidates: &[usize],
    row: u32,
) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .filter_map(|i| {
            let (r, c) = decode_grid_token(&controls[i].grid_position)?;
            (r == row + 1).then_some((i, c))
        })
        .min_by_key(|&(_, c)| c)
        .map(|(i, _)| i)
}

fn find_by_document_order(
    controls: &[ControlDefinition],
    candidates: &[usize],
    label_doc_index: u32,
) -> Option<usize> {
    candidates
        .iter()
        .copied()
        .filter(|&i| controls[i].document_index > label_doc_index)
        .min_by_key(|&i| controls[i].document_index)
}

/// Collapses adjacent label fragments into one compound label.
///
/// Two adjacent labels are related when they share a grid token, or when
/// their document indices differ by exactly one and their rows by at most
/// one. The first record survives as a multi-line label; the absorbed one
/// is marked `merged_into_parent` and excluded from every later consumer.
pub fn merge_label_fragments(controls: &mut [ControlDefinition]) {
    let label_indices: Vec<usize> = controls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.control_type.is_label())
        .map(|(i, _)| i)
        .collect();

    if label_indices.is_empty() {
        return;
    }

    let mut head = label_indices[0];
    let mut merged = 0usize;
    for pair in label_indices.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if related_fragments(&controls[previous], &controls[current]) {
            let fragment_text = controls[current].label.clone();
            let survivor = &mut controls[head];
            if !fragment_text.is_empty() {
                if !survivor.label.is_empty() {
                    survivor.label.push(' ');
                }
                survivor.label.push_str(&fragment_text);
            }
            survivor.is_multiline_label = true;
            controls[current].merged_into_parent = true;
            merged += 1;
        } else {
            head = current;
        }
    }

    if merged > 0 {
        tracing::debug!("Merged {} label fragments", merged);
    }
}

fn related_fragments(first: &ControlDefinition, second: &ControlDefinition) -> bool {
    if !first.grid_position.is_empty() && first.grid_position == second.grid_position {
        return true;
    }
    if second.document_index.saturating_sub(first.document_index) != 1 {
        return false;
    }
    match (
        decode_grid_token(&first.grid_position),
        decode_grid_token(&second.grid_position),
    ) {
        (Some((row_a, _)), Some((row_b, _))) => row_a.abs_diff(row_b) <= 1,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlDefinition, ControlType};

    fn label(doc_index: u32, grid: &str, text: &str) -> ControlDefinition {
        let mut c = ControlDefinition::new(ControlType::Label, doc_index);
        c.grid_position = grid.to_string();
        c.label = text.to_string();
        c
    }

    fn control(doc_index: u32, grid: &str) -> ControlDefinition {
        let mut c = ControlDefinition::new(ControlType::Text, doc_index);
        c.grid_position = grid.to_string();
        c
    }

    #[test]
    fn test_same_row_lowest_column_wins() {
        let mut controls = vec![label(0, "3A", "Name"), control(1, "3C"), control(2, "3B")];
        associate_labels(&mut controls);

        assert_eq!(controls[0].associated_control, Some(2));
        assert_eq!(controls[2].associated_label, Some(0));
        assert_eq!(controls[2].label, "Name");
        assert!(controls[1].associated_label.is_none());
    }

    #[test]
    fn test_next_row_fallback() {
        let mut controls = vec![label(0, "3A", "Notes"), control(1, "4B"), control(2, "4A")];
        associate_labels(&mut controls);
        assert_eq!(controls[0].associated_control, Some(2));
        assert_eq!(controls[2].label, "Notes");
    }

    #[test]
    fn test_document_order_fallback() {
        let mut controls = vec![label(0, "3A", "Far"), control(1, "9D")];
        associate_labels(&mut controls);
        assert_eq!(controls[0].associated_control, Some(1));
        assert_eq!(controls[1].label, "Far");
    }

    #[test]
    fn test_existing_label_not_overwritten() {
        let mut controls = vec![label(0, "3A", "Caption"), control(1, "3B")];
        controls[1].label = "Own".to_string();
        associate_labels(&mut controls);
        assert_eq!(controls[1].label, "Own");
        // the association itself is still recorded
        assert_eq!(controls[1].associated_label, Some(0));
    }

    #[test]
    fn test_labels_never_target_sections() {
        let mut section = ControlDefinition::new(ControlType::RepeatingTable, 1);
        section.grid_position = "3B".to_string();
        let mut controls = vec![label(0, "3A", "Items"), section, control(2, "3C")];
        associate_labels(&mut controls);
        assert_eq!(controls[0].associated_control, Some(2));
    }

    #[test]
    fn test_merge_same_grid_token() {
        let mut controls = vec![label(0, "5A", "Employee"), label(1, "5A", "Name")];
        merge_label_fragments(&mut controls);

        assert_eq!(controls[0].label, "Employee Name");
        assert!(controls[0].is_multiline_label);
        assert!(controls[1].merged_into_parent);
    }

    #[test]
    fn test_merge_adjacent_indices_close_rows() {
        let mut controls = vec![label(3, "5A", "Shipping"), label(4, "6A", "Address")];
        merge_label_fragments(&mut controls);
        assert_eq!(controls[0].label, "Shipping Address");
        assert!(controls[1].merged_into_parent);
    }

    #[test]
    fn test_no_merge_across_distant_rows() {
        let mut controls = vec![label(3, "5A", "One"), label(4, "9A", "Two")];
        merge_label_fragments(&mut controls);
        assert!(!controls[1].merged_into_parent);
        assert_eq!(controls[0].label, "One");
    }

    #[test]
    fn test_no_merge_with_gap_in_document_order() {
        let mut controls = vec![
            label(0, "5A", "One"),
            control(1, "5B"),
            label(2, "5C", "Two"),
        ];
        merge_label_fragments(&mut controls);
        assert!(!controls[2].merged_into_parent);
    }

    #[test]
    fn test_chain_merge_keeps_first_survivor() {
        let mut controls = vec![
            label(0, "5A", "Very"),
            label(1, "5A", "Long"),
            label(2, "5A", "Caption"),
        ];
        merge_label_fragments(&mut controls);
        assert_eq!(controls[0].label, "Very Long Caption");
        assert!(controls[1].merged_into_parent);
        assert!(controls[2].merged_into_parent);
    }
}
