// 1-D binary morphology with a flat structuring element

/// Offsets covered by a flat window of `width` samples centred at 0:
/// `-before..=after`, with the extra sample of an even width on the left.
fn window(width: usize) -> (usize, usize) {
    let before = width / 2;
    let after = width.saturating_sub(1) - before;
    (before, after)
}

/// Binary dilation. Positions outside the sequence count as `false`.
pub fn binary_dilation(mask: &[bool], width: usize) -> Vec<bool> {
    if width <= 1 {
        return mask.to_vec();
    }
    let (before, after) = window(width);
    let n = mask.len();
    (0..n)
        .map(|i| {
            // Reflected window: i - after ..= i + before
            let lo = i.saturating_sub(after);
            let hi = (i + before).min(n - 1);
            mask[lo..=hi].iter().any(|&b| b)
        })
        .collect()
}

/// Binary erosion. Positions outside the sequence count as `true`, so runs
/// touching either end are not eaten away from that side.
pub fn binary_erosion(mask: &[bool], width: usize) -> Vec<bool> {
    if width <= 1 {
        return mask.to_vec();
    }
    let (before, after) = window(width);
    let n = mask.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after).min(n - 1);
            mask[lo..=hi].iter().all(|&b| b)
        })
        .collect()
}

/// Binary closing: dilation followed by erosion with the same window.
///
/// Fills inactive gaps shorter than `width` between active runs. Active
/// positions of the input are always active in the output.
pub fn binary_closing(mask: &[bool], width: usize) -> Vec<bool> {
    binary_erosion(&binary_dilation(mask, width), width)
}
