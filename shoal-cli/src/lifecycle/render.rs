const ELLIPSIS: &str = "...";

/// Fit `text` into exactly `width` characters.
///
/// Text longer than `width - 3` is cut and ends in `...`; shorter text is
/// padded with spaces on the right. Characters, not bytes, are counted.
pub fn bound(text: &str, width: usize) -> String {
    let Some(keep) = width.checked_sub(ELLIPSIS.len()) else {
        return ELLIPSIS[..width].to_string();
    };

    let len = text.chars().count();
    if len > keep {
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(ELLIPSIS);
        out
    } else {
        let mut out = String::with_capacity(text.len() + width - len);
        out.push_str(text);
        out.extend(std::iter::repeat_n(' ', width - len));
        out
    }
}
