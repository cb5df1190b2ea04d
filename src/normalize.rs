// Text normalization shared by the lexical judge, the taxonomy loader, and the
// verdict cache fingerprint.

/// Normalize text for keyword matching.
///
/// Maps full-width alphanumerics (`Ａ`-`Ｚ`, `ａ`-`ｚ`, `０`-`９`) to their ASCII
/// equivalents, case-folds, and collapses every whitespace run (including the
/// ideographic space U+3000) into a single ASCII space. Leading and trailing
/// whitespace is dropped.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.chars().map(to_half_width).collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a single full-width alphanumeric to ASCII; everything else passes through.
fn to_half_width(c: char) -> char {
    match c {
        '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' => {
            char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
        }
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_folds() {
        assert_eq!(normalize_text("StUpId"), "stupid");
    }

    #[test]
    fn test_full_width_to_half_width() {
        assert_eq!(normalize_text("ＳＴＵＰＩＤ１２３"), "stupid123");
        assert_eq!(normalize_text("ｂａｋａ"), "baka");
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        assert_eq!(normalize_text("really \t\n  stupid"), "really stupid");
        // Ideographic space counts as whitespace
        assert_eq!(normalize_text("本当に\u{3000}\u{3000}バカ"), "本当に バカ");
    }

    #[test]
    fn test_trims_edges() {
        assert_eq!(normalize_text("  死ね  "), "死ね");
    }

    #[test]
    fn test_japanese_passes_through() {
        assert_eq!(normalize_text("こんにちは"), "こんにちは");
    }

    #[test]
    fn test_blank_becomes_empty() {
        assert_eq!(normalize_text(" \u{3000}\t"), "");
    }
}
