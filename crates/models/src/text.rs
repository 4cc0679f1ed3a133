//! Text folding shared by header matching, parsing and search.

use unicode_normalization::UnicodeNormalization;

/// Unicode compatibility folding (NFKC): full-width ASCII becomes
/// half-width, half-width katakana becomes full-width with voiced marks
/// composed (`ｶﾞ` → `ガ`), and enclosed forms are expanded (`㈱` → `(株)`).
/// The ideographic space, the yen sign and the minus sign end up as their
/// ASCII-range equivalents.
pub fn fold_width(input: &str) -> String {
    input
        .nfkc()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{FFE5}' => '¥',
            '\u{2212}' => '-',
            _ => c,
        })
        .collect()
}

/// Trims and collapses every whitespace run (tabs, newlines, ideographic
/// spaces included) into a single ASCII space.
pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison key: width-folded, lowercased, with all whitespace removed.
///
/// Used both for header/alias matching and for the search surrogate, so a
/// keyword typed as `ＡＢＣ 商事` matches a cell stored as `abc商事`.
pub fn fold_key(input: &str) -> String {
    fold_width(input)
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_width_digits_and_letters() {
        assert_eq!(fold_width("２０２４／０４／０１"), "2024/04/01");
        assert_eq!(fold_width("ＡＢＣ　ｄｅｆ"), "ABC def");
        assert_eq!(fold_width("￥１，０００"), "¥1,000");
    }

    #[test]
    fn test_fold_width_keeps_kana() {
        assert_eq!(fold_width("株式会社アルファ"), "株式会社アルファ");
    }

    #[test]
    fn test_fold_width_half_width_kana() {
        assert_eq!(fold_width("ｶﾌﾞｼｷｶﾞｲｼｬ"), "カブシキガイシャ");
        assert_eq!(fold_width("ｶﾞ"), "ガ");
        assert_eq!(fold_width("ﾊﾟｰﾂ"), "パーツ");
    }

    #[test]
    fn test_fold_width_enclosed_forms() {
        assert_eq!(fold_width("㈱山田"), "(株)山田");
        assert_eq!(fold_width("㈲田中"), "(有)田中");
        assert_eq!(fold_width("㍻31年"), "平成31年");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\u{3000}\u{3000}c \n"), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_fold_key() {
        assert_eq!(fold_key(" 伝 票 日 付 "), "伝票日付");
        assert_eq!(fold_key("Unit_Price"), "unit_price");
        assert_eq!(fold_key("ＤＡＴＥ"), "date");
        assert_eq!(fold_key("ｶﾌﾞｼｷｶﾞｲｼｬ"), fold_key("カブシキガイシャ"));
        assert_eq!(fold_key("㈱山田"), fold_key("(株)山田"));
    }
}
