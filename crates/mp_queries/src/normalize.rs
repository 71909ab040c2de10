//! Single-line statement rendering for logs
//!
//! Line breaks and tabs become one space each, then every literal
//! two-space pair is deleted in one left-to-right pass, then the ends are
//! trimmed. The deletion step removes pairs rather than collapsing runs,
//! so indented statements lose their token separators: `"SELECT  a"`
//! renders as `"SELECTa"` and a three-space run leaves one space behind.
//! Log output depends on this exact rendering, so it is kept as is.

/// Render `text` on a single line.
///
/// The result is for display only and must never be executed.
pub fn normalize(text: &str) -> String {
    let single_line = text
        .replace("\r\n", " ")
        .replace('\n', " ")
        .replace('\t', " ");

    single_line.replace("  ", "").trim_matches(' ').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_plain_statement_unchanged() {
        assert_eq!(normalize("SHOW GLOBAL STATUS"), "SHOW GLOBAL STATUS");
    }

    #[test]
    fn test_double_spaces_are_removed_not_collapsed() {
        // CRLF becomes a single space, which survives; the doubled spaces do not
        assert_eq!(normalize("SELECT  a\r\nFROM  b"), "SELECTa FROMb");
    }

    #[test]
    fn test_three_spaces_leave_one() {
        assert_eq!(normalize("a   b"), "a b");
    }

    #[test]
    fn test_four_spaces_leave_none() {
        assert_eq!(normalize("a    b"), "ab");
    }

    #[test]
    fn test_tabs_and_newlines() {
        assert_eq!(normalize("a\tb\nc"), "a b c");
        assert_eq!(normalize("a\t\tb"), "ab");
    }

    #[test]
    fn test_trims_spaces_only() {
        assert_eq!(normalize("\n SELECT 1 \n"), "SELECT 1");
        assert_eq!(normalize("\rSELECT 1"), "\rSELECT 1");
    }

    #[test]
    fn test_indented_statement() {
        // newline plus eight spaces is an odd run, one space survives
        let statement = "\n        SELECT a, b\n        FROM t\n        WHERE x > 0;\n        ";
        assert_eq!(
            normalize(statement),
            "SELECT a, b FROM t WHERE x > 0;"
        );

        // newline plus three spaces is an even run, tokens get glued
        let statement = "\n   SELECT a\n   FROM b\n";
        assert_eq!(normalize(statement), "SELECT aFROM b");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\r\n\t\n"), "");
    }

    proptest! {
        #[test]
        fn test_normalize_idempotent(text in "[ a-zA-Z0-9_,;()'\t\r\n]{0,80}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn test_output_is_single_line(text in "[ a-zA-Z\t\r\n]{0,80}") {
            let out = normalize(&text);
            prop_assert!(!out.contains('\n'));
            prop_assert!(!out.contains('\t'));
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
        }
    }
}
