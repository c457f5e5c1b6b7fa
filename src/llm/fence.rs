/// Removes a markdown code fence around model output, with or without a language tag.
///
/// Only a leading opener and a trailing closer are touched; anything else is returned
/// as the model wrote it, minus surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    let mut sql = raw.trim();

    if let Some(rest) = sql.strip_prefix("```") {
        sql = strip_language_tag(rest);
    }
    if let Some(rest) = sql.strip_suffix("```") {
        sql = rest;
    }

    sql.trim().to_string()
}

fn strip_language_tag(rest: &str) -> &str {
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    let (tag, after) = rest.split_at(tag_len);

    if tag.is_empty() {
        return rest;
    }
    // "```sql\n..." puts the tag on its own line; "```sql SELECT ..." is still a tag if it names SQL.
    let on_own_line = after.trim_start_matches([' ', '\t', '\r']).starts_with('\n');
    if on_own_line || is_sql_tag(tag) {
        after
    } else {
        rest
    }
}

fn is_sql_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "sql" | "postgresql" | "postgres" | "pgsql" | "psql"
    )
}

/// Whether the statement starts with a read-only verb.
pub fn is_read_only(sql: &str) -> bool {
    let first_word = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();

    matches!(
        first_word.as_str(),
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "VALUES" | "TABLE"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "SELECT v.name, SUM(i.total) AS total_spend\nFROM vendors v JOIN invoices i ON v.id = i.vendor_id\nGROUP BY v.id, v.name ORDER BY total_spend DESC LIMIT 5;";

    #[test]
    fn fenced_output_matches_unfenced_output() {
        let unfenced = strip_code_fences(STATEMENT);
        for wrapped in [
            format!("```sql\n{}\n```", STATEMENT),
            format!("```SQL\n{}\n```", STATEMENT),
            format!("```postgresql\n{}\n```", STATEMENT),
            format!("```\n{}\n```", STATEMENT),
            format!("  ```sql\n{}\n```  \n", STATEMENT),
            format!("```sql {}```", STATEMENT),
        ] {
            assert_eq!(strip_code_fences(&wrapped), unfenced, "input: {:?}", wrapped);
        }
        assert_eq!(unfenced, STATEMENT);
    }

    #[test]
    fn unfenced_output_is_only_trimmed() {
        assert_eq!(strip_code_fences("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn closer_without_opener_is_removed() {
        assert_eq!(strip_code_fences("SELECT 1;\n```"), "SELECT 1;");
    }

    #[test]
    fn statement_directly_after_bare_fence_is_kept() {
        assert_eq!(strip_code_fences("```SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn empty_fence_yields_empty_text() {
        assert_eq!(strip_code_fences("```sql\n```"), "");
        assert_eq!(strip_code_fences("   "), "");
    }

    #[test]
    fn read_only_detection() {
        assert!(is_read_only("SELECT * FROM invoices"));
        assert!(is_read_only("  with recent AS (SELECT 1) SELECT * FROM recent"));
        assert!(is_read_only("(SELECT 1) UNION (SELECT 2)"));
        assert!(!is_read_only("DELETE FROM invoices"));
        assert!(!is_read_only("DROP TABLE vendors"));
        assert!(!is_read_only(""));
    }
}
