// Static prompt material. The schema is written by hand, not introspected from the database.

pub const SCHEMA_DESCRIPTION: &str = r#"
The database contains the following tables:
- vendors: Vendor information (id, name, email, phone, address, tax_id)
- customers: Customer information (id, name, email, phone, address, tax_id)
- invoices: Invoice headers (id, invoice_number, vendor_id, customer_id, issue_date, due_date, status, subtotal, tax, total, currency)
- line_items: Invoice line items (id, invoice_id, description, category, quantity, unit_price, amount)
- payments: Payment records (id, invoice_id, amount, payment_date, payment_method, reference_number)

Relationships:
- invoices.vendor_id -> vendors.id
- invoices.customer_id -> customers.id
- line_items.invoice_id -> invoices.id
- payments.invoice_id -> invoices.id

Status values: 'paid', 'pending', 'overdue', 'draft'
"#;

pub const SYSTEM_PROMPT: &str = "You are a SQL expert. Generate valid PostgreSQL queries based on natural language questions. Return only the SQL query, no explanations.";

/// Worked question/SQL pairs shown to the model.
pub const EXAMPLES: [(&str, &str); 3] = [
    (
        "What's the total spend in the last 90 days?",
        "SELECT SUM(total) as total_spend FROM invoices WHERE issue_date >= CURRENT_DATE - INTERVAL '90 days';",
    ),
    (
        "List top 5 vendors by spend",
        "SELECT v.name, SUM(i.total) as total_spend FROM vendors v JOIN invoices i ON v.id = i.vendor_id GROUP BY v.id, v.name ORDER BY total_spend DESC LIMIT 5;",
    ),
    (
        "Show overdue invoices as of today",
        "SELECT * FROM invoices WHERE status = 'overdue' AND due_date < CURRENT_DATE;",
    ),
];

pub fn build_user_prompt(question: &str, schema: &str) -> String {
    let examples = EXAMPLES
        .iter()
        .map(|(q, sql)| format!("- \"{}\" -> {}", q, sql))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
You are a SQL expert. Given the following database schema and a natural language query, generate a valid PostgreSQL SQL query.

Database Schema:
{}

Natural Language Query: {}

Generate ONLY the SQL query without any explanation or markdown formatting. Return just the SQL statement.

Example queries:
{}

SQL Query:
"#,
        schema, question, examples
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_schema_examples_and_question() {
        let prompt = build_user_prompt("Which customers paid late?", SCHEMA_DESCRIPTION);

        for table in ["vendors", "customers", "invoices", "line_items", "payments"] {
            assert!(prompt.contains(&format!("- {}:", table)), "missing table {}", table);
        }
        assert!(prompt.contains("invoices.vendor_id -> vendors.id"));
        assert!(prompt.contains("'paid', 'pending', 'overdue', 'draft'"));
        assert!(prompt.contains("Natural Language Query: Which customers paid late?"));
        for (question, sql) in EXAMPLES {
            assert!(prompt.contains(question));
            assert!(prompt.contains(sql));
        }
    }

    #[test]
    fn question_comes_after_schema() {
        let prompt = build_user_prompt("top vendors", SCHEMA_DESCRIPTION);
        let schema_at = prompt.find("Relationships:").unwrap();
        let question_at = prompt.find("top vendors").unwrap();
        assert!(schema_at < question_at);
    }
}
