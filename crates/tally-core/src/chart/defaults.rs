//! Built-in starter charts, keyed by entity type.

use crate::model::{Account, AccountType};

/// The default chart of accounts for an entity type. Unknown entity types
/// fall back to the single-member LLC chart.
#[must_use]
pub fn default_chart(entity_type: &str) -> Vec<Account> {
    // Only one built-in chart so far; unknown entity types get the same
    // starter set.
    match entity_type {
        "llc_single_member" => llc_single_member(),
        _ => llc_single_member(),
    }
}

fn llc_single_member() -> Vec<Account> {
    fn account(
        id: i64,
        name: &str,
        account_type: AccountType,
        tax_line: &str,
        description: &str,
    ) -> Account {
        Account {
            id,
            name: name.to_string(),
            account_type,
            parent_id: None,
            tax_line: tax_line.to_string(),
            description: description.to_string(),
        }
    }

    vec![
        account(
            1010,
            "Business Checking",
            AccountType::Asset,
            "",
            "Primary checking account",
        ),
        account(1020, "Business Savings", AccountType::Asset, "", "Savings account"),
        account(
            2010,
            "Credit Card",
            AccountType::Liability,
            "",
            "Business credit card",
        ),
        account(3010, "Owner's Equity", AccountType::Equity, "", "Owner's equity"),
        account(4010, "Service Revenue", AccountType::Revenue, "", ""),
        account(4020, "Product Revenue", AccountType::Revenue, "", ""),
        account(
            5010,
            "Advertising & Marketing",
            AccountType::Expense,
            "schedule_c_8",
            "Advertising costs",
        ),
        account(
            5020,
            "Software & SaaS",
            AccountType::Expense,
            "schedule_c_18",
            "Software subscriptions",
        ),
        account(
            5030,
            "Office Supplies",
            AccountType::Expense,
            "schedule_c_18",
            "Office supplies and expenses",
        ),
        account(
            5040,
            "Professional Services",
            AccountType::Expense,
            "schedule_c_17",
            "Legal, accounting, consulting",
        ),
        account(
            5050,
            "Shipping & Postage",
            AccountType::Expense,
            "schedule_c_18",
            "Postage and shipping costs",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chart_ids_are_unique() {
        let chart = default_chart("llc_single_member");
        let mut ids: Vec<i64> = chart.iter().map(|a| a.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), chart.len());
    }

    #[test]
    fn test_unknown_entity_type_falls_back() {
        assert_eq!(
            default_chart("c_corp"),
            default_chart("llc_single_member")
        );
    }
}
