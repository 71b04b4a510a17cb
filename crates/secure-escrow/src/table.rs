//! Escrow table view model.

use secure_escrow_core::{EscrowRecord, EscrowStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowRow {
    pub key: usize,
    pub arbiter: String,
    pub beneficiary: String,
    /// Deposit in ether, e.g. `1.0` or `0.25`.
    pub amount: String,
    pub address: String,
    /// Button label; always the current status.
    pub action_label: &'static str,
    /// Whether pressing the button triggers an approval.
    pub actionable: bool,
    /// False for escrows loaded from storage that were not reattached yet.
    pub handle_live: bool,
}

impl EscrowRow {
    pub fn from_record(key: usize, record: &EscrowRecord, handle_live: bool) -> Self {
        Self {
            key,
            arbiter: record.arbiter.to_string(),
            beneficiary: record.beneficiary.to_string(),
            amount: trim_ether(&record.deposit_ether()),
            address: record.contract_address.to_string(),
            action_label: record.status.label(),
            actionable: record.status == EscrowStatus::NotApproved,
            handle_live,
        }
    }
}

/// Drops trailing zeros from a fixed 18-decimal ether string, keeping one decimal.
pub fn trim_ether(formatted: &str) -> String {
    match formatted.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

pub fn render(rows: &[EscrowRow]) -> String {
    if rows.is_empty() {
        return "no escrows yet".to_owned();
    }
    let mut out = format!(
        "{:<4}{:<44}{:<44}{:<44}{:>14}  {}\n",
        "#", "Contract", "Arbiter", "Beneficiary", "Amount (Eth)", "Status"
    );
    for row in rows {
        let marker = if row.actionable && !row.handle_live {
            " (reattach to approve)"
        } else {
            ""
        };
        out.push_str(&format!(
            "{:<4}{:<44}{:<44}{:<44}{:>14}  [{}]{}\n",
            row.key,
            row.address,
            row.arbiter,
            row.beneficiary,
            row.amount,
            row.action_label,
            marker
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn ether_amounts_are_trimmed() {
        assert_eq!(trim_ether("1.000000000000000000"), "1.0");
        assert_eq!(trim_ether("0.250000000000000000"), "0.25");
        assert_eq!(trim_ether("12"), "12.0");
    }

    #[test]
    fn row_reflects_status() {
        let mut record = EscrowRecord::new(
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            Address::repeat_byte(0x33),
            U256::from(1_500_000_000_000_000_000u64),
        );
        let row = EscrowRow::from_record(0, &record, true);
        assert_eq!(row.amount, "1.5");
        assert_eq!(row.action_label, "Not Approved");
        assert!(row.actionable);

        record.status = EscrowStatus::Approved;
        let row = EscrowRow::from_record(0, &record, true);
        assert_eq!(row.action_label, "Approved");
        assert!(!row.actionable);

        let table = render(&[row]);
        assert!(table.contains("[Approved]"));
        assert!(!table.contains("reattach"));
    }
}
