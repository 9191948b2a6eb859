// Formatting utilities shared by the layout widgets

use {
    crate::{aggregation::BlockTotal, model::Transfer},
    bigdecimal::{BigDecimal, ToPrimitive, Zero},
};

/// Height of the tallest bar in the block total chart
pub const BAR_SCALE: u64 = 1_000;

/// Format a decimal amount without trailing zeros
pub fn format_amount(amount: &BigDecimal) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }
    amount.normalized().to_string()
}

/// Scale block totals to integer bar heights, tallest = [`BAR_SCALE`]
///
/// Exact totals are kept for labels; only bar heights lose precision.
pub fn bar_heights(totals: &[BlockTotal]) -> Vec<u64> {
    let max = totals
        .iter()
        .map(|t| &t.total)
        .max()
        .cloned()
        .unwrap_or_else(BigDecimal::zero);

    if max <= BigDecimal::zero() {
        return vec![0; totals.len()];
    }

    let scale = BigDecimal::from(BAR_SCALE);
    totals
        .iter()
        .map(|t| {
            let height = &t.total * &scale / &max;
            height.round(0).to_u64().unwrap_or(0)
        })
        .collect()
}

/// Horizontal bar for a share in 0.0..=1.0
pub fn share_bar(share: f64, width: usize) -> String {
    let filled = ((share.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Time of day the indexer recorded the transfer
pub fn format_created_at(transfer: &Transfer) -> String {
    transfer
        .created_at_utc()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_transfer;
    use std::str::FromStr;

    fn total(block_number: i64, amount: &str) -> BlockTotal {
        BlockTotal {
            block_number,
            total: BigDecimal::from_str(amount).unwrap(),
        }
    }

    #[test]
    fn test_bar_heights_relative_to_max() {
        let heights = bar_heights(&[total(1, "8"), total(2, "2"), total(3, "0")]);
        assert_eq!(heights, vec![1000, 250, 0]);

        assert_eq!(bar_heights(&[total(1, "0")]), vec![0]);
        assert!(bar_heights(&[]).is_empty());
    }

    #[test]
    fn test_bar_heights_huge_totals() {
        let heights = bar_heights(&[
            total(1, "115792089237316195423570985008687907853269984665640564039457"),
            total(2, "57896044618658097711785492504343953926634992332820282019728.5"),
        ]);
        assert_eq!(heights, vec![1000, 500]);
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_amount(&BigDecimal::from_str("2.500").unwrap()), "2.5");
        assert_eq!(format_amount(&BigDecimal::from_str("0.000").unwrap()), "0");
        assert_eq!(share_bar(0.5, 4), "██░░");
        assert_eq!(share_bar(2.0, 3), "███");

        let mut transfer = test_transfer(1, 1, "1");
        assert_eq!(format_created_at(&transfer), "N/A");
        transfer.created_at = Some("2025-10-02T10:15:00Z".into());
        assert_eq!(format_created_at(&transfer), "10:15:00");
    }
}
