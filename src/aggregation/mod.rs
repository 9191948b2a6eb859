//! Chart-ready aggregates derived from a projected transfer view
//!
//! - Per-block total amount (bar chart)
//! - Per-block transfer count and share (overview chart, no block filter)
//! - Per-sender totals inside one selected block
//!
//! All sums are exact decimals. An amount that does not parse contributes
//! zero and is counted in `malformed_amounts`; it never aborts the batch.

pub mod amount;

use {
    crate::{model::Transfer, projection::FilterCriteria},
    amount::AmountSum,
    bigdecimal::BigDecimal,
    std::collections::{BTreeMap, HashMap},
};

pub use amount::parse_amount;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockTotal {
    pub block_number: i64,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCount {
    pub block_number: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockShare {
    pub block_number: i64,
    pub count: usize,
    /// Fraction of the transfers across the blocks shown (0.0..=1.0)
    pub share: f64,
}

/// Display hint for long addresses: keep `head` leading and `tail` trailing chars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLabel {
    pub head: usize,
    pub tail: usize,
}

impl AddressLabel {
    pub const DEFAULT: AddressLabel = AddressLabel { head: 8, tail: 4 };

    pub fn apply(&self, address: &str) -> String {
        let chars: Vec<char> = address.chars().collect();
        if chars.len() <= self.head + self.tail {
            return address.to_string();
        }
        let head: String = chars[..self.head].iter().collect();
        let tail: String = chars[chars.len() - self.tail..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl Default for AddressLabel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressTotal {
    /// Full address, never truncated
    pub address: String,
    pub label: AddressLabel,
    pub total: BigDecimal,
}

impl AddressTotal {
    pub fn display_address(&self) -> String {
        self.label.apply(&self.address)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressBreakdown {
    pub block_number: i64,
    pub totals: Vec<AddressTotal>,
}

/// Sum amounts per block, keeping the `limit` highest block numbers (ascending)
pub fn block_totals(view: &[Transfer], limit: usize) -> Vec<BlockTotal> {
    block_totals_counted(view, limit).0
}

fn block_totals_counted(view: &[Transfer], limit: usize) -> (Vec<BlockTotal>, usize) {
    let mut sums: BTreeMap<i64, AmountSum> = BTreeMap::new();
    for transfer in view {
        sums.entry(transfer.block_number).or_default().add(transfer);
    }

    let malformed = sums.values().map(AmountSum::malformed).sum();
    let skip = sums.len().saturating_sub(limit);
    let totals = sums
        .into_iter()
        .skip(skip)
        .map(|(block_number, sum)| BlockTotal {
            block_number,
            total: sum.into_parts().0,
        })
        .collect();

    (totals, malformed)
}

/// Count transfers per block, keeping the `limit` highest block numbers (ascending)
pub fn block_counts(view: &[Transfer], limit: usize) -> Vec<BlockCount> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for transfer in view {
        *counts.entry(transfer.block_number).or_insert(0) += 1;
    }

    let skip = counts.len().saturating_sub(limit);
    counts
        .into_iter()
        .skip(skip)
        .map(|(block_number, count)| BlockCount { block_number, count })
        .collect()
}

/// Block counts with each block's share of the shown total
pub fn block_shares(view: &[Transfer], limit: usize) -> Vec<BlockShare> {
    let counts = block_counts(view, limit);
    let shown: usize = counts.iter().map(|c| c.count).sum();

    counts
        .into_iter()
        .map(|c| BlockShare {
            block_number: c.block_number,
            count: c.count,
            share: if shown == 0 { 0.0 } else { c.count as f64 / shown as f64 },
        })
        .collect()
}

/// Sum amounts by sender within one block
///
/// Ordered by total (largest first), ties in order of first appearance.
pub fn address_totals(view: &[Transfer], block_number: i64) -> Vec<AddressTotal> {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, AmountSum> = HashMap::new();

    for transfer in view.iter().filter(|t| t.block_number == block_number) {
        if !sums.contains_key(&transfer.from_address) {
            order.push(transfer.from_address.clone());
        }
        sums.entry(transfer.from_address.clone())
            .or_default()
            .add(transfer);
    }

    let mut totals: Vec<AddressTotal> = order
        .into_iter()
        .filter_map(|address| {
            let sum = sums.remove(&address)?;
            Some(AddressTotal {
                address,
                label: AddressLabel::DEFAULT,
                total: sum.into_parts().0,
            })
        })
        .collect();

    // Stable: equal totals keep first-appearance order
    totals.sort_by(|a, b| b.total.cmp(&a.total));
    totals
}

/// Block chosen through the filter: its full text names a block in the view
pub fn selected_block(view: &[Transfer], criteria: &FilterCriteria) -> Option<i64> {
    let block = criteria.block.as_ref()?.exact_block()?;
    view.iter()
        .any(|t| t.block_number == block)
        .then_some(block)
}

/// Everything the chart surfaces need for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub block_totals: Vec<BlockTotal>,
    pub block_counts: Vec<BlockCount>,
    /// Overview share chart, only without a block filter
    pub block_shares: Option<Vec<BlockShare>>,
    /// Sender breakdown, only when a single block is selected
    pub address_breakdown: Option<AddressBreakdown>,
    /// Transfers in the view whose amount failed to parse
    pub malformed_amounts: usize,
}

impl Aggregates {
    pub fn derive(view: &[Transfer], criteria: &FilterCriteria, limit: usize) -> Self {
        let (block_totals, malformed_amounts) = block_totals_counted(view, limit);

        let block_shares = criteria
            .block
            .is_none()
            .then(|| block_shares(view, limit));

        let address_breakdown = selected_block(view, criteria).map(|block_number| AddressBreakdown {
            block_number,
            totals: address_totals(view, block_number),
        });

        Self {
            block_totals,
            block_counts: block_counts(view, limit),
            block_shares,
            address_breakdown,
            malformed_amounts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::test_transfer, projection::BlockFilter};

    fn totals_as_strings(totals: &[BlockTotal]) -> Vec<(i64, String)> {
        totals
            .iter()
            .map(|t| (t.block_number, t.total.to_string()))
            .collect()
    }

    #[test]
    fn test_per_block_scenario() {
        let view = vec![
            test_transfer(1, 10, "5"),
            test_transfer(2, 10, "3"),
            test_transfer(3, 11, "2"),
        ];

        assert_eq!(
            totals_as_strings(&block_totals(&view, 5)),
            vec![(10, "8".to_string()), (11, "2".to_string())]
        );
        assert_eq!(
            block_counts(&view, 5),
            vec![
                BlockCount { block_number: 10, count: 2 },
                BlockCount { block_number: 11, count: 1 },
            ]
        );
    }

    #[test]
    fn test_most_recent_blocks_ascending() {
        let view: Vec<Transfer> = (1..=8)
            .rev()
            .map(|block| test_transfer(block, block, "1"))
            .collect();

        let blocks: Vec<i64> = block_totals(&view, 5).iter().map(|t| t.block_number).collect();
        assert_eq!(blocks, vec![4, 5, 6, 7, 8]);

        let blocks: Vec<i64> = block_counts(&view, 3).iter().map(|c| c.block_number).collect();
        assert_eq!(blocks, vec![6, 7, 8]);
    }

    #[test]
    fn test_malformed_amount_does_not_abort() {
        let view = vec![
            test_transfer(1, 10, "not-a-number"),
            test_transfer(2, 10, "1.5"),
        ];

        let aggregates = Aggregates::derive(&view, &FilterCriteria::default(), 5);
        assert_eq!(totals_as_strings(&aggregates.block_totals), vec![(10, "1.5".to_string())]);
        assert_eq!(aggregates.malformed_amounts, 1);
    }

    #[test]
    fn test_exponent_amount_keeps_block_total_exact() {
        let view = vec![
            test_transfer(1, 10, "1e-20000000"),
            test_transfer(2, 10, "1"),
        ];

        let (totals, malformed) = block_totals_counted(&view, 5);
        assert_eq!(totals_as_strings(&totals), vec![(10, "1".to_string())]);
        assert_eq!(malformed, 1);
    }

    #[test]
    fn test_shares_only_without_block_filter() {
        let view = vec![
            test_transfer(1, 10, "1"),
            test_transfer(2, 10, "1"),
            test_transfer(3, 11, "1"),
            test_transfer(4, 12, "1"),
        ];

        let aggregates = Aggregates::derive(&view, &FilterCriteria::default(), 5);
        let shares = aggregates.block_shares.unwrap();
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].count, 2);
        assert!((shares[0].share - 0.5).abs() < f64::EPSILON);
        assert!(aggregates.address_breakdown.is_none());

        let criteria = FilterCriteria::default().with_block(BlockFilter::parse("1").unwrap());
        let aggregates = Aggregates::derive(&view, &criteria, 5);
        assert!(aggregates.block_shares.is_none());
        // "1" is a prefix of every block but names none of them
        assert!(aggregates.address_breakdown.is_none());
    }

    #[test]
    fn test_address_breakdown_for_selected_block() {
        let mut a = test_transfer(1, 42, "1.25");
        a.from_address = "0x1234567890abcdef1234567890abcdef12345678".into();
        let mut b = test_transfer(2, 42, "5");
        b.from_address = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".into();
        let mut c = a.clone();
        c.id = 3;
        c.amount = "0.75".into();
        let other_block = test_transfer(4, 420, "100");

        let view = vec![a, b, c, other_block];
        let criteria = FilterCriteria::default().with_block(BlockFilter::parse("42").unwrap());
        let breakdown = Aggregates::derive(&view, &criteria, 5)
            .address_breakdown
            .unwrap();

        assert_eq!(breakdown.block_number, 42);
        assert_eq!(breakdown.totals.len(), 2);
        assert_eq!(breakdown.totals[0].total.to_string(), "5");
        assert_eq!(breakdown.totals[1].total.to_string(), "2.00");
        assert_eq!(
            breakdown.totals[1].address,
            "0x1234567890abcdef1234567890abcdef12345678"
        );
        assert_eq!(breakdown.totals[1].display_address(), "0x123456...5678");
    }

    #[test]
    fn test_address_label_short_address_untouched() {
        assert_eq!(AddressLabel::DEFAULT.apply("0xabc"), "0xabc");
        assert_eq!(AddressLabel { head: 2, tail: 2 }.apply("abcdef"), "ab...ef");
    }
}
