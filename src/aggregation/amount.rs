use {
    crate::{error::MalformedEventError, model::Transfer},
    bigdecimal::{BigDecimal, Zero},
    std::str::FromStr,
};

/// Parse a transfer amount without any floating point step
///
/// Only plain decimal text is accepted: an optional sign, digits and an
/// optional fraction. Exponent notation is rejected, since a huge exponent
/// would blow up the scale of every sum it joins.
pub fn parse_amount(raw: &str) -> Result<BigDecimal, MalformedEventError> {
    let text = raw.trim();
    if !is_plain_decimal(text) {
        return Err(MalformedEventError::Amount(raw.to_string()));
    }
    BigDecimal::from_str(text).map_err(|_| MalformedEventError::Amount(raw.to_string()))
}

fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };

    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match fraction {
        Some(fraction) => {
            digits(whole) && digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && digits(whole),
    }
}

/// Running decimal sum that counts unparseable amounts as zero
#[derive(Debug, Clone)]
pub struct AmountSum {
    total: BigDecimal,
    malformed: usize,
}

impl AmountSum {
    pub fn new() -> Self {
        Self {
            total: BigDecimal::zero(),
            malformed: 0,
        }
    }

    pub fn add(&mut self, transfer: &Transfer) {
        match parse_amount(&transfer.amount) {
            Ok(amount) => self.total += amount,
            Err(e) => {
                log::warn!("Transfer {} has malformed amount, counted as 0: {}", transfer.id, e);
                self.malformed += 1;
            }
        }
    }

    pub fn total(&self) -> &BigDecimal {
        &self.total
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }

    pub fn into_parts(self) -> (BigDecimal, usize) {
        (self.total, self.malformed)
    }
}

impl Default for AmountSum {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_transfer;

    #[test]
    fn test_sum_is_exact() {
        let mut sum = AmountSum::new();
        for amount in ["0.1", "0.2", "0.3"] {
            sum.add(&test_transfer(1, 1, amount));
        }
        assert_eq!(sum.total().to_string(), "0.6");
        assert_eq!(sum.malformed(), 0);
    }

    #[test]
    fn test_large_token_amounts() {
        let mut sum = AmountSum::new();
        sum.add(&test_transfer(1, 1, "115792089237316195423570985008687907853269984665640564039457"));
        sum.add(&test_transfer(2, 1, "1"));
        assert_eq!(
            sum.total().to_string(),
            "115792089237316195423570985008687907853269984665640564039458"
        );
    }

    #[test]
    fn test_malformed_amount_counts_as_zero() {
        let mut sum = AmountSum::new();
        sum.add(&test_transfer(1, 1, "not-a-number"));
        sum.add(&test_transfer(2, 1, "2"));

        let (total, malformed) = sum.into_parts();
        assert_eq!(total.to_string(), "2");
        assert_eq!(malformed, 1);
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_exponent_amount_counts_as_zero() {
        let mut sum = AmountSum::new();
        sum.add(&test_transfer(1, 10, "1e-20000000"));
        sum.add(&test_transfer(2, 10, "1"));

        let (total, malformed) = sum.into_parts();
        assert_eq!(total.to_string(), "1");
        assert_eq!(malformed, 1);

        for raw in ["1e5", "2E3", "1.5e+7", ".", "-", "1.2.3", "0x10", "1_000"] {
            assert!(parse_amount(raw).is_err(), "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_plain_decimal_forms() {
        for (raw, expected) in [("-2.5", "-2.5"), ("+3", "3"), (" 007 ", "7"), ("0.000001", "0.000001")] {
            assert_eq!(parse_amount(raw).unwrap(), BigDecimal::from_str(expected).unwrap());
        }
    }
}
