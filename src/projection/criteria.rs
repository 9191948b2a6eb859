use {
    crate::{error::FilterError, model::Transfer},
    chrono::{DateTime, Utc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// Block number prefix, e.g. `18` matches blocks 18, 180 and 1800 but not 218
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockFilter(String);

impl BlockFilter {
    /// Parse user input; blank input means "no block filter"
    pub fn parse(text: &str) -> Result<Option<Self>, FilterError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FilterError::NotNumeric(text.to_string()));
        }
        Ok(Some(Self(text.to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, block_number: i64) -> bool {
        block_number.to_string().starts_with(&self.0)
    }

    /// The block named by the full filter text
    pub fn exact_block(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

/// Everything the user can narrow the transfer view by
///
/// Each criterion is either present or absent; an absent criterion matches
/// every transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    pub sort: SortDirection,
    pub block: Option<BlockFilter>,
    /// Token contract address
    pub token: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl FilterCriteria {
    pub fn with_sort(mut self, sort: SortDirection) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_block(mut self, block: Option<BlockFilter>) -> Self {
        self.block = block;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = non_empty(token.into());
        self
    }

    pub fn with_from_address(mut self, address: impl Into<String>) -> Self {
        self.from_address = non_empty(address.into());
        self
    }

    pub fn with_to_address(mut self, address: impl Into<String>) -> Self {
        self.to_address = non_empty(address.into());
        self
    }

    pub fn with_date_range(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    /// True when any criterion other than the sort order is set
    pub fn is_filtering(&self) -> bool {
        self.block.is_some()
            || self.token.is_some()
            || self.from_address.is_some()
            || self.to_address.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
    }

    pub fn matches(&self, transfer: &Transfer) -> bool {
        if let Some(block) = &self.block {
            if !block.matches(transfer.block_number) {
                return false;
            }
        }

        if !address_matches(self.token.as_deref(), &transfer.contract_address)
            || !address_matches(self.from_address.as_deref(), &transfer.from_address)
            || !address_matches(self.to_address.as_deref(), &transfer.to_address)
        {
            return false;
        }

        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(created_at) = transfer.created_at_utc() else {
                return false;
            };
            if self.date_from.is_some_and(|from| created_at < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| created_at > to) {
                return false;
            }
        }

        true
    }
}

fn address_matches(wanted: Option<&str>, actual: &str) -> bool {
    wanted.map_or(true, |wanted| wanted.eq_ignore_ascii_case(actual.trim()))
}

fn non_empty(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
