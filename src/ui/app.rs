use {
    crate::{
        aggregation::Aggregates,
        config::Config,
        error::FilterError,
        model::Transfer,
        projection::{BlockFilter, FilterCriteria, ProjectionCache},
        store::StoreView,
    },
    crossterm::event::{KeyCode, KeyEvent, KeyModifiers},
    std::sync::Arc,
};

/// What the terminal loop should do after a key press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    ToggleLive,
    Reload,
}

/// Everything one draw call needs
#[derive(Debug, Clone)]
pub struct DashboardFrame {
    pub criteria: FilterCriteria,
    pub block_input: String,
    pub filter_error: Option<FilterError>,
    /// Projected view, already limited to the table row count
    pub rows: Vec<Transfer>,
    /// Size of the projected view before the row limit
    pub matching: usize,
    pub aggregates: Arc<Aggregates>,
}

/// Dashboard interaction state: filter input and memoized derivations
pub struct DashboardApp {
    criteria: FilterCriteria,
    block_input: String,
    filter_error: Option<FilterError>,
    cache: ProjectionCache,
    aggregates: Option<(u64, Arc<Aggregates>)>,
    chart_block_limit: usize,
    table_row_limit: usize,
}

impl DashboardApp {
    pub fn new(config: &Config) -> Self {
        Self {
            criteria: FilterCriteria::default(),
            block_input: String::new(),
            filter_error: None,
            cache: ProjectionCache::new(),
            aggregates: None,
            chart_block_limit: config.chart_block_limit,
            table_row_limit: config.table_row_limit,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn block_input(&self) -> &str {
        &self.block_input
    }

    pub fn filter_error(&self) -> Option<&FilterError> {
        self.filter_error.as_ref()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('s') => {
                self.criteria.sort = self.criteria.sort.toggled();
            }
            KeyCode::Char('l') => return Action::ToggleLive,
            KeyCode::Char('r') => return Action::Reload,
            KeyCode::Char('c') => self.set_block_input(""),
            KeyCode::Char(digit) if digit.is_ascii_digit() => {
                let mut text = self.block_input.clone();
                text.push(digit);
                self.set_block_input(&text);
            }
            KeyCode::Backspace => {
                let mut text = self.block_input.clone();
                text.pop();
                self.set_block_input(&text);
            }
            _ => {}
        }
        Action::None
    }

    /// Replace the block filter text
    ///
    /// Invalid text is kept for display but leaves the active filter as it was.
    pub fn set_block_input(&mut self, text: &str) {
        self.block_input = text.to_string();
        match BlockFilter::parse(text) {
            Ok(block) => {
                self.criteria.block = block;
                self.filter_error = None;
            }
            Err(e) => {
                log::debug!("Ignoring block filter input: {}", e);
                self.filter_error = Some(e);
            }
        }
    }

    pub fn frame(&mut self, view: &StoreView) -> DashboardFrame {
        let projected = self.cache.get(view.version, &view.transfers, &self.criteria);

        let generation = self.cache.recomputed();
        let aggregates = match &self.aggregates {
            Some((computed_for, aggregates)) if *computed_for == generation => aggregates.clone(),
            _ => {
                let aggregates = Arc::new(Aggregates::derive(
                    &projected,
                    &self.criteria,
                    self.chart_block_limit,
                ));
                self.aggregates = Some((generation, aggregates.clone()));
                aggregates
            }
        };

        DashboardFrame {
            criteria: self.criteria.clone(),
            block_input: self.block_input.clone(),
            filter_error: self.filter_error.clone(),
            rows: projected.iter().take(self.table_row_limit).cloned().collect(),
            matching: projected.len(),
            aggregates,
        }
    }
}
