use {
    super::app::{Action, DashboardApp},
    crate::{config::Config, store::StoreHandle},
    ratatui::{backend::CrosstermBackend, Terminal},
    std::time::{Duration, Instant},
};

/// Run the TUI event loop until the user quits
///
/// Handles keyboard input, terminal resize, and adaptive refresh throttling
pub async fn run_ui(handle: StoreHandle, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    crossterm::terminal::enable_raw_mode()?;

    // Alternate screen keeps the dashboard apart from stderr logs
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::cursor::Hide
    )?;
    terminal.clear()?;

    let result = event_loop(&mut terminal, handle, config).await;

    // Restore terminal state even when the loop failed
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    crossterm::terminal::disable_raw_mode()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    handle: StoreHandle,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut app = DashboardApp::new(config);

    // Track ingest rate for adaptive refresh
    let mut last_version = handle.view().version;
    let mut last_refresh = Instant::now();
    let mut rate_samples: Vec<f64> = Vec::new();

    loop {
        let view = handle.view();

        let changes = view.version.saturating_sub(last_version);
        let elapsed = last_refresh.elapsed();
        if elapsed.as_secs_f64() > 0.0 {
            rate_samples.push(changes as f64 / elapsed.as_secs_f64());
            if rate_samples.len() > 10 {
                rate_samples.remove(0);
            }
        }
        let avg_changes_per_sec = if rate_samples.is_empty() {
            0.0
        } else {
            rate_samples.iter().sum::<f64>() / rate_samples.len() as f64
        };

        // Busy streams redraw less often: min(1s, 250ms x (rate / 10))
        let base_interval = Duration::from_millis(250);
        let throttle_factor = (avg_changes_per_sec / 10.0).max(1.0);
        let refresh_interval = base_interval.mul_f64(throttle_factor).min(Duration::from_secs(1));

        let frame = app.frame(&view);
        terminal.draw(|f| {
            let area = f.size();
            super::layout::render_layout(f, area, &frame, &view);
        })?;

        last_version = view.version;
        last_refresh = Instant::now();

        if !crossterm::event::poll(refresh_interval)? {
            continue;
        }
        let crossterm::event::Event::Key(key) = crossterm::event::read()? else {
            continue;
        };
        if key.kind != crossterm::event::KeyEventKind::Press {
            continue;
        }

        match app.handle_key(key) {
            Action::Quit => break,
            Action::ToggleLive if view.subscription.is_live() => {
                handle.stop_live_updates().await;
            }
            Action::ToggleLive => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle.start_live_updates().await {
                        log::warn!("Live updates not started: {}", e);
                    }
                });
            }
            Action::Reload => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle.load_initial_snapshot().await {
                        log::warn!("Reload failed: {}", e);
                    }
                });
            }
            Action::None => {}
        }
    }

    Ok(())
}
