use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tracing::{error, info};

use slowquery_console::app::{copy_to, App};
use slowquery_console::config::{Overrides, Settings};
use slowquery_console::data::YearMonth;
use slowquery_console::export::{snapshot, write_snapshot, SnapshotSizes};
use slowquery_console::logging::init_logging;
use slowquery_console::{events, ui, ApiClient, BackendSource};

#[derive(Parser, Debug)]
#[command(name = "slowquery-console")]
#[command(about = "Terminal dashboard for MySQL/Aurora slow queries, CloudWatch slow logs and RDS inventory")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (e.g. http://localhost:8000)
    #[arg(short, long)]
    api_url: Option<String>,

    /// Log file (the terminal is used by the dashboard)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory for downloaded markdown EXPLAIN reports
    #[arg(short, long)]
    download_dir: Option<PathBuf>,

    /// Export a JSON snapshot of the backend to a file and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Statistics month of the export (YYYY-MM); defaults to last month
    #[arg(short, long, requires = "export")]
    month: Option<YearMonth>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        api_base_url: args.api_url.clone(),
        log_file: args.log_file.clone(),
        download_dir: args.download_dir.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;
    let _guard = init_logging(&settings.log_file)?;
    info!(api_base_url = %settings.api_base_url, "Starting");

    let rt = tokio::runtime::Runtime::new()?;
    let client = ApiClient::new(settings.api_config()?)?;

    // Non-interactive export
    if let Some(export_path) = args.export {
        let month = args
            .month
            .unwrap_or_else(|| YearMonth::default_for(Local::now().date_naive()));
        let sizes = SnapshotSizes {
            queries: settings.query_page_size,
            plans: settings.plan_page_size,
        };
        let snapshot = rt.block_on(snapshot(&client, month, sizes));
        write_snapshot(&snapshot, &export_path)?;
        println!("Exported snapshot to: {}", export_path.display());
        for failure in &snapshot.failures {
            eprintln!("  failed: {}", failure);
        }
        return Ok(());
    }

    let source = BackendSource::spawn(rt.handle(), client, settings.watch_config()?);
    let mut app = App::new(Box::new(source), settings.app_config()?);
    app.start();

    let result = run_tui(&mut app);
    if let Err(e) = &result {
        error!(error = %e, "Dashboard exited with an error");
    }
    rt.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Run the TUI until the user quits.
fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    let mut content_start_row = 2;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5)
                    .intersection(area);
                frame.render_widget(paragraph, centered);
                return;
            }

            content_start_row =
                ui::ScreenLayout::new(area, app.current_banner().is_some()).content.y;
            ui::draw(frame, app);
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse, content_start_row),
                _ => {}
            }
        }

        app.tick();

        if let Some(text) = app.take_clipboard() {
            copy_to(terminal.backend_mut(), &text).context("Failed to write to the clipboard")?;
        }
    }

    Ok(())
}
