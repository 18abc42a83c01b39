// Entry point and console flow.
//
// - Option [1] loads the reservation feed and prints load diagnostics.
// - Option [2] forecasts the selected regions over the configured date range
//   for the chart and projection export, ranks every region over the whole
//   feed and writes the artifacts.
// Forecasts stay cached between runs of option [2] until their TTL expires.
use chrono::Utc;
use reservation_trends::cache::ForecastCache;
use reservation_trends::config::Settings;
use reservation_trends::forecast::SeasonalNaive;
use reservation_trends::loader::{apply_filters, load_observations};
use reservation_trends::output;
use reservation_trends::reports::{self, RANKING_CSV_FILE};
use reservation_trends::types::Observation;
use reservation_trends::util::format_int;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "RESERVATION_TRENDS_CONFIG";

struct AppState {
    settings: Settings,
    data: Option<Vec<Observation>>,
    cache: ForecastCache,
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask whether to go back to the menu after generating reports.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to menu (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn handle_load(state: &mut AppState) {
    let path = &state.settings.input_path;
    match load_observations(path, state.settings.delimiter_byte()) {
        Ok((data, report)) => {
            let filtered = apply_filters(&data, &state.settings).len();
            println!(
                "Processing feed... ({} rows read, {} loaded, {} after filters, {} regions)",
                format_int(report.total_rows),
                format_int(report.loaded_rows),
                format_int(filtered),
                format_int(report.regions)
            );
            if report.skipped_rows > 0 {
                println!(
                    "Note: {} rows skipped (missing region or unreadable period).",
                    format_int(report.skipped_rows)
                );
            }
            if report.unparseable_values > 0 {
                println!(
                    "Note: {} values could not be parsed and are excluded from totals.",
                    format_int(report.unparseable_values)
                );
            }
            println!();
            state.data = Some(data);
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load feed");
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

fn handle_generate_reports(state: &mut AppState) {
    let Some(data) = state.data.as_ref() else {
        println!("Error: No data loaded. Please load the feed first (option 1).\n");
        return;
    };

    println!("Forecasting {} months ahead...\n", state.settings.horizon_months);
    let generated = reports::generate_reports(
        data,
        &state.settings,
        &SeasonalNaive::default(),
        &mut state.cache,
        Utc::now(),
    );

    for skipped in &generated.batch.skipped {
        println!("Warning: no forecast for {} ({})", skipped.region, skipped.error);
    }

    println!("Projeção mensal por UF\n");
    output::preview_table_rows(&generated.projection, 12);

    println!("Ranking Geral de UFs ({})\n", state.settings.target_year);
    output::preview_ranking(&generated.ranking, 10);

    if !generated.conversions.is_empty() {
        println!("Conversão anual por UF\n");
        output::preview_table_rows(&output::conversion_table(&generated.conversions), 10);
    }

    match reports::write_reports(&generated, &state.settings) {
        Ok(paths) => {
            for p in &paths {
                println!("Saved {}", p.display());
            }
            println!(
                "(Full ranking exported to {})\n",
                state.settings.output_dir.join(RANKING_CSV_FILE).display()
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to write reports");
            eprintln!("Write error: {}\n", e);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let settings = match Settings::load(config_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid settings: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        input = %settings.input_path.display(),
        horizon = settings.horizon_months,
        target_year = settings.target_year,
        "Starting"
    );

    let mut state = AppState {
        cache: ForecastCache::new(settings.cache_ttl()),
        settings,
        data: None,
    };

    loop {
        println!("Reservation trends:");
        println!("[1] Load the feed");
        println!("[2] Generate forecasts and rankings\n");
        match read_choice().as_str() {
            "1" => handle_load(&mut state),
            "2" => {
                println!();
                handle_generate_reports(&mut state);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
}
