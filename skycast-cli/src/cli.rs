use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use skycast_core::{
    CityLookup, Config, FileStorage, HttpCityLookup, LookupError, TemperatureUnit, ThemeScheduler,
    WeatherRecord, WeatherStore, fahrenheit_from_celsius,
};
use std::{fmt, io::IsTerminal, sync::Arc};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "City weather lookup with favorites")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Look up a city and show its current weather.
    Search {
        /// City name, or a prefix of one.
        city: String,
    },

    /// List recent lookups, most recent first.
    Recent,

    /// List favorite cities.
    Favorites,

    /// Star a city, or unstar it if already starred.
    Favorite {
        /// City name.
        city: String,
    },

    /// Toggle between Celsius and Fahrenheit display.
    Unit,

    /// Show the time-derived display theme.
    Theme {
        /// Keep running and print each recomputation until Ctrl-C.
        #[arg(long)]
        watch: bool,
    },

    /// Configure the city directory service.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Search { city } => {
                let (config, store) = open_app()?;
                search(&city, &config, &store).await
            }
            Command::Recent => {
                let (_, store) = open_app()?;
                list(&store.recent_searches(), &store, "No recent searches yet.");
                Ok(())
            }
            Command::Favorites => {
                let (_, store) = open_app()?;
                list(
                    &store.favorites(),
                    &store,
                    "No favorite cities yet. Star one with `skycast favorite <city>`.",
                );
                Ok(())
            }
            Command::Favorite { city } => {
                let (config, store) = open_app()?;
                favorite(&city, &config, &store).await
            }
            Command::Unit => {
                let (_, store) = open_app()?;
                store.toggle_temperature_unit();
                let unit = TemperatureUnit::from_celsius_flag(store.use_celsius());
                println!("Temperatures now display in {}.", unit.symbol());
                Ok(())
            }
            Command::Theme { watch } => theme(watch).await,
            Command::Configure => configure(),
        }
    }
}

/// Load config, open durable storage and hydrate the store from it.
fn open_app() -> Result<(Config, WeatherStore)> {
    let config = Config::load()?;
    let storage = FileStorage::open()?;
    let store = WeatherStore::new(Arc::new(storage));
    store.hydrate();
    Ok((config, store))
}

async fn search(query: &str, config: &Config, store: &WeatherStore) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        bail!("City name must not be empty");
    }

    let record = lookup_city(query, config).await?;
    store.set_current_weather(record.clone());
    print_card(&record, store);
    Ok(())
}

async fn favorite(query: &str, config: &Config, store: &WeatherStore) -> Result<()> {
    // Prefer a record the store already knows so toggling an existing
    // favorite works offline; fall back to a fresh lookup.
    let record = match resolve_known_city(query, store) {
        Some(record) => record,
        None => lookup_city(query.trim(), config).await?,
    };

    let id = record.id;
    let city = record.city.clone();
    store.toggle_favorite(record);

    if store.is_favorite(id) {
        println!("Starred {city}.");
    } else {
        println!("Unstarred {city}.");
    }
    Ok(())
}

async fn theme(watch: bool) -> Result<()> {
    let scheduler = ThemeScheduler::new();
    if !watch {
        println!("{}", scheduler.current().label());
        return Ok(());
    }

    let mut rx = scheduler.subscribe();
    rx.borrow_and_update();
    scheduler.start();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", rx.borrow_and_update().label());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.stop();
    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let url = Text::new("City directory base URL:")
        .with_initial_value(&config.api_base_url)
        .prompt()
        .context("Configuration prompt aborted")?;

    let url = url.trim();
    if url.is_empty() {
        bail!("Base URL must not be empty");
    }

    config.api_base_url = url.trim_end_matches('/').to_string();
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn lookup_city(query: &str, config: &Config) -> Result<WeatherRecord> {
    let lookup = HttpCityLookup::new(config.api_base_url.clone())?;

    let matches = match lookup.search(query).await {
        Ok(matches) => matches,
        Err(LookupError::NotFound) => {
            bail!("City not found. Please try another city name.")
        }
        Err(err) => {
            return Err(err).context(
                "Failed to fetch weather data. Is the city directory service reachable?",
            );
        }
    };

    choose_match(matches)
}

struct CityChoice(WeatherRecord);

impl fmt::Display for CityChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.2}, {:.2})", self.0.city, self.0.lat, self.0.lon)
    }
}

/// Pick one record out of a non-empty match list: interactively when
/// attached to a terminal, otherwise the directory's closest match.
fn choose_match(mut matches: Vec<WeatherRecord>) -> Result<WeatherRecord> {
    if matches.len() == 1 || !std::io::stdin().is_terminal() {
        return Ok(matches.remove(0));
    }

    let choices: Vec<CityChoice> = matches.into_iter().map(CityChoice).collect();
    let chosen = Select::new("Several cities match; pick one:", choices)
        .prompt()
        .context("City selection aborted")?;

    Ok(chosen.0)
}

/// Find a record the store already holds, matching by name.
fn resolve_known_city(query: &str, store: &WeatherStore) -> Option<WeatherRecord> {
    let query = query.trim();
    let state = store.snapshot();
    state
        .current_weather
        .into_iter()
        .chain(state.recent_searches)
        .chain(state.favorites)
        .find(|record| record.city.eq_ignore_ascii_case(query))
}

fn print_card(record: &WeatherRecord, store: &WeatherStore) {
    let condition = record.condition();
    let star = if store.is_favorite(record.id) { " ★" } else { "" };
    println!("{} {}{}", condition.glyph(), record.city, star);
    println!("  {}  {}", format_temperature(record, store.use_celsius()), condition.label());
    println!("  humidity {}%  wind {} km/h", record.humidity, record.wind_speed);
}

fn list(records: &[WeatherRecord], store: &WeatherStore, empty_message: &str) {
    if records.is_empty() {
        println!("{empty_message}");
        return;
    }
    for record in records {
        let star = if store.is_favorite(record.id) { " ★" } else { "" };
        println!(
            "{} {:<18} {:>7}  {}{}",
            record.condition().glyph(),
            record.city,
            format_temperature(record, store.use_celsius()),
            record.condition().label(),
            star,
        );
    }
}

fn format_temperature(record: &WeatherRecord, use_celsius: bool) -> String {
    match TemperatureUnit::from_celsius_flag(use_celsius) {
        TemperatureUnit::Celsius => format!("{}°C", record.temperature),
        TemperatureUnit::Fahrenheit => {
            format!("{}°F", fahrenheit_from_celsius(record.temperature))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skycast_core::MemoryStorage;

    fn record(id: i64, city: &str, temperature: f64) -> WeatherRecord {
        WeatherRecord {
            id,
            city: city.to_string(),
            temperature,
            weather: "Sunny".to_string(),
            humidity: 50,
            wind_speed: 10.0,
            lat: 0.0,
            lon: 0.0,
        }
    }

    #[test]
    fn temperature_formatting_follows_the_flag() {
        let r = record(1, "Kyiv", 21.0);
        assert_eq!(format_temperature(&r, true), "21°C");
        assert_eq!(format_temperature(&r, false), "70°F");
    }

    #[test]
    fn celsius_display_is_unrounded() {
        let r = record(1, "Kyiv", 21.4);
        assert_eq!(format_temperature(&r, true), "21.4°C");
    }

    #[test]
    fn known_cities_resolve_case_insensitively() {
        let store = WeatherStore::new(Arc::new(MemoryStorage::new()));
        store.set_current_weather(record(1, "Kyiv", 10.0));
        store.toggle_favorite(record(2, "Lviv", 12.0));

        assert_eq!(resolve_known_city("kyiv", &store).map(|r| r.id), Some(1));
        assert_eq!(resolve_known_city("LVIV", &store).map(|r| r.id), Some(2));
        assert!(resolve_known_city("Odesa", &store).is_none());
    }
}
