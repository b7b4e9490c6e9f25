//! Authoritative client state for the app.
//!
//! [`WeatherStore`] owns the process-wide [`WeatherState`] and is its sole
//! mutator. Every mutation is mirrored to the injected [`StorageGateway`]
//! before the call returns, and registered listeners are invoked
//! synchronously with a snapshot of the new state. Presentation code reads
//! snapshots and calls the mutation operations; it never touches the state
//! directly.

use crate::model::WeatherRecord;
use crate::storage::StorageGateway;
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// Storage key for the recent-search history.
pub const RECENT_SEARCHES_KEY: &str = "recentSearches";
/// Storage key for the favorites list.
pub const FAVORITES_KEY: &str = "favorites";
/// Storage key for the unit preference flag.
pub const USE_CELSIUS_KEY: &str = "useCelsius";

/// Maximum number of entries kept in the recent-search history.
pub const RECENT_CAPACITY: usize = 5;

/// In-memory client state, hydrated from storage at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherState {
    /// Last successfully looked-up city.
    pub current_weather: Option<WeatherRecord>,
    /// Most-recent-first lookup history, at most [`RECENT_CAPACITY`] entries,
    /// unique by record id.
    pub recent_searches: Vec<WeatherRecord>,
    /// User-starred cities, unique by record id, in the order they were
    /// starred.
    pub favorites: Vec<WeatherRecord>,
    /// Display preference; storage is always Celsius.
    pub use_celsius: bool,
}

impl Default for WeatherState {
    fn default() -> Self {
        Self {
            current_weather: None,
            recent_searches: Vec::new(),
            favorites: Vec::new(),
            use_celsius: true,
        }
    }
}

type Listener = Arc<dyn Fn(&WeatherState) + Send + Sync>;

/// Handle returned by [`WeatherStore::subscribe`]; pass it back to
/// [`WeatherStore::unsubscribe`] to stop receiving notifications.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// State store with durable mirroring.
///
/// Mutations serialize on an internal mutex, and the storage write for a
/// mutation is issued while that mutex is held, so writes to any one key
/// always apply in mutation order. Write failures are logged and swallowed;
/// the in-memory state is authoritative either way.
pub struct WeatherStore {
    gateway: Arc<dyn StorageGateway>,
    state: Mutex<WeatherState>,
    listeners: Mutex<ListenerSet>,
}

impl WeatherStore {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(WeatherState::default()),
            listeners: Mutex::new(ListenerSet::default()),
        }
    }

    /// Read the three persisted keys and bulk-load them, falling back to
    /// defaults for anything absent or malformed. Called once at startup.
    pub fn hydrate(&self) {
        let recent = self.read_or_default(RECENT_SEARCHES_KEY, Vec::new());
        let favorites = self.read_or_default(FAVORITES_KEY, Vec::new());
        let use_celsius = self.read_or_default(USE_CELSIUS_KEY, true);

        self.load_stored_data(recent, favorites, use_celsius);
    }

    /// Bulk-replace the persisted fields with values that came from storage.
    /// Does not write back; the values are already durable.
    pub fn load_stored_data(
        &self,
        recent_searches: Vec<WeatherRecord>,
        favorites: Vec<WeatherRecord>,
        use_celsius: bool,
    ) {
        let snapshot = {
            let mut state = self.state.lock();
            state.recent_searches = recent_searches;
            state.favorites = favorites;
            state.use_celsius = use_celsius;
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Record a successful lookup.
    ///
    /// The record becomes the current weather. If its id is not yet in the
    /// recent history it is prepended and the history truncated to
    /// [`RECENT_CAPACITY`]; a repeat lookup of a known id leaves the existing
    /// entry untouched, neither promoted nor refreshed. The history is
    /// persisted on both paths.
    pub fn set_current_weather(&self, record: WeatherRecord) {
        let snapshot = {
            let mut state = self.state.lock();
            state.current_weather = Some(record.clone());
            if !state.recent_searches.iter().any(|w| w.id == record.id) {
                state.recent_searches.truncate(RECENT_CAPACITY - 1);
                state.recent_searches.insert(0, record);
            }
            self.persist(RECENT_SEARCHES_KEY, &state.recent_searches);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Star or unstar a city: removes the favorite with the same id if
    /// present, appends it otherwise.
    pub fn toggle_favorite(&self, record: WeatherRecord) {
        let snapshot = {
            let mut state = self.state.lock();
            match state.favorites.iter().position(|f| f.id == record.id) {
                Some(index) => {
                    state.favorites.remove(index);
                }
                None => state.favorites.push(record),
            }
            self.persist(FAVORITES_KEY, &state.favorites);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Flip the Celsius/Fahrenheit display preference.
    pub fn toggle_temperature_unit(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.use_celsius = !state.use_celsius;
            self.persist(USE_CELSIUS_KEY, &state.use_celsius);
            state.clone()
        };
        self.notify(&snapshot);
    }

    /// Clone of the full state.
    pub fn snapshot(&self) -> WeatherState {
        self.state.lock().clone()
    }

    pub fn current_weather(&self) -> Option<WeatherRecord> {
        self.state.lock().current_weather.clone()
    }

    pub fn recent_searches(&self) -> Vec<WeatherRecord> {
        self.state.lock().recent_searches.clone()
    }

    pub fn favorites(&self) -> Vec<WeatherRecord> {
        self.state.lock().favorites.clone()
    }

    pub fn use_celsius(&self) -> bool {
        self.state.lock().use_celsius
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.state.lock().favorites.iter().any(|f| f.id == id)
    }

    /// Register a listener invoked synchronously after each mutation with a
    /// snapshot of the new state.
    pub fn subscribe(
        &self,
        listener: impl Fn(&WeatherState) + Send + Sync + 'static,
    ) -> Subscription {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription { id }
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.listeners.lock().entries.retain(|(id, _)| *id != subscription.id);
    }

    fn notify(&self, state: &WeatherState) {
        // Clone the callbacks out so a listener can subscribe or mutate
        // without deadlocking on the listener lock.
        let entries: Vec<Listener> =
            self.listeners.lock().entries.iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in entries {
            listener(state);
        }
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode state for persistence");
                return;
            }
        };
        if let Err(err) = self.gateway.set(key, &json) {
            tracing::warn!(key, error = %err, "failed to persist state; keeping in-memory value");
        }
    }

    fn read_or_default<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.gateway.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding malformed persisted value");
                    default
                }
            },
            Ok(None) => default,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read persisted value");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: i64, city: &str) -> WeatherRecord {
        WeatherRecord {
            id,
            city: city.to_string(),
            temperature: 20.0,
            weather: "Sunny".to_string(),
            humidity: 50,
            wind_speed: 10.0,
            lat: 0.0,
            lon: 0.0,
        }
    }

    /// Gateway that records every write, in order.
    #[derive(Default)]
    struct LoggingStorage {
        writes: Mutex<Vec<(String, String)>>,
    }

    impl StorageGateway for LoggingStorage {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.writes.lock().push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    /// Gateway whose writes always fail.
    struct FailingStorage {
        failures: AtomicUsize,
    }

    impl FailingStorage {
        fn new() -> Self {
            Self { failures: AtomicUsize::new(0) }
        }
    }

    impl StorageGateway for FailingStorage {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("storage offline"))
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            self.failures.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("storage offline"))
        }
    }

    fn store_with_memory() -> (WeatherStore, Arc<MemoryStorage>) {
        let gateway = Arc::new(MemoryStorage::new());
        (WeatherStore::new(gateway.clone()), gateway)
    }

    #[test]
    fn recent_history_is_bounded() {
        let (store, _) = store_with_memory();
        for id in 0..20 {
            store.set_current_weather(record(id, &format!("city-{id}")));
        }
        assert_eq!(store.recent_searches().len(), RECENT_CAPACITY);
    }

    #[test]
    fn recent_history_never_holds_duplicate_ids() {
        let (store, _) = store_with_memory();
        for id in [1, 2, 1, 3, 2, 1] {
            store.set_current_weather(record(id, "town"));
        }
        let ids: Vec<i64> = store.recent_searches().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn repeat_search_keeps_existing_entry_in_place() {
        let (store, _) = store_with_memory();
        let mut first = record(1, "Kyiv");
        first.temperature = 10.0;
        store.set_current_weather(first);
        store.set_current_weather(record(2, "Lviv"));

        // Same city again, with fresher data. The history entry stays where
        // it was and keeps its old data; only current_weather updates.
        let mut refreshed = record(1, "Kyiv");
        refreshed.temperature = 25.0;
        store.set_current_weather(refreshed.clone());

        let recent = store.recent_searches();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, 2);
        assert_eq!(recent[1].id, 1);
        assert_eq!(recent[1].temperature, 10.0);
        assert_eq!(store.current_weather(), Some(refreshed));
    }

    #[test]
    fn full_history_evicts_the_oldest() {
        let (store, _) = store_with_memory();
        let stored: Vec<WeatherRecord> =
            (1..=5).map(|id| record(id, &format!("city-{id}"))).collect();
        // A=1 most recent .. E=5 oldest
        store.load_stored_data(stored, Vec::new(), true);

        store.set_current_weather(record(6, "city-6"));

        let ids: Vec<i64> = store.recent_searches().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![6, 1, 2, 3, 4]);
    }

    #[test]
    fn toggle_favorite_is_an_involution() {
        let (store, _) = store_with_memory();
        store.toggle_favorite(record(7, "Odesa"));
        assert!(store.is_favorite(7));

        store.toggle_favorite(record(7, "Odesa"));
        assert!(!store.is_favorite(7));
        assert!(store.favorites().is_empty());
    }

    #[test]
    fn favorites_preserve_insertion_order() {
        let (store, _) = store_with_memory();
        store.toggle_favorite(record(3, "c"));
        store.toggle_favorite(record(1, "a"));
        store.toggle_favorite(record(2, "b"));
        let ids: Vec<i64> = store.favorites().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn toggling_unit_twice_restores_preference() {
        let (store, _) = store_with_memory();
        assert!(store.use_celsius());
        store.toggle_temperature_unit();
        assert!(!store.use_celsius());
        store.toggle_temperature_unit();
        assert!(store.use_celsius());
    }

    #[test]
    fn mutations_mirror_to_storage() {
        let (store, gateway) = store_with_memory();
        store.set_current_weather(record(1, "Kyiv"));
        store.toggle_favorite(record(1, "Kyiv"));
        store.toggle_temperature_unit();

        let recent = gateway.get(RECENT_SEARCHES_KEY).expect("get").expect("written");
        let parsed: Vec<WeatherRecord> = serde_json::from_str(&recent).expect("valid JSON");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].city, "Kyiv");

        let favorites = gateway.get(FAVORITES_KEY).expect("get").expect("written");
        assert!(favorites.contains("Kyiv"));

        let flag = gateway.get(USE_CELSIUS_KEY).expect("get").expect("written");
        assert_eq!(flag, "false");
    }

    #[test]
    fn repeat_search_still_writes_history() {
        let gateway = Arc::new(LoggingStorage::default());
        let store = WeatherStore::new(gateway.clone());

        store.set_current_weather(record(1, "Kyiv"));
        store.set_current_weather(record(1, "Kyiv"));

        let writes = gateway.writes.lock();
        let history_writes =
            writes.iter().filter(|(key, _)| key == RECENT_SEARCHES_KEY).count();
        assert_eq!(history_writes, 2);
    }

    #[test]
    fn load_stored_data_does_not_write_back() {
        let gateway = Arc::new(LoggingStorage::default());
        let store = WeatherStore::new(gateway.clone());

        store.load_stored_data(vec![record(1, "Kyiv")], vec![record(2, "Lviv")], false);

        assert!(gateway.writes.lock().is_empty());
        assert_eq!(store.recent_searches().len(), 1);
        assert_eq!(store.favorites().len(), 1);
        assert!(!store.use_celsius());
    }

    #[test]
    fn write_failures_are_swallowed() {
        let gateway = Arc::new(FailingStorage::new());
        let store = WeatherStore::new(gateway.clone());

        store.set_current_weather(record(1, "Kyiv"));
        store.toggle_favorite(record(1, "Kyiv"));

        // The mutation wins in memory even though every write failed.
        assert_eq!(store.recent_searches().len(), 1);
        assert!(store.is_favorite(1));
        assert_eq!(gateway.failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hydrate_falls_back_on_malformed_values() {
        let gateway = Arc::new(MemoryStorage::new());
        gateway.set(RECENT_SEARCHES_KEY, "{not json").expect("set");
        gateway.set(FAVORITES_KEY, "\"not a list\"").expect("set");

        let store = WeatherStore::new(gateway);
        store.hydrate();

        assert!(store.recent_searches().is_empty());
        assert!(store.favorites().is_empty());
        assert!(store.use_celsius());
    }

    #[test]
    fn hydrate_restores_persisted_state() {
        let gateway = Arc::new(MemoryStorage::new());
        {
            let store = WeatherStore::new(gateway.clone());
            store.set_current_weather(record(1, "Kyiv"));
            store.toggle_favorite(record(1, "Kyiv"));
            store.toggle_temperature_unit();
        }

        let store = WeatherStore::new(gateway);
        store.hydrate();

        assert_eq!(store.recent_searches().len(), 1);
        assert!(store.is_favorite(1));
        assert!(!store.use_celsius());
        // current_weather has no persisted form
        assert!(store.current_weather().is_none());
    }

    #[test]
    fn hydrate_survives_a_failing_gateway() {
        let store = WeatherStore::new(Arc::new(FailingStorage::new()));
        store.hydrate();
        assert!(store.recent_searches().is_empty());
        assert!(store.use_celsius());
    }

    #[test]
    fn listeners_observe_mutations_until_unsubscribed() {
        let (store, _) = store_with_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let subscription = store.subscribe(move |state| {
            seen_clone.lock().push(state.recent_searches.len());
        });

        store.set_current_weather(record(1, "Kyiv"));
        store.set_current_weather(record(2, "Lviv"));
        assert_eq!(*seen.lock(), vec![1, 2]);

        store.unsubscribe(subscription);
        store.set_current_weather(record(3, "Odesa"));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
