use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

use crate::config::DataConfig;
use crate::error::{KhetError, Result};
use crate::models::{
    CropCalendarEntry, IrrigationNorm, LocationRecord, MarketPrice, PestAdvisory, Scheme,
    SoilRecord, WeatherNormal,
};

/// All reference tables, loaded once and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    pub villages: Vec<LocationRecord>,
    pub soil: Vec<SoilRecord>,
    pub weather_normals: Vec<WeatherNormal>,
    pub market_prices: Vec<MarketPrice>,
    pub schemes: Vec<Scheme>,
    pub crop_calendar: Vec<CropCalendarEntry>,
    pub pests: Vec<PestAdvisory>,
    pub irrigation: Vec<IrrigationNorm>,
}

impl ReferenceStore {
    /// Load every table. Only the village directory is mandatory.
    pub fn load(data: &DataConfig) -> Result<Self> {
        let villages_path = data.path(&data.villages);
        let villages: Vec<LocationRecord> = read_table(&villages_path).map_err(|e| {
            KhetError::DirectoryUnavailable(format!("{}: {e}", villages_path.display()))
        })?;
        if villages.is_empty() {
            return Err(KhetError::DirectoryUnavailable(format!(
                "{} has no usable rows",
                villages_path.display()
            )));
        }

        let store = Self {
            villages,
            soil: load_optional(&data.path(&data.soil)),
            weather_normals: load_optional(&data.path(&data.weather_normals)),
            market_prices: load_optional(&data.path(&data.market_prices)),
            schemes: load_optional(&data.path(&data.schemes)),
            crop_calendar: load_optional(&data.path(&data.crop_calendar)),
            pests: load_optional(&data.path(&data.pests)),
            irrigation: load_optional(&data.path(&data.irrigation)),
        };

        info!(
            villages = store.villages.len(),
            soil = store.soil.len(),
            weather_normals = store.weather_normals.len(),
            market_prices = store.market_prices.len(),
            schemes = store.schemes.len(),
            crop_calendar = store.crop_calendar.len(),
            pests = store.pests.len(),
            irrigation = store.irrigation.len(),
            "Reference data loaded from {}",
            data.data_dir.display()
        );

        Ok(store)
    }
}

/// Secondary tables degrade to empty instead of failing the load.
fn load_optional<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match read_table(path) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Reference table {} unavailable: {} - using empty table", path.display(), e);
            Vec::new()
        }
    }
}

/// Read a headed CSV file. Rows that do not fit the schema are skipped.
fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.deserialize::<T>() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                tracing::debug!("Skipping malformed row in {}: {}", path.display(), e);
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed rows in {}", skipped, path.display());
    }

    Ok(rows)
}
