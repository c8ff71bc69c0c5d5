use chrono::{Datelike, Local, Month, NaiveDate};
use std::sync::Arc;
use tracing::debug;

use crate::config::ContextLimits;
use crate::crops::CropVocabulary;
use crate::models::{ContextBundle, IrrigationNorm, MarketPrice};
use crate::store::ReferenceStore;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

pub struct ContextAssembler {
    store: Arc<ReferenceStore>,
    crops: CropVocabulary,
    limits: ContextLimits,
}

impl ContextAssembler {
    pub fn new(store: Arc<ReferenceStore>, crops: CropVocabulary, limits: ContextLimits) -> Self {
        Self {
            store,
            crops,
            limits,
        }
    }

    /// Build the bundle for the current calendar month.
    pub fn assemble(&self, pincode: u32, state: &str, question: &str) -> ContextBundle {
        let month = Month::try_from(Local::now().month() as u8).unwrap_or(Month::January);
        self.assemble_for_month(pincode, state, question, month)
    }

    pub fn assemble_for_month(
        &self,
        pincode: u32,
        state: &str,
        question: &str,
        month: Month,
    ) -> ContextBundle {
        let store = &self.store;
        let month_abbr = month_abbreviation(month);
        let crop = self.crops.extract(question);

        let soil = store.soil.iter().find(|s| s.pincode == pincode).cloned();
        let soil_type = soil.as_ref().map(|s| s.soil_type.clone());

        let weather = store
            .weather_normals
            .iter()
            .find(|w| w.pincode == pincode && same_month(&w.month, &month_abbr))
            .cloned();

        let market = self.market_slice(pincode, state);

        let schemes = store
            .schemes
            .iter()
            .filter(|s| same_state(&s.state, state))
            .take(self.limits.scheme_limit)
            .cloned()
            .collect();

        let calendar = store
            .crop_calendar
            .iter()
            .filter(|c| same_state(&c.state, state))
            .take(self.limits.calendar_limit)
            .cloned()
            .collect();

        let pests = store
            .pests
            .iter()
            .filter(|p| same_state(&p.state, state))
            .take(self.limits.pest_limit)
            .cloned()
            .collect();

        let irrigation = match crop.as_deref() {
            Some(crop) => {
                let for_crop: Vec<&IrrigationNorm> = store
                    .irrigation
                    .iter()
                    .filter(|i| i.crop.trim().eq_ignore_ascii_case(crop))
                    .collect();
                let with_soil: Vec<&IrrigationNorm> = match soil_type.as_deref() {
                    Some(soil) => for_crop
                        .iter()
                        .copied()
                        .filter(|i| i.soil_type.trim().eq_ignore_ascii_case(soil.trim()))
                        .collect(),
                    None => Vec::new(),
                };
                let rows = if with_soil.is_empty() { for_crop } else { with_soil };
                rows.into_iter()
                    .take(self.limits.irrigation_limit)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        };

        let bundle = ContextBundle {
            month: month_abbr,
            crop,
            soil_type,
            soil,
            weather,
            market,
            schemes,
            calendar,
            pests,
            irrigation,
        };

        debug!(
            pincode,
            crop = ?bundle.crop,
            soil = bundle.soil.is_some(),
            weather = bundle.weather.is_some(),
            market = bundle.market.len(),
            schemes = bundle.schemes.len(),
            calendar = bundle.calendar.len(),
            pests = bundle.pests.len(),
            irrigation = bundle.irrigation.len(),
            "Context assembled"
        );

        bundle
    }

    /// Rows serving the pincode, else rows for the state; newest first.
    fn market_slice(&self, pincode: u32, state: &str) -> Vec<MarketPrice> {
        let prices = &self.store.market_prices;
        let mut rows: Vec<&MarketPrice> = prices.iter().filter(|m| m.serves(pincode)).collect();
        if rows.is_empty() {
            rows = prices.iter().filter(|m| same_state(&m.state, state)).collect();
        }

        // Stable: rows with equal or unparseable dates keep source order.
        rows.sort_by(|a, b| parse_date(&b.date).cmp(&parse_date(&a.date)));
        rows.into_iter()
            .take(self.limits.market_limit)
            .cloned()
            .collect()
    }
}

fn month_abbreviation(month: Month) -> String {
    month.name()[..3].to_string()
}

fn same_month(value: &str, abbr: &str) -> bool {
    value
        .trim()
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(abbr))
}

fn same_state(value: &str, state: &str) -> bool {
    value.trim().eq_ignore_ascii_case(state.trim())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value.trim(), fmt).ok())
}
