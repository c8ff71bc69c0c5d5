use serde::{Deserialize, Serialize};

/// One row of the village directory, collapsed to one record per pincode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "Pincode")]
    pub pincode: u32,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "District")]
    pub district: String,
    #[serde(rename = "Mandal")]
    pub mandal: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilRecord {
    #[serde(rename = "Pincode")]
    pub pincode: u32,
    #[serde(rename = "SoilType")]
    pub soil_type: String,
    #[serde(rename = "pH")]
    pub ph: f64,
    #[serde(rename = "N_kg_ha")]
    pub nitrogen_kg_ha: f64,
    #[serde(rename = "P_kg_ha")]
    pub phosphorus_kg_ha: f64,
    #[serde(rename = "K_kg_ha")]
    pub potassium_kg_ha: f64,
    #[serde(rename = "OrganicCarbon_%")]
    pub organic_carbon_pct: f64,
    #[serde(rename = "EC_dS_m")]
    pub ec_ds_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherNormal {
    #[serde(rename = "Pincode")]
    pub pincode: u32,
    #[serde(rename = "Month")]
    pub month: String,
    #[serde(rename = "NormalRain_mm")]
    pub normal_rain_mm: f64,
    #[serde(rename = "NormalTemp_C")]
    pub normal_temp_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Market")]
    pub market: String,
    #[serde(rename = "Commodity")]
    pub commodity: String,
    #[serde(rename = "Variety")]
    pub variety: String,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "ModalPriceINR")]
    pub modal_price_inr: f64,
    #[serde(rename = "State")]
    pub state: String,
    /// Pincodes served by the market, as written in the source (may list several).
    #[serde(rename = "PincodeServiceArea", default)]
    pub pincode_service_area: String,
}

impl MarketPrice {
    pub fn serves(&self, pincode: u32) -> bool {
        self.pincode_service_area
            .split(|c: char| !c.is_ascii_digit())
            .filter(|token| !token.is_empty())
            .any(|token| token.parse::<u32>().ok() == Some(pincode))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheme {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Scheme")]
    pub scheme: String,
    #[serde(rename = "Benefit")]
    pub benefit: String,
    #[serde(rename = "HowToApply")]
    pub how_to_apply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropCalendarEntry {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "SowingWindow")]
    pub sowing_window: String,
    #[serde(rename = "HarvestWindow")]
    pub harvest_window: String,
    #[serde(rename = "RecommendedVarieties")]
    pub recommended_varieties: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestAdvisory {
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "PestDisease")]
    pub pest_disease: String,
    #[serde(rename = "Symptoms")]
    pub symptoms: String,
    #[serde(rename = "Advisory")]
    pub advisory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationNorm {
    #[serde(rename = "Crop")]
    pub crop: String,
    #[serde(rename = "SoilType")]
    pub soil_type: String,
    #[serde(rename = "Stage")]
    pub stage: String,
    #[serde(rename = "ETc_mm_day")]
    pub etc_mm_day: f64,
    /// Kept verbatim; sources write ranges such as "5-7".
    #[serde(rename = "IrrigationInterval_days")]
    pub interval_days: String,
    #[serde(rename = "Note", default)]
    pub note: String,
}

/// Per-query enrichment, every slice already scoped and capped.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContextBundle {
    pub month: String,
    pub crop: Option<String>,
    pub soil_type: Option<String>,
    pub soil: Option<SoilRecord>,
    pub weather: Option<WeatherNormal>,
    pub market: Vec<MarketPrice>,
    pub schemes: Vec<Scheme>,
    pub calendar: Vec<CropCalendarEntry>,
    pub pests: Vec<PestAdvisory>,
    pub irrigation: Vec<IrrigationNorm>,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.soil.is_none()
            && self.weather.is_none()
            && self.market.is_empty()
            && self.schemes.is_empty()
            && self.calendar.is_empty()
            && self.pests.is_empty()
            && self.irrigation.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub question: String,
    pub answer: String,
    pub category: String,
}

// Ollama generate request format
#[derive(Debug, Serialize, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
}

// Ollama generate response format; also one line of the streaming body
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}
