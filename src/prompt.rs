use crate::categories::CategorySet;
use crate::models::{ContextBundle, LocationRecord};

pub const CLOSING_INSTRUCTION: &str = "Provide a detailed, accurate, and location-specific answer for the farmer. \
Use the context above where it is relevant and say which of those facts the advice relies on.";

/// Render `label=value` pairs, dropping pairs whose value is blank.
fn fields(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}={value}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A multi-row section: header line then one `- ` line per row.
fn section<T>(lines: &mut Vec<String>, header: String, rows: &[T], render: impl Fn(&T) -> String) {
    if rows.is_empty() {
        return;
    }
    lines.push(header);
    lines.extend(rows.iter().map(|row| format!("- {}", render(row))));
}

/// Compose the answer prompt. Section order is fixed; empty slices are left out.
pub fn compose_prompt(
    category: &str,
    ctx: &ContextBundle,
    location: &LocationRecord,
    question: &str,
) -> String {
    let mut lines = Vec::new();

    lines.push(format!("[Category: {category}]"));
    lines.push(format!(
        "[Location: {}]",
        fields(&[
            ("State", location.state.clone()),
            ("District", location.district.clone()),
            ("Mandal", location.mandal.clone()),
            ("Pincode", location.pincode.to_string()),
            // `{:?}` keeps the decimal point on whole degrees (18.0, not 18)
            ("Lat", format!("{:?}", location.latitude)),
            ("Lon", format!("{:?}", location.longitude)),
        ])
    ));

    if let Some(soil) = &ctx.soil {
        lines.push(format!(
            "[Soil: {}]",
            fields(&[
                ("Type", soil.soil_type.clone()),
                ("pH", soil.ph.to_string()),
                ("N", format!("{} kg/ha", soil.nitrogen_kg_ha)),
                ("P", format!("{} kg/ha", soil.phosphorus_kg_ha)),
                ("K", format!("{} kg/ha", soil.potassium_kg_ha)),
                ("OrganicCarbon", format!("{}%", soil.organic_carbon_pct)),
                ("EC", format!("{} dS/m", soil.ec_ds_m)),
            ])
        ));
    }

    if let Some(weather) = &ctx.weather {
        lines.push(format!(
            "[Weather Normal ({}): {}]",
            ctx.month,
            fields(&[
                ("Rain", format!("{} mm", weather.normal_rain_mm)),
                ("Temp", format!("{} C", weather.normal_temp_c)),
            ])
        ));
    }

    section(&mut lines, "[Market Prices]".to_string(), &ctx.market, |m| {
        fields(&[
            ("Date", m.date.clone()),
            ("Market", m.market.clone()),
            ("Commodity", m.commodity.clone()),
            ("Variety", m.variety.clone()),
            ("ModalPrice", format!("{} INR/{}", m.modal_price_inr, m.unit)),
        ])
    });

    section(&mut lines, "[Government Schemes]".to_string(), &ctx.schemes, |s| {
        fields(&[
            ("Scheme", s.scheme.clone()),
            ("Benefit", s.benefit.clone()),
            ("HowToApply", s.how_to_apply.clone()),
        ])
    });

    section(&mut lines, "[Crop Calendar]".to_string(), &ctx.calendar, |c| {
        fields(&[
            ("Crop", c.crop.clone()),
            ("Sowing", c.sowing_window.clone()),
            ("Harvest", c.harvest_window.clone()),
            ("Varieties", c.recommended_varieties.clone()),
        ])
    });

    section(&mut lines, "[Pests & Diseases]".to_string(), &ctx.pests, |p| {
        fields(&[
            ("Crop", p.crop.clone()),
            ("PestDisease", p.pest_disease.clone()),
            ("Symptoms", p.symptoms.clone()),
            ("Advisory", p.advisory.clone()),
        ])
    });

    let irrigation_scope = fields(&[
        ("Crop", ctx.crop.clone().unwrap_or_default()),
        ("Soil", ctx.soil_type.clone().unwrap_or_default()),
    ]);
    section(
        &mut lines,
        format!("[Irrigation Norms: {irrigation_scope}]"),
        &ctx.irrigation,
        |i| {
            fields(&[
                ("Stage", i.stage.clone()),
                ("ETc", format!("{} mm/day", i.etc_mm_day)),
                ("Interval", format!("{} days", i.interval_days)),
                ("Note", i.note.clone()),
            ])
        },
    );

    lines.push(format!("User Question: {question}"));
    lines.push(String::new());
    lines.push(CLOSING_INSTRUCTION.to_string());

    lines.join("\n")
}

/// Instruction asking the model for exactly one label from `categories`.
pub fn classification_prompt(question: &str, categories: &CategorySet) -> String {
    format!(
        "You are an agricultural assistant.\n\
         Classify the farmer's question into ONE category from this list:\n\
         {}.\n\n\
         Question: {question}\n\
         Reply with ONLY the category name (lowercase).",
        categories.labels().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CropCalendarEntry, IrrigationNorm, MarketPrice, PestAdvisory, Scheme, SoilRecord,
        WeatherNormal,
    };

    fn location() -> LocationRecord {
        LocationRecord {
            pincode: 506001,
            state: "Telangana".to_string(),
            district: "Warangal".to_string(),
            mandal: "Hanamkonda".to_string(),
            latitude: 18.0,
            longitude: 79.58,
        }
    }

    fn soil() -> SoilRecord {
        SoilRecord {
            pincode: 506001,
            soil_type: "Loam".to_string(),
            ph: 6.5,
            nitrogen_kg_ha: 280.0,
            phosphorus_kg_ha: 25.5,
            potassium_kg_ha: 300.0,
            organic_carbon_pct: 0.62,
            ec_ds_m: 0.4,
        }
    }

    fn market() -> MarketPrice {
        MarketPrice {
            date: "2026-10-17".to_string(),
            market: "Warangal".to_string(),
            commodity: "Cotton".to_string(),
            variety: "".to_string(),
            unit: "Quintal".to_string(),
            modal_price_inr: 7100.0,
            state: "Telangana".to_string(),
            pincode_service_area: "506001".to_string(),
        }
    }

    #[test]
    fn test_minimal_prompt_has_no_context_sections() {
        let prompt = compose_prompt(
            "finance and loans",
            &ContextBundle::default(),
            &location(),
            "How to get a loan?",
        );

        assert_eq!(
            prompt,
            format!(
                "[Category: finance and loans]\n\
                 [Location: State=Telangana, District=Warangal, Mandal=Hanamkonda, Pincode=506001, Lat=18.0, Lon=79.58]\n\
                 User Question: How to get a loan?\n\
                 \n\
                 {CLOSING_INSTRUCTION}"
            )
        );
    }

    #[test]
    fn test_full_prompt_exact_layout() {
        let ctx = ContextBundle {
            month: "Oct".to_string(),
            crop: Some("cotton".to_string()),
            soil_type: Some("Loam".to_string()),
            soil: Some(soil()),
            weather: Some(WeatherNormal {
                pincode: 506001,
                month: "Oct".to_string(),
                normal_rain_mm: 95.0,
                normal_temp_c: 26.5,
            }),
            market: vec![market()],
            schemes: vec![Scheme {
                state: "Telangana".to_string(),
                scheme: "Rythu Bandhu".to_string(),
                benefit: "Investment support".to_string(),
                how_to_apply: "".to_string(),
            }],
            calendar: vec![CropCalendarEntry {
                state: "Telangana".to_string(),
                crop: "Cotton".to_string(),
                sowing_window: "Jun-Jul".to_string(),
                harvest_window: "Nov-Jan".to_string(),
                recommended_varieties: "".to_string(),
            }],
            pests: vec![PestAdvisory {
                state: "Telangana".to_string(),
                crop: "Cotton".to_string(),
                pest_disease: "Pink bollworm".to_string(),
                symptoms: "Rosette flowers".to_string(),
                advisory: "Install pheromone traps".to_string(),
            }],
            irrigation: vec![IrrigationNorm {
                crop: "Cotton".to_string(),
                soil_type: "Loam".to_string(),
                stage: "Flowering".to_string(),
                etc_mm_day: 5.5,
                interval_days: "7-10".to_string(),
                note: "".to_string(),
            }],
        };

        let prompt = compose_prompt("market prices", &ctx, &location(), "cotton prices here");
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(
            lines,
            vec![
                "[Category: market prices]",
                "[Location: State=Telangana, District=Warangal, Mandal=Hanamkonda, Pincode=506001, Lat=18.0, Lon=79.58]",
                "[Soil: Type=Loam, pH=6.5, N=280 kg/ha, P=25.5 kg/ha, K=300 kg/ha, OrganicCarbon=0.62%, EC=0.4 dS/m]",
                "[Weather Normal (Oct): Rain=95 mm, Temp=26.5 C]",
                "[Market Prices]",
                "- Date=2026-10-17, Market=Warangal, Commodity=Cotton, ModalPrice=7100 INR/Quintal",
                "[Government Schemes]",
                "- Scheme=Rythu Bandhu, Benefit=Investment support",
                "[Crop Calendar]",
                "- Crop=Cotton, Sowing=Jun-Jul, Harvest=Nov-Jan",
                "[Pests & Diseases]",
                "- Crop=Cotton, PestDisease=Pink bollworm, Symptoms=Rosette flowers, Advisory=Install pheromone traps",
                "[Irrigation Norms: Crop=cotton, Soil=Loam]",
                "- Stage=Flowering, ETc=5.5 mm/day, Interval=7-10 days",
                "User Question: cotton prices here",
                "",
                CLOSING_INSTRUCTION,
            ]
        );
    }

    #[test]
    fn test_empty_slices_never_emit_headers() {
        let ctx = ContextBundle {
            month: "Oct".to_string(),
            crop: Some("rice".to_string()),
            ..ContextBundle::default()
        };
        let prompt = compose_prompt("irrigation", &ctx, &location(), "paddy water?");

        for header in [
            "[Soil",
            "[Weather",
            "[Market",
            "[Government",
            "[Crop Calendar",
            "[Pests",
            "[Irrigation",
        ] {
            assert!(!prompt.contains(header), "unexpected section {header}");
        }
    }

    #[test]
    fn test_question_is_verbatim() {
        let question = "  What about   [Soil: fake] & <b>urea</b>?  ";
        let prompt = compose_prompt("fertilizers", &ContextBundle::default(), &location(), question);
        assert!(prompt.contains(&format!("User Question: {question}\n")));
    }

    #[test]
    fn test_classification_prompt_lists_every_category() {
        let categories = CategorySet::default();
        let prompt = classification_prompt("When to sow cotton?", &categories);

        for label in categories.labels() {
            assert!(prompt.contains(label.as_str()));
        }
        assert!(prompt.contains("Question: When to sow cotton?"));
        assert!(prompt.ends_with("Reply with ONLY the category name (lowercase)."));
    }
}
