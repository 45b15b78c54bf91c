//! Deep-link intake
//!
//! Hosts forward `lumen://` links here. Two kinds are understood:
//! - `lumen://gas?gallons=..&odometer=..&cost=..&date=..` to log a fill-up
//! - `lumen://picker-result?fileId=..&fileName=..&mimeType=..` from the
//!   spreadsheet picker page

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::FuelEntry;

/// URL scheme registered by the apps
pub const LINK_SCHEME: &str = "lumen";

const FUEL_HOST: &str = "gas";
const PICKER_HOST: &str = "picker-result";

/// A required number in a fuel link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Gallons,
    Odometer,
    Cost,
}

impl DraftField {
    pub const ALL: [DraftField; 3] = [DraftField::Gallons, DraftField::Odometer, DraftField::Cost];

    /// Query parameter name
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftField::Gallons => "gallons",
            DraftField::Odometer => "odometer",
            DraftField::Cost => "cost",
        }
    }
}

/// Unvalidated fill-up values as received in a link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuelDraft {
    pub gallons: Option<String>,
    pub odometer: Option<String>,
    pub cost: Option<String>,
    pub date: Option<String>,
}

impl FuelDraft {
    pub fn field(&self, field: DraftField) -> Option<&str> {
        let value = match field {
            DraftField::Gallons => &self.gallons,
            DraftField::Odometer => &self.odometer,
            DraftField::Cost => &self.cost,
        };
        value.as_deref()
    }

    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            DraftField::Gallons => self.gallons = value,
            DraftField::Odometer => self.odometer = value,
            DraftField::Cost => self.cost = value,
        }
    }

    /// Required numbers that are absent or blank
    pub fn missing_fields(&self) -> Vec<DraftField> {
        DraftField::ALL
            .into_iter()
            .filter(|f| self.field(*f).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }

    /// Build a new entry dated today when no date was given
    pub fn into_entry(self) -> Result<FuelEntry> {
        self.into_entry_on(chrono::Local::now().date_naive())
    }

    /// Build a new entry, using `today` when the date is absent or blank
    pub fn into_entry_on(self, today: NaiveDate) -> Result<FuelEntry> {
        let gallons = parse_number(self.gallons.as_deref())?;
        let miles = parse_number(self.odometer.as_deref())?;
        let cost = parse_number(self.cost.as_deref())?;

        let date = match self.date.as_deref().map(str::trim) {
            Some(date) if !date.is_empty() => date
                .parse::<NaiveDate>()
                .with_context(|| format!("Invalid date '{}'", date))?,
            _ => today,
        };

        Ok(FuelEntry::new(date, gallons, miles, cost))
    }
}

fn parse_number(value: Option<&str>) -> Result<f64> {
    let value = value.map(str::trim).unwrap_or_default();
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => bail!("Invalid number format"),
    }
}

/// A fuel link sorted by how much of it is usable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuelLink {
    /// All numbers present; add directly
    Complete(FuelDraft),
    /// Exactly one number missing; ask the user to fill it in
    NeedsEdit(FuelDraft),
    /// Two or more numbers missing; report an error
    TooMuchMissing(FuelDraft),
}

impl FuelLink {
    pub fn classify(draft: FuelDraft) -> Self {
        match draft.missing_fields().len() {
            0 => FuelLink::Complete(draft),
            1 => FuelLink::NeedsEdit(draft),
            _ => FuelLink::TooMuchMissing(draft),
        }
    }

    pub fn draft(&self) -> &FuelDraft {
        match self {
            FuelLink::Complete(d) | FuelLink::NeedsEdit(d) | FuelLink::TooMuchMissing(d) => d,
        }
    }
}

/// A spreadsheet chosen on the picker page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
}

impl PickedFile {
    /// Browser link to the spreadsheet
    pub fn web_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/edit",
            urlencoding::encode(&self.id)
        )
    }
}

/// What an incoming link asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkIntake {
    Fuel(FuelLink),
    PickedFile(PickedFile),
    Unrecognized,
}

/// Parse an incoming deep link
///
/// Links that cannot be parsed or that use another scheme or host are
/// [`LinkIntake::Unrecognized`].
pub fn parse_link(link: &str) -> LinkIntake {
    let Ok(url) = url::Url::parse(link.trim()) else {
        return LinkIntake::Unrecognized;
    };
    if url.scheme() != LINK_SCHEME {
        return LinkIntake::Unrecognized;
    }

    let mut params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    match url.host_str() {
        Some(FUEL_HOST) => {
            let draft = FuelDraft {
                gallons: params.remove("gallons"),
                odometer: params.remove("odometer"),
                cost: params.remove("cost"),
                date: params.remove("date"),
            };
            LinkIntake::Fuel(FuelLink::classify(draft))
        }
        Some(PICKER_HOST) => match (params.remove("fileId"), params.remove("fileName")) {
            (Some(id), Some(name)) => LinkIntake::PickedFile(PickedFile {
                id,
                name,
                mime_type: params.remove("mimeType"),
            }),
            _ => LinkIntake::Unrecognized,
        },
        _ => LinkIntake::Unrecognized,
    }
}
