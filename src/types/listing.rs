//! Property listing form data

use crate::error::{AdvisorError, AdvisorResult};
use crate::types::frame::Value;
use crate::types::record::InputRecord;
use serde::{Deserialize, Serialize};

pub const PROPERTY_TYPES: &[&str] = &["Apartment", "Villa", "House", "Plot", ""];
pub const FURNISHED_STATUSES: &[&str] = &["Unfurnished", "Semi", "Fully", ""];
pub const TRANSPORT_LEVELS: &[&str] = &["Poor", "Average", "Good", "Excellent", ""];
pub const SECURITY_OPTIONS: &[&str] = &["None", "Gated", "CCTV", "Guard", "Other", ""];
pub const FACINGS: &[&str] = &["North", "South", "East", "West", ""];
pub const OWNER_TYPES: &[&str] = &["Individual", "Builder", "Agent", ""];
pub const AVAILABILITY_STATUSES: &[&str] = &["Available", "Under Construction", "Sold", ""];

/// One property as entered on the single-listing form.
///
/// Serialized names are the dataset's column names; lower-case aliases are
/// accepted when reading listing files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyListing {
    #[serde(rename = "State", alias = "state")]
    pub state: String,

    #[serde(rename = "City", alias = "city")]
    pub city: String,

    #[serde(rename = "Locality", alias = "locality")]
    pub locality: String,

    #[serde(rename = "Property_Type", alias = "property_type")]
    pub property_type: String,

    /// Bedrooms, hall, kitchen (1-5 on the form)
    #[serde(rename = "BHK", alias = "bhk")]
    pub bhk: u32,

    #[serde(rename = "Size_in_SqFt", alias = "size_in_sqft", alias = "sqft")]
    pub size_in_sqft: f64,

    #[serde(rename = "Year_Built", alias = "year_built")]
    pub year_built: u32,

    #[serde(rename = "Furnished_Status", alias = "furnished_status")]
    pub furnished_status: String,

    #[serde(rename = "Floor_No", alias = "floor_no")]
    pub floor_no: u32,

    #[serde(rename = "Total_Floors", alias = "total_floors")]
    pub total_floors: u32,

    #[serde(rename = "Nearby_Schools", alias = "nearby_schools")]
    pub nearby_schools: u32,

    #[serde(rename = "Nearby_Hospitals", alias = "nearby_hospitals")]
    pub nearby_hospitals: u32,

    #[serde(
        rename = "Public_Transport_Accessibility",
        alias = "public_transport_accessibility"
    )]
    pub public_transport_accessibility: String,

    #[serde(rename = "Parking_Space", alias = "parking_space")]
    pub parking_space: u32,

    #[serde(rename = "Security", alias = "security")]
    pub security: String,

    /// Comma-separated amenities
    #[serde(rename = "Amenities", alias = "amenities")]
    pub amenities: String,

    #[serde(rename = "Facing", alias = "facing")]
    pub facing: String,

    #[serde(rename = "Owner_Type", alias = "owner_type")]
    pub owner_type: String,

    #[serde(rename = "Availability_Status", alias = "availability_status")]
    pub availability_status: String,

    /// Optional listing identifier; empty becomes 0 in the input record
    #[serde(rename = "ID", alias = "id")]
    pub id: String,
}

impl Default for PropertyListing {
    fn default() -> Self {
        Self {
            state: String::new(),
            city: String::new(),
            locality: String::new(),
            property_type: "Apartment".to_string(),
            bhk: 2,
            size_in_sqft: 750.0,
            year_built: 2020,
            furnished_status: "Unfurnished".to_string(),
            floor_no: 1,
            total_floors: 3,
            nearby_schools: 1,
            nearby_hospitals: 1,
            public_transport_accessibility: "Average".to_string(),
            parking_space: 1,
            security: "None".to_string(),
            amenities: String::new(),
            facing: "North".to_string(),
            owner_type: "Individual".to_string(),
            availability_status: "Available".to_string(),
            id: String::new(),
        }
    }
}

impl PropertyListing {
    /// Check the form's numeric ranges and enumerated choices.
    pub fn validate(&self) -> AdvisorResult<()> {
        let choices: [(&str, &str, &[&str]); 7] = [
            ("Property_Type", self.property_type.as_str(), PROPERTY_TYPES),
            ("Furnished_Status", self.furnished_status.as_str(), FURNISHED_STATUSES),
            (
                "Public_Transport_Accessibility",
                self.public_transport_accessibility.as_str(),
                TRANSPORT_LEVELS,
            ),
            ("Security", self.security.as_str(), SECURITY_OPTIONS),
            ("Facing", self.facing.as_str(), FACINGS),
            ("Owner_Type", self.owner_type.as_str(), OWNER_TYPES),
            ("Availability_Status", self.availability_status.as_str(), AVAILABILITY_STATUSES),
        ];
        for (field, value, options) in choices {
            if !options.contains(&value) {
                return Err(AdvisorError::InvalidField {
                    field: field.to_string(),
                    message: format!("'{}' is not one of {:?}", value, options),
                });
            }
        }

        check_range("BHK", self.bhk as f64, 1.0, 5.0)?;
        check_range("Size_in_SqFt", self.size_in_sqft, 50.0, f64::INFINITY)?;
        check_range("Year_Built", self.year_built as f64, 1900.0, 2050.0)?;
        check_range("Floor_No", self.floor_no as f64, 0.0, 200.0)?;
        check_range("Total_Floors", self.total_floors as f64, 1.0, 200.0)?;
        Ok(())
    }

    /// Set the form field named `field` (dataset column name, any case) from
    /// raw text. Returns `false` when no form field has that name.
    pub fn apply_override(&mut self, field: &str, raw: &str) -> AdvisorResult<bool> {
        let text = raw.trim().to_string();
        match field.to_ascii_lowercase().as_str() {
            "state" => self.state = text,
            "city" => self.city = text,
            "locality" => self.locality = text,
            "property_type" => self.property_type = text,
            "bhk" => self.bhk = parse_field("BHK", raw)?,
            "size_in_sqft" => self.size_in_sqft = parse_field("Size_in_SqFt", raw)?,
            "year_built" => self.year_built = parse_field("Year_Built", raw)?,
            "furnished_status" => self.furnished_status = text,
            "floor_no" => self.floor_no = parse_field("Floor_No", raw)?,
            "total_floors" => self.total_floors = parse_field("Total_Floors", raw)?,
            "nearby_schools" => self.nearby_schools = parse_field("Nearby_Schools", raw)?,
            "nearby_hospitals" => self.nearby_hospitals = parse_field("Nearby_Hospitals", raw)?,
            "public_transport_accessibility" => self.public_transport_accessibility = text,
            "parking_space" => self.parking_space = parse_field("Parking_Space", raw)?,
            "security" => self.security = text,
            "amenities" => self.amenities = text,
            "facing" => self.facing = text,
            "owner_type" => self.owner_type = text,
            "availability_status" => self.availability_status = text,
            "id" => self.id = text,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Flatten the form into an input record keyed by dataset column names.
    pub fn to_record(&self) -> InputRecord {
        let id = if self.id.trim().is_empty() {
            Value::Number(0.0)
        } else {
            Value::parse_cell(&self.id)
        };

        InputRecord::new()
            .with("State", self.state.as_str())
            .with("City", self.city.as_str())
            .with("Locality", self.locality.as_str())
            .with("Property_Type", self.property_type.as_str())
            .with("BHK", self.bhk)
            .with("Size_in_SqFt", self.size_in_sqft)
            .with("Year_Built", self.year_built)
            .with("Furnished_Status", self.furnished_status.as_str())
            .with("Floor_No", self.floor_no)
            .with("Total_Floors", self.total_floors)
            .with("Nearby_Schools", self.nearby_schools)
            .with("Nearby_Hospitals", self.nearby_hospitals)
            .with(
                "Public_Transport_Accessibility",
                self.public_transport_accessibility.as_str(),
            )
            .with("Parking_Space", self.parking_space)
            .with("Security", self.security.as_str())
            .with("Amenities", self.amenities.as_str())
            .with("Facing", self.facing.as_str())
            .with("Owner_Type", self.owner_type.as_str())
            .with("Availability_Status", self.availability_status.as_str())
            .with("ID", id)
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> AdvisorResult<T> {
    raw.trim().parse().map_err(|_| AdvisorError::InvalidField {
        field: field.to_string(),
        message: format!("'{}' is not a valid number for this field", raw.trim()),
    })
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> AdvisorResult<()> {
    if value < min || value > max {
        return Err(AdvisorError::InvalidField {
            field: field.to_string(),
            message: format!("{} is outside {}..={}", value, min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listing_is_valid() {
        assert!(PropertyListing::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_choice_rejected() {
        let listing = PropertyListing {
            facing: "Up".to_string(),
            ..Default::default()
        };
        let err = listing.validate().unwrap_err();
        assert!(err.to_string().contains("Facing"));
    }

    #[test]
    fn test_listing_deserialization_with_aliases() {
        let json = r#"{"sqft": 1200, "bhk": 3, "City": "Pune"}"#;
        let listing: PropertyListing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.size_in_sqft, 1200.0);
        assert_eq!(listing.bhk, 3);
        assert_eq!(listing.city, "Pune");
        assert_eq!(listing.facing, "North");
    }

    #[test]
    fn test_apply_override_sets_form_fields() {
        let mut listing = PropertyListing::default();
        assert!(listing.apply_override("Size_in_SqFt", "900").unwrap());
        assert!(listing.apply_override("city", " Pune ").unwrap());
        assert!(listing.apply_override("BHK", "3").unwrap());
        assert!(!listing.apply_override("Price_in_Lakhs", "55").unwrap());
        assert_eq!(listing.size_in_sqft, 900.0);
        assert_eq!(listing.city, "Pune");
        assert_eq!(listing.bhk, 3);
    }

    #[test]
    fn test_apply_override_rejects_unparsable_numbers() {
        let mut listing = PropertyListing::default();
        let err = listing.apply_override("Floor_No", "-2").unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidField { ref field, .. } if field == "Floor_No"));
        assert!(listing.apply_override("BHK", "two").is_err());
    }

    #[test]
    fn test_empty_id_becomes_zero() {
        let record = PropertyListing::default().to_record();
        assert_eq!(record.get("ID"), Some(&Value::Number(0.0)));
        assert_eq!(record.len(), 20);
    }
}
