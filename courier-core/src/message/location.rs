//! Location text format.
//!
//! `lat,lon[,accuracy]` on the first line, optionally followed by a POI
//! name line and an address line. Newlines inside both POI lines are
//! escaped as the two characters `\n`.

use serde::{Deserialize, Serialize};

use super::error::DecodeError;

/// A shared location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub poi_name: Option<String>,
    pub poi_address: Option<String>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Location {
            latitude,
            longitude,
            accuracy: None,
            poi_name: None,
            poi_address: None,
        }
    }

    /// Sets the POI name. An empty name is stored as absent.
    pub fn with_poi_name(mut self, name: impl Into<String>) -> Self {
        self.poi_name = Some(name.into()).filter(|n| !n.is_empty());
        self
    }

    /// Sets the POI address. An empty address is stored as absent.
    pub fn with_poi_address(mut self, address: impl Into<String>) -> Self {
        self.poi_address = Some(address.into()).filter(|a| !a.is_empty());
        self
    }

    /// Serializes to the wire text form.
    ///
    /// POI details are always written as two lines (name, address) so the
    /// result reads the same for direct and group messages.
    pub fn to_text(&self) -> String {
        let mut text = format!("{},{}", self.latitude, self.longitude);
        if let Some(accuracy) = self.accuracy {
            text.push_str(&format!(",{}", accuracy));
        }
        if self.poi_name.is_some() || self.poi_address.is_some() {
            text.push('\n');
            text.push_str(&escape(self.poi_name.as_deref().unwrap_or_default()));
            text.push('\n');
            text.push_str(&escape(self.poi_address.as_deref().unwrap_or_default()));
        }
        text
    }

    /// Parses the wire text form.
    ///
    /// With two lines the second one is the address for direct messages and
    /// the POI name for group messages.
    pub fn parse(text: &str, second_line_is_name: bool) -> Result<Self, DecodeError> {
        let lines: Vec<&str> = text.split('\n').collect();
        let coords: Vec<&str> = lines[0].split(',').collect();
        if coords.len() < 2 || coords.len() > 3 {
            return Err(DecodeError::drop("bad coordinate format in location"));
        }

        let parse = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| DecodeError::drop("bad coordinate value in location"))
        };
        let latitude = parse(coords[0])?;
        let longitude = parse(coords[1])?;
        let accuracy = coords.get(2).map(|s| parse(s)).transpose()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(DecodeError::drop("coordinates out of range"));
        }

        let (poi_name, address) = match lines.len() {
            1 => (None, None),
            2 if second_line_is_name => (Some(lines[1]), None),
            2 => (None, Some(lines[1])),
            _ => (Some(lines[1]), Some(lines[2])),
        };

        Ok(Location {
            latitude,
            longitude,
            accuracy,
            poi_name: poi_name.filter(|n| !n.is_empty()).map(unescape),
            poi_address: address.filter(|a| !a.is_empty()).map(unescape),
        })
    }
}

fn escape(field: &str) -> String {
    field.replace('\n', "\\n")
}

fn unescape(field: &str) -> String {
    field.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates_only() {
        let loc = Location::parse("47.3769,8.5417", false).unwrap();
        assert_eq!(loc, Location::new(47.3769, 8.5417));
    }

    #[test]
    fn test_parse_with_accuracy_name_and_escaped_address() {
        let loc = Location::parse("1.5,-2.25,10\nCafe\nMain St 1\\n8000 Zurich", false).unwrap();
        assert_eq!(loc.accuracy, Some(10.0));
        assert_eq!(loc.poi_name.as_deref(), Some("Cafe"));
        assert_eq!(loc.poi_address.as_deref(), Some("Main St 1\n8000 Zurich"));
    }

    #[test]
    fn test_two_lines_depends_on_scope() {
        let direct = Location::parse("0,0\nSomewhere", false).unwrap();
        assert_eq!(direct.poi_address.as_deref(), Some("Somewhere"));

        let group = Location::parse("0,0\nSomewhere", true).unwrap();
        assert_eq!(group.poi_name.as_deref(), Some("Somewhere"));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(Location::parse("91,0", false).unwrap_err().is_drop());
        assert!(Location::parse("0,180.5", false).unwrap_err().is_drop());
        assert!(Location::parse("abc", false).is_err());
    }

    #[test]
    fn test_address_roundtrip() {
        let mut loc = Location::new(10.0, 20.0);
        loc.poi_name = Some("Station".into());
        loc.poi_address = Some("Line 1\nLine 2".into());
        assert_eq!(Location::parse(&loc.to_text(), false).unwrap(), loc);
    }

    #[test]
    fn test_multiline_name_roundtrip() {
        let loc = Location::new(46.0, 7.5)
            .with_poi_name("Hotel\nRestaurant")
            .with_poi_address("Dorfstrasse 3");
        assert_eq!(loc.to_text().lines().count(), 3);
        assert_eq!(Location::parse(&loc.to_text(), false).unwrap(), loc);
        assert_eq!(Location::parse(&loc.to_text(), true).unwrap(), loc);
    }

    #[test]
    fn test_empty_poi_fields_are_absent() {
        let loc = Location::new(1.0, 2.0).with_poi_name("").with_poi_address("");
        assert_eq!(loc, Location::new(1.0, 2.0));
        assert_eq!(loc.to_text(), "1,2");

        let loc = Location::new(1.0, 2.0).with_poi_name("").with_poi_address("Here");
        assert_eq!(loc.poi_name, None);
        assert_eq!(Location::parse(&loc.to_text(), true).unwrap(), loc);
    }

    #[test]
    fn test_name_only_roundtrip_in_both_scopes() {
        let mut loc = Location::new(-33.5, 151.0);
        loc.poi_name = Some("Harbour".into());
        let text = loc.to_text();
        assert_eq!(Location::parse(&text, false).unwrap(), loc);
        assert_eq!(Location::parse(&text, true).unwrap(), loc);
    }
}
