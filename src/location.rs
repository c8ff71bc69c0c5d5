use std::collections::BTreeMap;

use crate::error::{KhetError, Result};
use crate::models::LocationRecord;

/// Pincode lookup over the village directory. Duplicate pincodes collapse to
/// the first row in file order.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    by_pincode: BTreeMap<u32, LocationRecord>,
}

impl LocationResolver {
    pub fn new(villages: &[LocationRecord]) -> Result<Self> {
        if villages.is_empty() {
            return Err(KhetError::DirectoryUnavailable(
                "village directory is empty".to_string(),
            ));
        }

        let mut by_pincode = BTreeMap::new();
        for record in villages {
            by_pincode
                .entry(record.pincode)
                .or_insert_with(|| record.clone());
        }

        Ok(Self { by_pincode })
    }

    pub fn resolve(&self, pincode: u32) -> Result<&LocationRecord> {
        self.by_pincode
            .get(&pincode)
            .ok_or(KhetError::UnknownPincode(pincode))
    }

    /// Selectable pincodes, ascending and unique.
    pub fn pincodes(&self) -> Vec<u32> {
        self.by_pincode.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn village(pincode: u32, mandal: &str) -> LocationRecord {
        LocationRecord {
            pincode,
            state: "Telangana".to_string(),
            district: "Warangal".to_string(),
            mandal: mandal.to_string(),
            latitude: 18.0,
            longitude: 79.58,
        }
    }

    #[test]
    fn test_resolve_returns_matching_pincode() {
        let villages = vec![village(506002, "Kazipet"), village(506001, "Hanamkonda")];
        let resolver = LocationResolver::new(&villages).unwrap();

        for pin in resolver.pincodes() {
            assert_eq!(resolver.resolve(pin).unwrap().pincode, pin);
        }
    }

    #[test]
    fn test_first_duplicate_wins() {
        let villages = vec![
            village(506001, "Hanamkonda"),
            village(506001, "Warangal Urban"),
        ];
        let resolver = LocationResolver::new(&villages).unwrap();
        assert_eq!(resolver.resolve(506001).unwrap().mandal, "Hanamkonda");
        assert_eq!(resolver.pincodes(), vec![506001]);
    }

    #[test]
    fn test_unknown_pincode_is_an_error() {
        let resolver = LocationResolver::new(&[village(506001, "Hanamkonda")]).unwrap();
        assert!(matches!(
            resolver.resolve(110001),
            Err(KhetError::UnknownPincode(110001))
        ));
    }

    #[test]
    fn test_empty_directory_is_fatal() {
        assert!(matches!(
            LocationResolver::new(&[]),
            Err(KhetError::DirectoryUnavailable(_))
        ));
    }

    #[test]
    fn test_pincodes_sorted() {
        let villages = vec![
            village(522001, "Guntur"),
            village(506001, "Hanamkonda"),
            village(515001, "Anantapur"),
        ];
        let resolver = LocationResolver::new(&villages).unwrap();
        assert_eq!(resolver.pincodes(), vec![506001, 515001, 522001]);
    }
}
