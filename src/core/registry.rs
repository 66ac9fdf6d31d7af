/// Region registry: city membership and country resolution.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("region not found in any country: {0}")]
    RegionNotFound(String),
    #[error("profile regions are not grouped by country")]
    NotMultiCountry,
    #[error("city '{city}' is listed under both '{first}' and '{second}'")]
    OverlappingCity {
        city: String,
        first: String,
        second: String,
    },
}

/// Newtype wrapper for country keys such as `egypt` or `mexico`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CountryId(pub String);

impl CountryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The regions a profile accepts.
///
/// Flat profiles list cities directly. Country-keyed profiles group
/// cities under a country, and a city may appear under one country only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Regions {
    Flat(Vec<String>),
    ByCountry(BTreeMap<String, Vec<String>>),
}

/// Where a region sits inside a profile's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionLocation {
    /// Member of a flat region list.
    Flat,
    /// City owned by a country.
    Country(CountryId),
}

impl Regions {
    pub fn is_valid_region(&self, region: &str) -> bool {
        match self {
            Self::Flat(cities) => cities.iter().any(|c| c == region),
            Self::ByCountry(countries) => countries
                .values()
                .any(|cities| cities.iter().any(|c| c == region)),
        }
    }

    /// Find the country whose city list contains `region`.
    ///
    /// Only meaningful for country-keyed registries; flat registries
    /// return `NotMultiCountry`.
    pub fn resolve_country(&self, region: &str) -> Result<CountryId, RegistryError> {
        let Self::ByCountry(countries) = self else {
            return Err(RegistryError::NotMultiCountry);
        };
        countries
            .iter()
            .find(|(_, cities)| cities.iter().any(|c| c == region))
            .map(|(country, _)| CountryId(country.clone()))
            .ok_or_else(|| RegistryError::RegionNotFound(region.to_string()))
    }

    /// Resolve `region` to its location, failing when it is not registered.
    pub fn locate(&self, region: &str) -> Result<RegionLocation, RegistryError> {
        match self {
            Self::Flat(_) if self.is_valid_region(region) => Ok(RegionLocation::Flat),
            Self::Flat(_) => Err(RegistryError::RegionNotFound(region.to_string())),
            Self::ByCountry(_) => self.resolve_country(region).map(RegionLocation::Country),
        }
    }

    pub fn is_multi_country(&self) -> bool {
        matches!(self, Self::ByCountry(_))
    }

    pub fn countries(&self) -> Vec<CountryId> {
        match self {
            Self::Flat(_) => Vec::new(),
            Self::ByCountry(countries) => countries.keys().cloned().map(CountryId).collect(),
        }
    }

    /// Every registered city, in data order.
    pub fn cities(&self) -> Vec<&str> {
        match self {
            Self::Flat(cities) => cities.iter().map(String::as_str).collect(),
            Self::ByCountry(countries) => countries
                .values()
                .flat_map(|cities| cities.iter().map(String::as_str))
                .collect(),
        }
    }

    /// Check that no city is listed under two countries.
    pub fn check_disjoint(&self) -> Result<(), RegistryError> {
        let Self::ByCountry(countries) = self else {
            return Ok(());
        };
        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for (country, cities) in countries {
            for city in cities {
                if let Some(first) = owners.insert(city.as_str(), country.as_str()) {
                    if first != country {
                        return Err(RegistryError::OverlappingCity {
                            city: city.clone(),
                            first: first.to_string(),
                            second: country.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_countries() -> Regions {
        Regions::ByCountry(BTreeMap::from([
            (
                "spain".to_string(),
                vec!["Madrid".to_string(), "Sevilla".to_string()],
            ),
            (
                "mexico".to_string(),
                vec!["Puebla".to_string(), "Oaxaca".to_string()],
            ),
        ]))
    }

    #[test]
    fn flat_membership() {
        let regions = Regions::Flat(vec!["Tokyo".to_string(), "Kyoto".to_string()]);
        assert!(regions.is_valid_region("Tokyo"));
        assert!(!regions.is_valid_region("tokyo"));
        assert!(!regions.is_valid_region(""));
    }

    #[test]
    fn resolve_country_finds_owner() {
        let regions = make_countries();
        assert_eq!(
            regions.resolve_country("Oaxaca").unwrap(),
            CountryId("mexico".to_string())
        );
        assert_eq!(
            regions.resolve_country("Madrid").unwrap(),
            CountryId("spain".to_string())
        );
    }

    #[test]
    fn resolve_country_unknown_city() {
        let regions = make_countries();
        assert_eq!(
            regions.resolve_country("Lima"),
            Err(RegistryError::RegionNotFound("Lima".to_string()))
        );
    }

    #[test]
    fn resolve_country_on_flat_registry() {
        let regions = Regions::Flat(vec!["London".to_string()]);
        assert_eq!(
            regions.resolve_country("London"),
            Err(RegistryError::NotMultiCountry)
        );
    }

    #[test]
    fn locate_flat_and_country() {
        let flat = Regions::Flat(vec!["London".to_string()]);
        assert_eq!(flat.locate("London").unwrap(), RegionLocation::Flat);
        assert!(flat.locate("Paris").is_err());

        let grouped = make_countries();
        assert_eq!(
            grouped.locate("Sevilla").unwrap(),
            RegionLocation::Country(CountryId("spain".to_string()))
        );
    }

    #[test]
    fn overlapping_city_rejected() {
        let regions = Regions::ByCountry(BTreeMap::from([
            ("india".to_string(), vec!["Bharatpur".to_string()]),
            ("nepal".to_string(), vec!["Bharatpur".to_string()]),
        ]));
        let err = regions.check_disjoint().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::OverlappingCity { ref city, .. } if city == "Bharatpur"
        ));
    }

    #[test]
    fn disjoint_registry_accepted() {
        assert!(make_countries().check_disjoint().is_ok());
        assert!(Regions::Flat(vec!["A".to_string()]).check_disjoint().is_ok());
    }

    #[test]
    fn cities_in_data_order() {
        let regions = make_countries();
        // BTreeMap orders countries: mexico before spain
        assert_eq!(regions.cities(), vec!["Puebla", "Oaxaca", "Madrid", "Sevilla"]);
        assert_eq!(regions.countries().len(), 2);
    }
}
