/// Language code → profile lookup.
use std::collections::BTreeMap;
use std::path::Path;

use crate::schema::profile::{LanguageProfile, ProfileError};

const BUILTIN_PROFILES: &[&str] = &[
    include_str!("../../locale_data/profiles/cn.ron"),
    include_str!("../../locale_data/profiles/en.ron"),
    include_str!("../../locale_data/profiles/jp.ron"),
    include_str!("../../locale_data/profiles/sp.ron"),
    include_str!("../../locale_data/profiles/ar.ron"),
    include_str!("../../locale_data/profiles/hi.ron"),
];

/// All known language profiles, keyed by uppercased language code.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, LanguageProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The six profiles bundled with the crate.
    pub fn builtin() -> Result<Self, ProfileError> {
        let mut registry = Self::new();
        for source in BUILTIN_PROFILES {
            registry.register(LanguageProfile::parse_ron(source)?)?;
        }
        Ok(registry)
    }

    /// Load every `.ron` profile in `dir`. Later files may not redefine a
    /// language already registered.
    pub fn load_dir(&mut self, dir: &Path) -> Result<(), ProfileError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("ron"))
            .collect();
        paths.sort();
        for path in paths {
            self.register(LanguageProfile::load_from_ron(&path)?)?;
        }
        Ok(())
    }

    /// Add a checked profile.
    pub fn register(&mut self, profile: LanguageProfile) -> Result<(), ProfileError> {
        profile.check()?;
        let code = profile.language_code.to_uppercase();
        if self.profiles.contains_key(&code) {
            return Err(ProfileError::DuplicateLanguage(code));
        }
        self.profiles.insert(code, profile);
        Ok(())
    }

    /// Look up a profile by language code, ignoring case.
    pub fn get(&self, code: &str) -> Result<&LanguageProfile, ProfileError> {
        self.profiles
            .get(&code.to_uppercase())
            .ok_or_else(|| ProfileError::UnknownLanguage(code.to_string()))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &LanguageProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::Regions;

    #[test]
    fn builtin_has_six_languages() {
        let registry = ProfileRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 6);
        let codes: Vec<&str> = registry.codes().collect();
        assert_eq!(codes, vec!["AR", "CN", "EN", "HI", "JP", "SP"]);
    }

    #[test]
    fn lookup_ignores_case() {
        let registry = ProfileRegistry::builtin().unwrap();
        assert_eq!(registry.get("jp").unwrap().language_code, "JP");
        assert!(matches!(
            registry.get("FR"),
            Err(ProfileError::UnknownLanguage(ref c)) if c == "FR"
        ));
    }

    #[test]
    fn duplicate_language_rejected() {
        let mut registry = ProfileRegistry::builtin().unwrap();
        let en = registry.get("EN").unwrap().clone();
        assert!(matches!(
            registry.register(en),
            Err(ProfileError::DuplicateLanguage(ref c)) if c == "EN"
        ));
    }

    #[test]
    fn region_layouts() {
        let registry = ProfileRegistry::builtin().unwrap();
        for code in ["CN", "EN", "JP"] {
            assert!(matches!(registry.get(code).unwrap().regions, Regions::Flat(_)));
        }
        for code in ["SP", "AR", "HI"] {
            assert!(registry.get(code).unwrap().regions.is_multi_country());
        }
    }

    #[test]
    fn every_city_resolves_to_its_country() {
        let registry = ProfileRegistry::builtin().unwrap();
        for profile in registry.profiles() {
            let Regions::ByCountry(countries) = &profile.regions else {
                continue;
            };
            for (country, cities) in countries {
                for city in cities {
                    let resolved = profile.regions.resolve_country(city).unwrap();
                    assert_eq!(resolved.as_str(), country.as_str(), "{} in {}", city, profile.language_code);
                }
            }
        }
    }

    #[test]
    fn load_dir_reads_profile_files() {
        let mut registry = ProfileRegistry::new();
        registry
            .load_dir(Path::new("locale_data/profiles"))
            .unwrap();
        assert_eq!(registry.len(), 6);
    }
}
