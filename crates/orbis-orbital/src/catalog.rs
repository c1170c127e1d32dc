//! Static area catalog: the planets and fixed circular orbits ("areas") the
//! simulation is seeded with at startup. Loaded once, never mutated.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::geometry::{Planet, PlanetId};

// ---------------------------------------------------------------------------
// Area
// ---------------------------------------------------------------------------

/// Catalog-assigned area identifier (index into the catalog's area list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AreaId(pub u32);

/// A fixed circular orbit used as a waypoint (a station, a planetary orbit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Identifier within the catalog.
    pub id: AreaId,
    /// Display name.
    pub name: String,
    /// The planet this area orbits.
    pub planet: Planet,
    /// Altitude above the surface in kilometers.
    pub altitude: f64,
    /// Phase in degrees at simulation time zero.
    pub phase: f64,
}

// ---------------------------------------------------------------------------
// Serialized description
// ---------------------------------------------------------------------------

/// On-disk planet entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanetDescription {
    /// Unique planet name, referenced by areas.
    pub name: String,
    /// Surface radius in kilometers.
    pub radius_km: f64,
    /// Standard gravitational parameter in m³/s².
    pub gravitational_parameter: f64,
}

/// On-disk area entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDescription {
    /// Unique area name.
    pub name: String,
    /// Name of the planet the area orbits.
    pub planet: String,
    /// Altitude above the surface in kilometers.
    pub altitude_km: f64,
    /// Phase in degrees at simulation time zero.
    pub phase_deg: f64,
}

/// The RON document a catalog is loaded from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogDescription {
    /// Planets, in identifier order.
    pub planets: Vec<PlanetDescription>,
    /// Areas, in identifier order.
    pub areas: Vec<AreaDescription>,
}

impl CatalogDescription {
    /// The catalog used when no file is configured: one Earth-like planet
    /// with a low station, a mid orbit and a high relay.
    pub fn builtin() -> Self {
        Self {
            planets: vec![PlanetDescription {
                name: "Anatolia".to_string(),
                radius_km: 6371.0,
                gravitational_parameter: 3.986_004_418e14,
            }],
            areas: vec![
                AreaDescription {
                    name: "Station".to_string(),
                    planet: "Anatolia".to_string(),
                    altitude_km: 400.0,
                    phase_deg: 0.0,
                },
                AreaDescription {
                    name: "Shipyard".to_string(),
                    planet: "Anatolia".to_string(),
                    altitude_km: 800.0,
                    phase_deg: 90.0,
                },
                AreaDescription {
                    name: "Relay".to_string(),
                    planet: "Anatolia".to_string(),
                    altitude_km: 2000.0,
                    phase_deg: 200.0,
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// AreaCatalog
// ---------------------------------------------------------------------------

/// Resolved, validated catalog of planets and areas.
#[derive(Debug, Clone)]
pub struct AreaCatalog {
    planets: Vec<Planet>,
    planet_names: Vec<String>,
    areas: Vec<Area>,
    by_name: HashMap<String, AreaId>,
}

impl AreaCatalog {
    /// Resolves planet references and validates every entry.
    pub fn from_description(description: &CatalogDescription) -> Result<Self, CatalogError> {
        let mut planets = Vec::with_capacity(description.planets.len());
        let mut planet_names = Vec::with_capacity(description.planets.len());
        let mut planet_lookup: HashMap<&str, Planet> = HashMap::new();

        for (index, entry) in description.planets.iter().enumerate() {
            if entry.radius_km <= 0.0 || entry.gravitational_parameter <= 0.0 {
                return Err(CatalogError::InvalidValue {
                    name: entry.name.clone(),
                    reason: "planet radius and gravitational parameter must be positive",
                });
            }
            let planet = Planet {
                id: PlanetId(index as u16),
                radius_km: entry.radius_km,
                gravitational_parameter: entry.gravitational_parameter,
            };
            if planet_lookup.insert(entry.name.as_str(), planet).is_some() {
                return Err(CatalogError::Duplicate(entry.name.clone()));
            }
            planets.push(planet);
            planet_names.push(entry.name.clone());
        }

        let mut areas = Vec::with_capacity(description.areas.len());
        let mut by_name = HashMap::new();
        for (index, entry) in description.areas.iter().enumerate() {
            let planet = *planet_lookup
                .get(entry.planet.as_str())
                .ok_or_else(|| CatalogError::UnknownPlanet {
                    area: entry.name.clone(),
                    planet: entry.planet.clone(),
                })?;
            if entry.altitude_km < 0.0 || !entry.phase_deg.is_finite() {
                return Err(CatalogError::InvalidValue {
                    name: entry.name.clone(),
                    reason: "area altitude must be non-negative and phase finite",
                });
            }
            let id = AreaId(index as u32);
            if by_name.insert(entry.name.clone(), id).is_some() {
                return Err(CatalogError::Duplicate(entry.name.clone()));
            }
            areas.push(Area {
                id,
                name: entry.name.clone(),
                planet,
                altitude: entry.altitude_km,
                phase: entry.phase_deg,
            });
        }

        tracing::debug!(
            planets = planets.len(),
            areas = areas.len(),
            "Area catalog resolved"
        );

        Ok(Self {
            planets,
            planet_names,
            areas,
            by_name,
        })
    }

    /// Parses a catalog from RON text.
    pub fn from_ron(contents: &str) -> Result<Self, CatalogError> {
        let description: CatalogDescription =
            ron::from_str(contents).map_err(CatalogError::ParseError)?;
        Self::from_description(&description)
    }

    /// Loads a catalog from a RON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(CatalogError::ReadError)?;
        let catalog = Self::from_ron(&contents)?;
        tracing::info!("Loaded area catalog from {}", path.display());
        Ok(catalog)
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        // The built-in description is static and always valid.
        match Self::from_description(&CatalogDescription::builtin()) {
            Ok(catalog) => catalog,
            Err(err) => unreachable!("built-in catalog is invalid: {err}"),
        }
    }

    /// All areas in identifier order.
    pub fn areas(&self) -> &[Area] {
        &self.areas
    }

    /// Looks up an area by identifier.
    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id.0 as usize)
    }

    /// Looks up an area by name.
    pub fn area_by_name(&self, name: &str) -> Option<&Area> {
        self.by_name.get(name).and_then(|id| self.area(*id))
    }

    /// All planets in identifier order.
    pub fn planets(&self) -> &[Planet] {
        &self.planets
    }

    /// Name of a planet.
    pub fn planet_name(&self, id: PlanetId) -> Option<&str> {
        self.planet_names.get(id.0 as usize).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
