// stations.rs

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{DashError, Result};
use crate::tabular::{Table, field, header_index_loose};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Station {
    pub latitude: f64,
    pub longitude: f64,
}

/// Station id -> coordinates, built once from the vertex listing.
#[derive(Debug, Clone, Default)]
pub struct StationLookup {
    stations: HashMap<String, Station>,
}

impl StationLookup {
    /// Builds the lookup from a `/vertex` table. The header row names the
    /// `id`, `Latitude` and `Longitude` columns; their positions vary.
    pub fn from_table(table: &Table) -> Result<Self> {
        let Some((header, rows)) = table.split_first() else {
            return Ok(Self::default());
        };
        let locate = |name: &str| {
            header_index_loose(header, name).ok_or_else(|| DashError::MissingColumn(name.into()))
        };
        let id_idx = locate("id")?;
        let lat_idx = locate("Latitude")?;
        let lon_idx = locate("Longitude")?;

        let mut stations = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = field(row, id_idx);
            let parsed = (
                field(row, lat_idx).trim().parse::<f64>(),
                field(row, lon_idx).trim().parse::<f64>(),
            );
            match parsed {
                (Ok(latitude), Ok(longitude)) => {
                    stations.insert(id.to_string(), Station { latitude, longitude });
                }
                _ => warn!(station = id, "skipping station with unparsable coordinates"),
            }
        }
        debug!(count = stations.len(), "station lookup built");
        Ok(Self { stations })
    }

    pub fn get(&self, id: &str) -> Option<Station> {
        self.stations.get(id).copied()
    }

    /// Like [`get`](Self::get), but a miss is an [`DashError::UnknownStation`].
    pub fn resolve(&self, id: &str) -> Result<Station> {
        self.get(id)
            .ok_or_else(|| DashError::UnknownStation(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl FromIterator<(String, Station)> for StationLookup {
    fn from_iter<I: IntoIterator<Item = (String, Station)>>(iter: I) -> Self {
        Self {
            stations: iter.into_iter().collect(),
        }
    }
}
