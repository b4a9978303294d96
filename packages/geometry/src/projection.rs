//! WGS84 to UTM reprojection.
//!
//! Centroids and areas are computed in a locally accurate planar frame
//! and the results mapped back to longitude/latitude. Each unit picks the
//! UTM zone of its own bounding-box center, so large farms far from the
//! equator do not suffer the longitude stretching of raw degrees.
//!
//! Transforms go through `proj4rs` with plain PROJ strings. Geographic
//! coordinates cross that boundary in radians.

use geo::Coord;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::GeometryError;

/// Source CRS of every KML coordinate.
const WGS84: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// A UTM zone and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    /// Zone number, 1 through 60.
    pub number: u8,
    /// Whether the southern-hemisphere false northing applies.
    pub south: bool,
}

impl UtmZone {
    /// Picks the zone containing the given longitude/latitude.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn for_lon_lat(lon: f64, lat: f64) -> Self {
        let wrapped = (lon + 180.0).rem_euclid(360.0);
        let number = ((wrapped / 6.0).floor() as u8).min(59) + 1;
        Self {
            number,
            south: lat < 0.0,
        }
    }

    /// Longitude of the zone's central meridian, in degrees.
    #[must_use]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.number - 1).mul_add(6.0, -180.0) + 3.0
    }

    /// PROJ definition of the zone.
    #[must_use]
    pub fn proj_string(self) -> String {
        format!(
            "+proj=utm +zone={}{} +ellps=WGS84 +datum=WGS84 +units=m +no_defs",
            self.number,
            if self.south { " +south" } else { "" },
        )
    }
}

/// A ready pair of WGS84 and UTM definitions for one zone.
pub struct UtmProjection {
    zone: UtmZone,
    geographic: Proj,
    utm: Proj,
}

impl std::fmt::Debug for UtmProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtmProjection")
            .field("zone", &self.zone)
            .finish_non_exhaustive()
    }
}

impl UtmProjection {
    /// Builds the projection of `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Projection`] if a PROJ definition is
    /// rejected.
    pub fn new(zone: UtmZone) -> Result<Self, GeometryError> {
        Ok(Self {
            zone,
            geographic: Proj::from_proj_string(WGS84).map_err(projection_error)?,
            utm: Proj::from_proj_string(&zone.proj_string()).map_err(projection_error)?,
        })
    }

    /// The projection of the zone containing `lon`/`lat`.
    ///
    /// # Errors
    ///
    /// See [`UtmProjection::new`].
    pub fn for_lon_lat(lon: f64, lat: f64) -> Result<Self, GeometryError> {
        Self::new(UtmZone::for_lon_lat(lon, lat))
    }

    /// The zone this projection maps into.
    #[must_use]
    pub const fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Longitude/latitude degrees to easting/northing metres.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Projection`] if the transform fails.
    pub fn forward(&self, c: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        let mut point = (c.x.to_radians(), c.y.to_radians(), 0.0);
        transform(&self.geographic, &self.utm, &mut point).map_err(projection_error)?;
        Ok(Coord {
            x: point.0,
            y: point.1,
        })
    }

    /// Easting/northing metres back to longitude/latitude degrees.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Projection`] if the transform fails.
    pub fn inverse(&self, c: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        let mut point = (c.x, c.y, 0.0);
        transform(&self.utm, &self.geographic, &mut point).map_err(projection_error)?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }
}

fn projection_error(error: impl std::fmt::Display) -> GeometryError {
    GeometryError::Projection {
        message: error.to_string(),
    }
}
