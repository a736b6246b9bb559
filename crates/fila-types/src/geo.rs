pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Half-width, in degrees, of the box used to prefilter nearby pharmacies.
pub const NEARBY_BOX_DEGREES: f64 = 0.1;

pub const DEFAULT_RADIUS_KM: f64 = 5.0;

const MIN_COS_LAT: f64 = 1e-6;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Box reaching `delta` degrees of latitude from the centre, and the same
    /// ground distance east and west. Longitude degrees shrink by `cos(lat)`,
    /// so the longitude half-width grows by `1 / cos(lat)`, capped at 180°.
    pub fn around(lat: f64, lng: f64, delta: f64) -> Self {
        let lng_delta = (delta / lat.to_radians().cos().max(MIN_COS_LAT)).min(180.0);
        Self {
            min_lat: lat - delta,
            max_lat: lat + delta,
            min_lng: lng - lng_delta,
            max_lng: lng + lng_delta,
        }
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }
}
