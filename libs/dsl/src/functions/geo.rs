//! Geodetic built-ins.

use crate::error::{Error, Result};
use crate::value::Value;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn dispatch(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "distance_between" => {
            let from = parse_location(&args[0])?;
            let to = parse_location(&args[1])?;
            let km = haversine(from, to);
            Decimal::from_f64(km)
                .map(Value::Number)
                .ok_or_else(|| Error::Type("distance_between() result out of range".into()))
        }
        other => Err(Error::UnknownFunction(other.to_string())),
    }
}

/// Accepts `"lat,lng"` text, `{lat, lng}` maps, and `[lat, lng]` lists.
fn parse_location(value: &Value) -> Result<(f64, f64)> {
    let pair = match value {
        Value::Text(s) => {
            let mut parts = s.split(',');
            let lat = parts.next().and_then(|p| p.trim().parse::<f64>().ok());
            let lng = parts.next().and_then(|p| p.trim().parse::<f64>().ok());
            match (lat, lng, parts.next()) {
                (Some(lat), Some(lng), None) => Some((lat, lng)),
                _ => None,
            }
        }
        Value::Map(fields) => {
            let lat = fields.get("lat").and_then(coordinate);
            let lng = fields
                .get("lng")
                .or_else(|| fields.get("lon"))
                .and_then(coordinate);
            lat.zip(lng)
        }
        Value::List(items) if items.len() == 2 => {
            coordinate(&items[0]).zip(coordinate(&items[1]))
        }
        _ => None,
    };

    let (lat, lng) = pair.ok_or_else(|| {
        Error::Type(format!(
            "distance_between() cannot read a location from {}",
            value.type_name()
        ))
    })?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(Error::Type(format!(
            "distance_between() coordinates out of range: {}, {}",
            lat, lng
        )));
    }
    Ok((lat, lng))
}

fn coordinate(value: &Value) -> Option<f64> {
    value.as_decimal().and_then(|d| d.to_f64())
}

fn haversine(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = lng2 - lng1;

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
