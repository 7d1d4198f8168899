//! Geometry text parsing for license parcels and deposit outlines.
//!
//! Every encoding the data sources use ends up as the same shape: a list of
//! rings, each ring a list of `[lat, lon]` pairs. Sources always store
//! `lon lat`; the parser always flips.
//!
//! Accepted inputs:
//!   WKT       POLYGON((30 10, 40 40, ...)) / MULTIPOLYGON(((...)),((...)))
//!   GeoJSON   FeatureCollection, Feature, Polygon, MultiPolygon (as text or value)
//!   Wrapped   data-wkt="POLYGON((...))" copied out of an HTML attribute
//!
//! Anything else yields an empty list. Malformed input never errors.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// A single `[lat, lon]` coordinate.
pub type Coord = [f64; 2];

/// An ordered, closed sequence of coordinates.
pub type Ring = Vec<Coord>;

// ─── Patterns ───────────────────────────────────────────────────

fn wkt_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:MULTI)?POLYGON\s*(?:ZM|Z|M)?\s*\(").expect("static WKT header pattern")
    })
}

fn ring_group() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]*)\)").expect("static ring pattern"))
}

fn data_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)data-wkt\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("static attribute pattern")
    })
}

// ─── Entry points ───────────────────────────────────────────────

/// Parse geometry text in any supported encoding into `[lat, lon]` rings.
pub fn parse_geometry(text: &str) -> Vec<Ring> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if let Some(inner) = unwrap_data_attribute(text) {
        return parse_geometry(&inner);
    }

    match text.as_bytes()[0] {
        b'{' | b'[' | b'"' => match serde_json::from_str::<Value>(text) {
            Ok(value) => parse_geometry_value(&value),
            Err(_) => Vec::new(),
        },
        _ => parse_wkt(text),
    }
}

/// Parse an already-decoded JSON value.
///
/// Strings go through [`parse_geometry`]; objects are read as GeoJSON;
/// arrays are treated as lists of features or geometries. Numbers, booleans
/// and null produce nothing.
pub fn parse_geometry_value(value: &Value) -> Vec<Ring> {
    match value {
        Value::String(s) => parse_geometry(s),
        Value::Array(items) => items.iter().flat_map(parse_geometry_value).collect(),
        Value::Object(obj) => {
            let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
            match kind {
                "FeatureCollection" => obj
                    .get("features")
                    .map(parse_geometry_value)
                    .unwrap_or_default(),
                "Feature" => obj
                    .get("geometry")
                    .map(parse_geometry_value)
                    .unwrap_or_default(),
                "GeometryCollection" => obj
                    .get("geometries")
                    .map(parse_geometry_value)
                    .unwrap_or_default(),
                "Polygon" => obj
                    .get("coordinates")
                    .map(polygon_rings)
                    .unwrap_or_default(),
                "MultiPolygon" => match obj.get("coordinates") {
                    Some(Value::Array(polygons)) => polygons.iter().flat_map(polygon_rings).collect(),
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

/// Flip a raw `[[lon, lat], ...]` JSON ring into `[lat, lon]` order.
///
/// Entries that are not arrays of at least two numbers are skipped.
pub fn flip_ring(raw: &Value) -> Ring {
    let Some(points) = raw.as_array() else {
        return Vec::new();
    };
    points
        .iter()
        .filter_map(|p| {
            let pair = p.as_array()?;
            let lon = pair.first()?.as_f64()?;
            let lat = pair.get(1)?.as_f64()?;
            Some([lat, lon])
        })
        .collect()
}

// ─── GeoJSON ────────────────────────────────────────────────────

fn polygon_rings(coords: &Value) -> Vec<Ring> {
    match coords {
        Value::Array(rings) => rings
            .iter()
            .map(flip_ring)
            .filter(|r| !r.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

// ─── WKT ────────────────────────────────────────────────────────

fn parse_wkt(text: &str) -> Vec<Ring> {
    let Some(header) = wkt_header().find(text) else {
        return Vec::new();
    };
    // Keep the opening paren the header consumed.
    let body = &text[header.end() - 1..];
    if !parens_balanced(body) {
        return Vec::new();
    }

    ring_group()
        .captures_iter(body)
        .filter_map(|caps| {
            let ring = parse_pairs(&caps[1]);
            (!ring.is_empty()).then_some(ring)
        })
        .collect()
}

/// Depth never goes negative, returns to zero, and nothing but whitespace
/// follows the final close.
fn parens_balanced(body: &str) -> bool {
    let mut depth = 0i32;
    let mut closed = false;
    for ch in body.chars() {
        if closed && !ch.is_whitespace() {
            return false;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
                if depth == 0 {
                    closed = true;
                }
            }
            _ => {}
        }
    }
    closed
}

fn parse_pairs(list: &str) -> Ring {
    list.split(',')
        .filter_map(|pair| {
            let mut parts = pair.split_whitespace();
            let lon: f64 = parts.next()?.parse().ok()?;
            let lat: f64 = parts.next()?.parse().ok()?;
            (lon.is_finite() && lat.is_finite()).then_some([lat, lon])
        })
        .collect()
}

fn unwrap_data_attribute(text: &str) -> Option<String> {
    let caps = data_attribute().captures(text)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    Some(
        raw.replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&"),
    )
}

// ─── Bounds ─────────────────────────────────────────────────────

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    fn point(c: Coord) -> Self {
        Self { south: c[0], west: c[1], north: c[0], east: c[1] }
    }

    pub fn extend(&mut self, c: Coord) {
        self.south = self.south.min(c[0]);
        self.north = self.north.max(c[0]);
        self.west = self.west.min(c[1]);
        self.east = self.east.max(c[1]);
    }

    /// Bounds of a single ring; `None` when it has no points.
    pub fn of_ring(ring: &[Coord]) -> Option<Self> {
        Self::of_rings(std::iter::once(ring))
    }

    /// Bounds covering every point of every ring.
    pub fn of_rings<'a, I>(rings: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [Coord]>,
    {
        let mut bounds: Option<Self> = None;
        for c in rings.into_iter().flatten() {
            match bounds.as_mut() {
                Some(b) => b.extend(*c),
                None => bounds = Some(Self::point(*c)),
            }
        }
        bounds
    }

    /// `[lat, lon]` midpoint of the box.
    pub fn center(&self) -> Coord {
        [(self.south + self.north) / 2.0, (self.west + self.east) / 2.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_polygon_flips_to_lat_lon() {
        let rings = parse_geometry("POLYGON((30 10, 40 40, 20 40, 10 20, 30 10))");
        assert_eq!(
            rings,
            vec![vec![[10.0, 30.0], [40.0, 40.0], [40.0, 20.0], [20.0, 10.0], [10.0, 30.0]]]
        );
    }

    #[test]
    fn test_multipolygon_two_rings() {
        let rings = parse_geometry("MULTIPOLYGON(((0 0,4 0,4 4,0 4,0 0)),((5 5,6 5,6 6,5 6,5 5)))");
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1][1], [5.0, 6.0]);
    }

    #[test]
    fn test_multipolygon_with_spaces_and_lowercase() {
        let rings = parse_geometry(
            "multipolygon ( ((71.1 51.2, 71.3 51.2, 71.3 51.4, 71.1 51.2)), ((72 52, 73 52, 72 53, 72 52)) )",
        );
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0][0], [51.2, 71.1]);
    }

    #[test]
    fn test_polygon_with_hole_returns_both_rings() {
        let rings = parse_geometry("POLYGON((0 0, 10 0, 10 10, 0 0), (1 1, 2 1, 2 2, 1 1))");
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_geometry("").is_empty());
        assert!(parse_geometry("   ").is_empty());
        assert!(parse_geometry("POINT(30 10)").is_empty());
        assert!(parse_geometry("POLYGON EMPTY").is_empty());
        assert!(parse_geometry("not a geometry").is_empty());
    }

    #[test]
    fn test_malformed_wkt_is_empty() {
        assert!(parse_geometry("POLYGON((30 10, 40 40").is_empty());
        assert!(parse_geometry("POLYGON((30 10, 40 40)))").is_empty());
        assert!(parse_geometry("POLYGON((30 10, 40 40)) trailing").is_empty());
        assert!(parse_geometry("{not json").is_empty());
    }

    #[test]
    fn test_non_string_value_is_empty() {
        assert!(parse_geometry_value(&json!(42)).is_empty());
        assert!(parse_geometry_value(&json!(null)).is_empty());
        assert!(parse_geometry_value(&json!(true)).is_empty());
    }

    #[test]
    fn test_bad_pairs_are_dropped() {
        let rings = parse_geometry("POLYGON((30 10, abc def, 40, 40 40 5, 20 40))");
        assert_eq!(rings, vec![vec![[10.0, 30.0], [40.0, 40.0], [40.0, 20.0]]]);
    }

    #[test]
    fn test_ring_without_valid_pairs_is_dropped() {
        let rings = parse_geometry("MULTIPOLYGON(((x y)),((1 2, 3 4)))");
        assert_eq!(rings, vec![vec![[2.0, 1.0], [4.0, 3.0]]]);
    }

    #[test]
    fn test_data_attribute_wrapper() {
        let rings = parse_geometry(r#"<div data-wkt="POLYGON((30 10, 40 40, 30 10))"></div>"#);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][0], [10.0, 30.0]);

        let single = parse_geometry("data-wkt='MULTIPOLYGON(((0 0,1 0,0 0)))'");
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn test_data_attribute_decodes_entities() {
        let html = r#"<div data-wkt="{&quot;type&quot;:&quot;Polygon&quot;,&quot;coordinates&quot;:[[[82,50],[83,50],[82,51],[82,50]]]}"></div>"#;
        let rings = parse_geometry(html);
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0][0], [50.0, 82.0]);
        assert_eq!(rings[0].len(), 4);

        assert_eq!(
            unwrap_data_attribute("data-wkt='a &amp; b &#39;c&#39;'").as_deref(),
            Some("a & b 'c'")
        );
    }

    #[test]
    fn test_geojson_feature_collection_text() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[76.9, 43.2], [77.0, 43.2], [76.9, 43.3], [76.9, 43.2]]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiPolygon", "coordinates": [[[[1, 2], [3, 4], [1, 2]]], [[[5, 6], [7, 8], [5, 6]]]]}}
            ]
        }"#;
        let rings = parse_geometry(text);
        assert_eq!(rings.len(), 3);
        assert_eq!(rings[0][0], [43.2, 76.9]);
        assert_eq!(rings[2][1], [8.0, 7.0]);
    }

    #[test]
    fn test_json_encoded_wkt_string() {
        let rings = parse_geometry(r#""POLYGON((1 2, 3 4, 1 2))""#);
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn test_flip_ring_skips_bad_points() {
        let ring = flip_ring(&json!([[82.6, 49.9], ["x", 1], [82.7], [82.8, 50.1]]));
        assert_eq!(ring, vec![[49.9, 82.6], [50.1, 82.8]]);
        assert!(flip_ring(&json!("nope")).is_empty());
    }

    #[test]
    fn test_bounds_center() {
        let rings = parse_geometry("MULTIPOLYGON(((0 0,4 0,4 4,0 4,0 0)),((5 5,6 5,6 6,5 6,5 5)))");
        let bounds = Bounds::of_rings(rings.iter().map(|r| r.as_slice())).unwrap();
        assert_eq!(bounds, Bounds { south: 0.0, west: 0.0, north: 6.0, east: 6.0 });
        assert_eq!(bounds.center(), [3.0, 3.0]);
        assert!(Bounds::of_ring(&[]).is_none());
    }
}
