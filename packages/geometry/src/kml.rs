//! KML placemark parsing.
//!
//! Walks the document with a streaming `quick-xml` reader and collects,
//! for each `<Placemark>`, its `<name>`, every `<SimpleData name="...">`
//! and `<Data name="..."><value>` pair, and the coordinate text of the
//! first `Polygon` outer ring, `LineString` and `Point` it contains.
//! Element names are matched by local name, so the KML namespace prefix
//! (or its absence) does not matter.
//!
//! When a placemark carries several geometry kinds, the polygon wins over
//! the line, and the line over the point.

use std::collections::BTreeMap;

use field_radius_geometry_models::{FragmentGeometry, GeometryKind, Placemark};
use geo::{Area, Coord, LineString, Point, Polygon};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
    name::LocalName,
};

use crate::{ExtractError, GeometryError};

/// Attribute key under which the `<name>` element is stored.
pub const NAME_ATTRIBUTE: &str = "Name";

/// A placemark whose geometry could not be built.
#[derive(Debug)]
pub struct RejectedPlacemark {
    /// Zero-based position of the placemark in the document.
    pub index: usize,
    /// The `<name>` of the placemark, if it had one.
    pub name: Option<String>,
    /// Why the geometry was rejected.
    pub error: GeometryError,
}

/// Placemarks of one document, split into usable and rejected ones.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    /// Placemarks with a valid geometry, with their document position.
    pub placemarks: Vec<(usize, Placemark)>,
    /// Placemarks that were skipped.
    pub rejected: Vec<RejectedPlacemark>,
}

/// Raw state accumulated between `<Placemark>` and `</Placemark>`.
#[derive(Debug, Default)]
struct PendingPlacemark {
    attributes: BTreeMap<String, String>,
    polygon: Option<String>,
    line: Option<String>,
    point: Option<String>,
    data_name: Option<String>,
    simple_data_name: Option<String>,
    text: String,
}

impl PendingPlacemark {
    fn into_placemark(self) -> Result<Placemark, GeometryError> {
        let geometry = if let Some(text) = &self.polygon {
            FragmentGeometry::Polygon(parse_polygon(text)?)
        } else if let Some(text) = &self.line {
            FragmentGeometry::Line(parse_line(text)?)
        } else if let Some(text) = &self.point {
            FragmentGeometry::Point(parse_point(text)?)
        } else {
            return Err(GeometryError::Missing);
        };

        Ok(Placemark {
            attributes: self.attributes,
            geometry,
        })
    }
}

/// Reader state between events.
#[derive(Debug, Default)]
struct DocumentState {
    parsed: ParsedDocument,
    stack: Vec<String>,
    current: Option<PendingPlacemark>,
    placemark_depth: usize,
    index: usize,
}

impl DocumentState {
    fn open(&mut self, e: &BytesStart) -> Result<(), ExtractError> {
        let name = e.local_name();
        let tag = local_name_as_str(&name).to_string();
        if tag == "Placemark" {
            self.current = Some(PendingPlacemark::default());
            self.placemark_depth = self.stack.len();
        } else if let Some(pending) = self.current.as_mut() {
            match tag.as_str() {
                "SimpleData" => {
                    pending.simple_data_name = attribute_value(e, "name")?;
                }
                "Data" => {
                    pending.data_name = attribute_value(e, "name")?;
                }
                _ => {}
            }
            pending.text.clear();
        }
        self.stack.push(tag);
        Ok(())
    }

    fn close(&mut self, tag: &str) {
        self.stack.pop();

        if tag == "Placemark" {
            if let Some(pending) = self.current.take() {
                self.finish_placemark(pending);
            }
            self.index += 1;
            return;
        }

        if let Some(pending) = self.current.as_mut() {
            let ancestors = self
                .stack
                .get(self.placemark_depth + 1..)
                .unwrap_or_default();
            close_element(pending, tag, ancestors);
        }
    }

    fn finish_placemark(&mut self, pending: PendingPlacemark) {
        let index = self.index;
        let placemark_name = pending.attributes.get(NAME_ATTRIBUTE).cloned();
        match pending.into_placemark() {
            Ok(placemark) => self.parsed.placemarks.push((index, placemark)),
            Err(error) => {
                log::warn!(
                    "Skipping placemark #{index} ({}): {error}",
                    placemark_name.as_deref().unwrap_or("no name"),
                );
                self.parsed.rejected.push(RejectedPlacemark {
                    index,
                    name: placemark_name,
                    error,
                });
            }
        }
    }
}

/// Parses every placemark of a KML document.
///
/// Self-closing elements count as an empty open/close pair, so
/// `<SimpleData name="X"/>` records `X` with an empty value.
///
/// # Errors
///
/// Returns [`ExtractError::Xml`] if the document is not well-formed XML.
/// Individual placemarks with bad geometry are reported in
/// [`ParsedDocument::rejected`] instead.
pub fn parse_document(document: &str) -> Result<ParsedDocument, ExtractError> {
    let mut reader = Reader::from_str(document);
    reader.trim_text(true);

    let mut state = DocumentState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => state.open(e)?,
            Ok(Event::Empty(ref e)) => {
                state.open(e)?;
                let name = e.local_name();
                state.close(local_name_as_str(&name));
            }
            Ok(Event::Text(e)) => {
                if let Some(pending) = state.current.as_mut() {
                    pending.text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(pending) = state.current.as_mut() {
                    pending.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                state.close(local_name_as_str(&name));
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(err.into()),
            _ => {}
        }
    }

    let parsed = state.parsed;
    log::debug!(
        "Parsed {} placemarks ({} rejected)",
        parsed.placemarks.len(),
        parsed.rejected.len()
    );

    Ok(parsed)
}

/// Routes the text collected for a just-closed element into the pending
/// placemark. `stack` holds the ancestors of the closed element below
/// the `<Placemark>` itself.
fn close_element(pending: &mut PendingPlacemark, tag: &str, stack: &[String]) {
    let text = std::mem::take(&mut pending.text);
    let text = text.trim();

    match tag {
        // Only the placemark's own <name>, not one nested in e.g. <Data>.
        "name" if stack.is_empty() => {
            if !text.is_empty() {
                pending
                    .attributes
                    .insert(NAME_ATTRIBUTE.to_string(), text.to_string());
            }
        }
        "SimpleData" => {
            if let Some(key) = pending.simple_data_name.take() {
                pending.attributes.insert(key, text.to_string());
            }
        }
        "value" if stack.last().is_some_and(|parent| parent == "Data") => {
            if let Some(key) = pending.data_name.clone() {
                pending.attributes.insert(key, text.to_string());
            }
        }
        "Data" => {
            pending.data_name = None;
        }
        "coordinates" => {
            let within = |name: &str| stack.iter().any(|s| s == name);
            let slot = if within("Polygon") {
                within("outerBoundaryIs").then_some(&mut pending.polygon)
            } else if within("LineString") {
                Some(&mut pending.line)
            } else if within("Point") {
                Some(&mut pending.point)
            } else {
                None
            };
            if let Some(slot) = slot {
                if slot.is_none() {
                    *slot = Some(text.to_string());
                }
            }
        }
        _ => {}
    }
}

/// Parses a KML coordinate list: `lon,lat[,alt]` tuples separated by
/// whitespace. Altitude is ignored.
///
/// # Errors
///
/// Returns [`GeometryError::MalformedCoordinate`] for any tuple that does
/// not hold at least two finite numbers.
pub fn parse_coordinates(text: &str) -> Result<Vec<Coord<f64>>, GeometryError> {
    text.split_whitespace()
        .map(|tuple| {
            let mut parts = tuple.split(',');
            let lon = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
            let lat = parts.next().and_then(|s| s.trim().parse::<f64>().ok());
            match (lon, lat) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(GeometryError::MalformedCoordinate {
                    tuple: tuple.to_string(),
                }),
            }
        })
        .collect()
}

fn parse_polygon(text: &str) -> Result<Polygon<f64>, GeometryError> {
    let mut coords = parse_coordinates(text)?;
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords.dedup();
    if coords.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            kind: GeometryKind::Polygon,
            found: coords.len(),
            required: 3,
        });
    }

    let polygon = Polygon::new(LineString::from(coords), Vec::new());
    if polygon.unsigned_area() <= 0.0 {
        return Err(GeometryError::Degenerate);
    }
    Ok(polygon)
}

fn parse_line(text: &str) -> Result<LineString<f64>, GeometryError> {
    let mut coords = parse_coordinates(text)?;
    coords.dedup();
    if coords.len() < 2 {
        return Err(GeometryError::TooFewVertices {
            kind: GeometryKind::Line,
            found: coords.len(),
            required: 2,
        });
    }
    Ok(LineString::from(coords))
}

fn parse_point(text: &str) -> Result<Point<f64>, GeometryError> {
    let coords = parse_coordinates(text)?;
    coords
        .first()
        .map(|c| Point::from(*c))
        .ok_or(GeometryError::TooFewVertices {
            kind: GeometryKind::Point,
            found: 0,
            required: 1,
        })
}

fn attribute_value(event: &BytesStart, key: &str) -> Result<Option<String>, ExtractError> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if let Ok(name) = std::str::from_utf8(attr.key.local_name().as_ref()) {
            if name.eq_ignore_ascii_case(key) {
                let decoded = std::str::from_utf8(&attr.value).map_err(quick_xml::Error::from)?;
                let unescaped =
                    quick_xml::escape::unescape(decoded).map_err(quick_xml::Error::from)?;
                return Ok(Some(unescaped.into_owned()));
            }
        }
    }
    Ok(None)
}

fn local_name_as_str<'a>(name: &'a LocalName<'a>) -> &'a str {
    std::str::from_utf8(name.as_ref()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kml(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2"><Document>{body}</Document></kml>"#
        )
    }

    #[test]
    fn parses_polygon_with_attributes() {
        let doc = kml(
            r"<Placemark>
                <name>Talhao 1</name>
                <ExtendedData><SchemaData schemaUrl='#s'>
                  <SimpleData name='NOME_FAZ'>Fazenda Boa Vista</SimpleData>
                </SchemaData></ExtendedData>
                <Polygon><outerBoundaryIs><LinearRing><coordinates>
                  -49.0,-16.0,0 -48.9,-16.0,0 -48.9,-15.9,0 -49.0,-15.9,0 -49.0,-16.0,0
                </coordinates></LinearRing></outerBoundaryIs></Polygon>
              </Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert_eq!(parsed.placemarks.len(), 1);
        let (_, placemark) = &parsed.placemarks[0];
        assert_eq!(placemark.attributes["Name"], "Talhao 1");
        assert_eq!(placemark.attributes["NOME_FAZ"], "Fazenda Boa Vista");
        match &placemark.geometry {
            FragmentGeometry::Polygon(p) => assert_eq!(p.exterior().0.len(), 5),
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn reads_extended_data_values() {
        let doc = kml(
            r#"<Placemark><name>P</name>
                <ExtendedData><Data name="NOME_FAZ"><value>Sede</value></Data></ExtendedData>
                <Point><coordinates>-49.2,-16.7</coordinates></Point>
              </Placemark>"#,
        );
        let parsed = parse_document(&doc).unwrap();
        assert_eq!(parsed.placemarks[0].1.attributes["NOME_FAZ"], "Sede");
    }

    #[test]
    fn prefers_polygon_over_line_and_point() {
        let doc = kml(
            r"<Placemark><name>Mixed</name><MultiGeometry>
                <Point><coordinates>1,1</coordinates></Point>
                <LineString><coordinates>0,0 1,1</coordinates></LineString>
                <Polygon><outerBoundaryIs><LinearRing><coordinates>
                  0,0 1,0 1,1 0,0
                </coordinates></LinearRing></outerBoundaryIs></Polygon>
              </MultiGeometry></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert!(matches!(
            parsed.placemarks[0].1.geometry,
            FragmentGeometry::Polygon(_)
        ));
    }

    #[test]
    fn prefers_line_over_point() {
        let doc = kml(
            r"<Placemark><MultiGeometry>
                <Point><coordinates>1,1</coordinates></Point>
                <LineString><coordinates>0,0 1,1</coordinates></LineString>
              </MultiGeometry></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert!(matches!(
            parsed.placemarks[0].1.geometry,
            FragmentGeometry::Line(_)
        ));
    }

    #[test]
    fn ignores_inner_boundaries() {
        let doc = kml(
            r"<Placemark><Polygon>
                <innerBoundaryIs><LinearRing><coordinates>9,9 9,8 8,8 9,9</coordinates></LinearRing></innerBoundaryIs>
                <outerBoundaryIs><LinearRing><coordinates>0,0 4,0 4,4 0,4 0,0</coordinates></LinearRing></outerBoundaryIs>
              </Polygon></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        match &parsed.placemarks[0].1.geometry {
            FragmentGeometry::Polygon(p) => {
                assert!((p.unsigned_area() - 16.0).abs() < 1e-9);
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_coordinates_without_failing_document() {
        let doc = kml(
            r"<Placemark><name>Bad</name><Point><coordinates>abc,def</coordinates></Point></Placemark>
              <Placemark><name>Good</name><Point><coordinates>-49.2,-16.7</coordinates></Point></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert_eq!(parsed.placemarks.len(), 1);
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].index, 0);
        assert_eq!(parsed.rejected[0].name.as_deref(), Some("Bad"));
        assert!(matches!(
            parsed.rejected[0].error,
            GeometryError::MalformedCoordinate { .. }
        ));
    }

    #[test]
    fn rejects_polygons_with_too_few_vertices() {
        let doc = kml(
            r"<Placemark><Polygon><outerBoundaryIs><LinearRing>
                <coordinates>0,0 1,1 0,0</coordinates>
              </LinearRing></outerBoundaryIs></Polygon></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert!(matches!(
            parsed.rejected[0].error,
            GeometryError::TooFewVertices { required: 3, .. }
        ));
    }

    #[test]
    fn rejects_collinear_polygons() {
        let doc = kml(
            r"<Placemark><Polygon><outerBoundaryIs><LinearRing>
                <coordinates>0,0 1,1 2,2 0,0</coordinates>
              </LinearRing></outerBoundaryIs></Polygon></Placemark>",
        );
        let parsed = parse_document(&doc).unwrap();
        assert!(matches!(parsed.rejected[0].error, GeometryError::Degenerate));
    }

    #[test]
    fn placemark_without_geometry_is_rejected() {
        let doc = kml("<Placemark><name>Empty</name></Placemark>");
        let parsed = parse_document(&doc).unwrap();
        assert!(parsed.placemarks.is_empty());
        assert!(matches!(parsed.rejected[0].error, GeometryError::Missing));
    }

    #[test]
    fn self_closing_simple_data_records_empty_value() {
        let doc = kml(
            r#"<Placemark><name>Lote</name>
                <ExtendedData><SchemaData>
                  <SimpleData name="CODIGO"/>
                  <SimpleData name="NOME">Lote 7</SimpleData>
                </SchemaData></ExtendedData>
                <Point><coordinates>-49.2,-16.7</coordinates></Point>
              </Placemark>"#,
        );
        let parsed = parse_document(&doc).unwrap();
        let attributes = &parsed.placemarks[0].1.attributes;
        assert_eq!(attributes["CODIGO"], "");
        assert_eq!(attributes["NOME"], "Lote 7");
    }

    #[test]
    fn self_closing_placemark_is_rejected_and_counted() {
        let doc = kml(
            r#"<Placemark/>
              <Placemark><name>P</name>
                <Point><coordinates>-49.2,-16.7</coordinates></Point>
              </Placemark>"#,
        );
        let parsed = parse_document(&doc).unwrap();
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].index, 0);
        assert!(matches!(parsed.rejected[0].error, GeometryError::Missing));
        assert_eq!(parsed.placemarks.len(), 1);
        assert_eq!(parsed.placemarks[0].0, 1);
    }

    #[test]
    fn document_without_placemarks_is_empty() {
        let parsed = parse_document(&kml("")).unwrap();
        assert!(parsed.placemarks.is_empty());
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_document("<kml><Placemark></kml>").is_err());
    }

    #[test]
    fn parses_coordinates_with_and_without_altitude() {
        let coords = parse_coordinates("-49.1,-16.2,0\n  -49.0,-16.1").unwrap();
        assert_eq!(coords.len(), 2);
        assert!((coords[0].x - -49.1).abs() < f64::EPSILON);
        assert!((coords[1].y - -16.1).abs() < f64::EPSILON);
    }
}
