use std::fmt::Write;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Gpx2CsvError, Result};
use crate::gpx_types::*;
use crate::options::ConvertOptions;
use crate::{radiation, solar};

/// Sensor readings carried in a point's <extensions>, kept as the raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorExtensions {
    pub temperature: Option<String>,
    pub heart_rate: Option<String>,
    pub cadence: Option<String>,
    pub power: Option<String>,
}

impl SensorExtensions {
    /// Collect known sensor tags from extension elements. Container elements
    /// contribute their direct children, matched without namespace prefix.
    /// Leaf elements match on their tag as written, so `<ns3:hr>` directly
    /// under `<extensions>` is not a heart rate. A tag seen again overwrites
    /// the earlier value.
    pub fn from_elements(elements: &[ExtensionElement]) -> Self {
        let mut sensors = Self::default();
        for element in elements {
            if element.children.is_empty() {
                sensors.apply(&element.name, element.text.as_deref());
            } else {
                for child in &element.children {
                    sensors.apply(normalize_tag(&child.name), child.text.as_deref());
                }
            }
        }
        sensors
    }

    fn apply(&mut self, tag: &str, value: Option<&str>) {
        if let Some(field) = self.field_for(tag) {
            *field = value.map(str::to_string);
        }
    }

    fn field_for(&mut self, tag: &str) -> Option<&mut Option<String>> {
        match tag {
            "atemp" => Some(&mut self.temperature),
            "hr" => Some(&mut self.heart_rate),
            "cad" => Some(&mut self.cadence),
            "power" => Some(&mut self.power),
            _ => None,
        }
    }
}

/// Strip a `{namespace}` or `prefix:` qualifier from a tag name.
fn normalize_tag(tag: &str) -> &str {
    let tag = tag.rsplit_once('}').map_or(tag, |(_, local)| local);
    tag.rsplit_once(':').map_or(tag, |(_, local)| local).trim()
}

/// One output row: a track point with its derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub sensors: SensorExtensions,
    pub speed_ms: Option<f64>,
    pub sun_altitude: f64,
    pub sun_azimuth: f64,
    pub sun_radiation: f64,
    pub date: String,
    pub timestamp: f64,
    pub time_offset: f64,
}

/// Enrich every track point of a parsed file, in track → segment → point order.
pub fn enrich(data: &GpxData, opts: &ConvertOptions) -> Result<Vec<EnrichedRecord>> {
    let mut records = Vec::with_capacity(data.point_count());
    // Set by the first point of the file, shared by all tracks and segments
    let mut start: Option<f64> = None;

    for track in &data.tracks {
        debug!(
            track = track.name.as_deref().unwrap_or("<unnamed>"),
            segments = track.segments.len(),
            "enriching track"
        );
        for segment in &track.segments {
            for (index, point) in segment.points.iter().enumerate() {
                let time = point.time.ok_or(Gpx2CsvError::MissingField {
                    element: "trkpt",
                    field: "time",
                })?;
                let timestamp = epoch_seconds(time);
                let origin = *start.get_or_insert(timestamp);

                let sun_altitude = solar::altitude(point.lat, point.lon, time);
                let sun_azimuth = solar::azimuth(point.lat, point.lon, time);

                records.push(EnrichedRecord {
                    latitude: point.lat,
                    longitude: point.lon,
                    elevation: point.ele,
                    sensors: SensorExtensions::from_elements(&point.extensions),
                    speed_ms: segment.speed_at(index),
                    sun_altitude,
                    sun_azimuth,
                    sun_radiation: radiation::direct_irradiance(time, sun_altitude),
                    date: format_date(time, &opts.date_format)?,
                    timestamp,
                    time_offset: timestamp - origin,
                });
            }
        }
    }

    Ok(records)
}

fn epoch_seconds(time: DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9
}

fn format_date(time: DateTime<Utc>, format: &str) -> Result<String> {
    let mut date = String::new();
    write!(date, "{}", time.format(format))
        .map_err(|_| Gpx2CsvError::InvalidDateFormat(format.to_string()))?;
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_gpx;

    fn enrich_xml(xml: &str) -> Result<Vec<EnrichedRecord>> {
        let data = parse_gpx(xml).unwrap();
        enrich(&data, &ConvertOptions::default())
    }

    #[test]
    fn test_two_point_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="48.1" lon="11.5"><ele>520.0</ele><time>2024-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="48.1" lon="11.5"><ele>520.0</ele><time>2024-01-01T00:01:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let records = enrich_xml(xml).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].time_offset, 0.0);
        assert_eq!(records[1].time_offset, 60.0);
        assert_eq!(records[0].timestamp, 1_704_067_200.0);
        assert_eq!(records[1].date, "2024-01-01 00:01:00");
        assert_eq!(records[0].elevation, Some(520.0));
        for record in &records {
            assert_eq!(record.sensors, SensorExtensions::default());
            // Munich at midnight in January
            assert!(record.sun_altitude < 0.0);
            assert_eq!(record.sun_radiation, 0.0);
        }
    }

    #[test]
    fn test_zoned_time_is_reported_in_utc() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="47.37" lon="8.54"><time>2024-01-01T02:00:00+02:00</time></trkpt>
  <trkpt lat="47.37" lon="8.54"><time>2024-01-01T00:00:30Z</time></trkpt>
  <trkpt lat="47.37" lon="8.54"><time>2023-12-31T19:01:00-05:00</time></trkpt>
</trkseg></trk></gpx>"#;
        let records = enrich_xml(xml).unwrap();
        assert_eq!(records[0].date, "2024-01-01 00:00:00");
        assert_eq!(records[0].timestamp, 1_704_067_200.0);
        assert_eq!(records[2].date, "2024-01-01 00:01:00");
        assert_eq!(records[2].timestamp, 1_704_067_260.0);
        let offsets: Vec<f64> = records.iter().map(|r| r.time_offset).collect();
        assert_eq!(offsets, vec![0.0, 30.0, 60.0]);
    }

    #[test]
    fn test_offset_spans_segments_and_tracks() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="0" lon="0"><time>2024-06-01T10:00:00Z</time></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="0" lon="0"><time>2024-06-01T10:00:30Z</time></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="0" lon="0"><time>2024-06-01T11:00:00Z</time></trkpt>
      <trkpt lat="0" lon="0"><time>2024-06-01T11:00:10Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let records = enrich_xml(xml).unwrap();
        let offsets: Vec<f64> = records.iter().map(|r| r.time_offset).collect();
        assert_eq!(offsets, vec![0.0, 30.0, 3600.0, 3610.0]);
    }

    #[test]
    fn test_offset_follows_input_order() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="0" lon="0"><time>2024-06-01T10:00:00Z</time></trkpt>
  <trkpt lat="0" lon="0"><time>2024-06-01T09:59:00Z</time></trkpt>
</trkseg></trk></gpx>"#;
        let records = enrich_xml(xml).unwrap();
        assert_eq!(records[1].time_offset, -60.0);
    }

    #[test]
    fn test_daylight_point_has_radiation() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="51.4779" lon="0.0"><time>2024-06-21T12:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#;
        let records = enrich_xml(xml).unwrap();
        let record = &records[0];
        assert!(record.sun_altitude > 60.0);
        assert!((record.sun_azimuth - 180.0).abs() < 3.0);
        assert_eq!(
            record.sun_radiation,
            radiation::direct_irradiance(
                parse_time("2024-06-21T12:00:00Z").unwrap(),
                record.sun_altitude
            )
        );
        assert!(record.sun_radiation > 800.0);
        assert!(record.speed_ms.is_none());
    }

    #[test]
    fn test_sensor_extensions() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1"><trk><trkseg>
  <trkpt lat="0" lon="0">
    <time>2024-06-01T10:00:00Z</time>
    <extensions>
      <power>250</power>
      <gpxtpx:TrackPointExtension>
        <gpxtpx:atemp>18</gpxtpx:atemp>
        <gpxtpx:hr>142</gpxtpx:hr>
        <gpxtpx:cad>88</gpxtpx:cad>
        <gpxtpx:speed>7.1</gpxtpx:speed>
      </gpxtpx:TrackPointExtension>
    </extensions>
  </trkpt>
</trkseg></trk></gpx>"#;
        let records = enrich_xml(xml).unwrap();
        assert_eq!(
            records[0].sensors,
            SensorExtensions {
                temperature: Some("18".to_string()),
                heart_rate: Some("142".to_string()),
                cadence: Some("88".to_string()),
                power: Some("250".to_string()),
            }
        );
    }

    #[test]
    fn test_later_extension_wins() {
        let elements = vec![
            ExtensionElement::leaf("hr", Some("120")),
            ExtensionElement {
                name: "gpxtpx:TrackPointExtension".to_string(),
                text: None,
                children: vec![
                    ExtensionElement::leaf("gpxtpx:hr", Some("130")),
                    ExtensionElement::leaf("ns3:hr", Some("140")),
                ],
            },
            ExtensionElement::leaf("atemp", Some("20")),
            ExtensionElement::leaf("atemp", Some("21")),
        ];
        let sensors = SensorExtensions::from_elements(&elements);
        assert_eq!(sensors.heart_rate.as_deref(), Some("140"));
        assert_eq!(sensors.temperature.as_deref(), Some("21"));
        assert!(sensors.cadence.is_none());
        assert!(sensors.power.is_none());
    }

    #[test]
    fn test_namespaced_leaf_not_matched() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1" xmlns:ns3="http://www.garmin.com/xmlschemas/TrackPointExtension/v1"><trk><trkseg>
  <trkpt lat="0" lon="0">
    <time>2024-06-01T10:00:00Z</time>
    <extensions>
      <ns3:hr>150</ns3:hr>
      <ns3:cad>80</ns3:cad>
      <power>200</power>
    </extensions>
  </trkpt>
</trkseg></trk></gpx>"#;
        let records = enrich_xml(xml).unwrap();
        assert!(records[0].sensors.heart_rate.is_none());
        assert!(records[0].sensors.cadence.is_none());
        assert_eq!(records[0].sensors.power.as_deref(), Some("200"));
    }

    #[test]
    fn test_namespaced_leaf_keeps_earlier_value() {
        let elements = vec![
            ExtensionElement::leaf("hr", Some("120")),
            ExtensionElement::leaf("{http://example.com}hr", Some("121")),
        ];
        let sensors = SensorExtensions::from_elements(&elements);
        assert_eq!(sensors.heart_rate.as_deref(), Some("120"));
    }

    #[test]
    fn test_grandchildren_not_scanned() {
        let elements = vec![ExtensionElement {
            name: "outer".to_string(),
            text: None,
            children: vec![ExtensionElement {
                name: "inner".to_string(),
                text: None,
                children: vec![ExtensionElement::leaf("hr", Some("99"))],
            }],
        }];
        assert_eq!(
            SensorExtensions::from_elements(&elements),
            SensorExtensions::default()
        );
    }

    #[test]
    fn test_unknown_extensions_ignored() {
        let elements = vec![
            ExtensionElement::leaf("depth", Some("3")),
            ExtensionElement::leaf("course", Some("90")),
        ];
        assert_eq!(
            SensorExtensions::from_elements(&elements),
            SensorExtensions::default()
        );
    }

    #[test]
    fn test_missing_time_is_error() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="0" lon="0"><time>2024-06-01T10:00:00Z</time></trkpt>
  <trkpt lat="0" lon="0"></trkpt>
</trkseg></trk></gpx>"#;
        assert!(matches!(
            enrich_xml(xml),
            Err(Gpx2CsvError::MissingField { field: "time", .. })
        ));
    }

    #[test]
    fn test_custom_date_format() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="0" lon="0"><time>2024-06-01T10:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let opts = ConvertOptions {
            date_format: "%d/%m/%Y %H:%M".to_string(),
            ..Default::default()
        };
        let records = enrich(&data, &opts).unwrap();
        assert_eq!(records[0].date, "01/06/2024 10:00");
    }

    #[test]
    fn test_invalid_date_format() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1"><trk><trkseg>
  <trkpt lat="0" lon="0"><time>2024-06-01T10:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let opts = ConvertOptions {
            date_format: "%Q".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            enrich(&data, &opts),
            Err(Gpx2CsvError::InvalidDateFormat(_))
        ));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("gpxtpx:hr"), "hr");
        assert_eq!(normalize_tag("{http://www.garmin.com/ns}cad"), "cad");
        assert_eq!(normalize_tag("power"), "power");
    }
}
