// JSON documents shaped like the weather API responses

use super::{DataSource, DataSourceError};
use crate::geo::GeoBounds;
use crate::sample::{GridPayload, WindSample};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Either the API envelope or the bare payload
#[derive(Deserialize)]
#[serde(untagged)]
enum Document<T> {
    Envelope(Envelope<T>),
    Bare(T),
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

/// Samples come as a plain list or wrapped as `{"vectors": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum SampleList {
    Plain(Vec<WindSample>),
    Wrapped { vectors: Vec<WindSample> },
}

impl SampleList {
    fn into_samples(self) -> Vec<WindSample> {
        match self {
            SampleList::Plain(samples) => samples,
            SampleList::Wrapped { vectors } => vectors,
        }
    }
}

/// Reads wind data from a JSON file on disk
///
/// Accepts `{"success": true, "data": ...}`, `{"success": false, "error": "..."}`
/// or the payload on its own. A missing file counts as an unavailable source.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document<T: DeserializeOwned>(&self) -> Result<T, DataSourceError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(DataSourceError::Unavailable(format!(
                    "{} does not exist",
                    self.path.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };
        parse_document(&text)
    }
}

fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T, DataSourceError> {
    match serde_json::from_str::<Document<T>>(text)? {
        Document::Bare(payload) => Ok(payload),
        Document::Envelope(Envelope {
            success: false,
            error,
            ..
        }) => Err(DataSourceError::Unavailable(
            error.unwrap_or_else(|| "request was not successful".to_string()),
        )),
        Document::Envelope(Envelope { data: None, .. }) => Err(DataSourceError::Malformed(
            "successful response without data".to_string(),
        )),
        Document::Envelope(Envelope {
            data: Some(payload),
            ..
        }) => Ok(payload),
    }
}

impl DataSource for JsonFileSource {
    fn fetch_vector_field(&self) -> Result<GridPayload, DataSourceError> {
        let payload: GridPayload = self.read_document()?;
        log::debug!(
            "Read {}x{} wind grid from {}",
            payload.grid_size,
            payload.grid_size,
            self.path.display()
        );
        Ok(payload)
    }

    fn fetch_samples(&self, region: &GeoBounds) -> Result<Vec<WindSample>, DataSourceError> {
        let list: SampleList = self.read_document()?;
        let samples: Vec<WindSample> = list
            .into_samples()
            .into_iter()
            .filter(|s| region.contains(s.lat, s.lng))
            .collect();
        log::debug!(
            "Read {} wind samples inside the region from {}",
            samples.len(),
            self.path.display()
        );
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare_list(r#"[{"lat": 1.0, "lng": 2.0, "u": 3.0, "v": 4.0}]"#)]
    #[case::wrapped(r#"{"vectors": [{"lat": 1.0, "lng": 2.0, "u": 3.0, "v": 4.0}]}"#)]
    #[case::envelope(r#"{"success": true, "data": [{"lat": 1.0, "lng": 2.0, "u": 3.0, "v": 4.0}]}"#)]
    #[case::envelope_wrapped(
        r#"{"success": true, "data": {"vectors": [{"lat": 1.0, "lng": 2.0, "u": 3.0, "v": 4.0}]}}"#
    )]
    fn test_sample_document_shapes(#[case] text: &str) {
        let samples = parse_document::<SampleList>(text).unwrap().into_samples();
        assert_eq!(samples, vec![WindSample::from_components(1.0, 2.0, 3.0, 4.0)]);
    }

    #[test]
    fn test_unsuccessful_response_is_unavailable() {
        let text = r#"{"success": false, "error": "upstream timeout"}"#;
        match parse_document::<SampleList>(text) {
            Err(DataSourceError::Unavailable(message)) => assert_eq!(message, "upstream timeout"),
            other => panic!("unexpected result {:?}", other.map(|l| l.into_samples())),
        }
    }

    #[test]
    fn test_success_without_data_is_malformed() {
        let text = r#"{"success": true}"#;
        assert!(matches!(
            parse_document::<GridPayload>(text),
            Err(DataSourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(
            parse_document::<GridPayload>("{not json"),
            Err(DataSourceError::Json(_))
        ));
    }

    #[test]
    fn test_grid_envelope() {
        let text = r#"{"success": true, "data": {
            "grid": [[{"u": 1.0, "v": 0.0}, {"u": 2.0, "v": 0.0}], [{"u": 3.0, "v": 0.0}, null]],
            "gridSize": 1, "latMin": -10.0, "latMax": 10.0, "lngMin": 0.0, "lngMax": 20.0
        }}"#;
        let payload = parse_document::<GridPayload>(text).unwrap();
        assert_eq!(payload.grid_size, 1);
        assert_eq!(payload.lng_max, 20.0);
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let source = JsonFileSource::new("does/not/exist.json");
        assert!(matches!(
            source.fetch_samples(&GeoBounds::GLOBAL),
            Err(DataSourceError::Unavailable(_))
        ));
        assert!(matches!(
            source.fetch_vector_field(),
            Err(DataSourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_shipped_samples_are_readable() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/wind_samples.json");
        let samples = JsonFileSource::new(path)
            .fetch_samples(&GeoBounds::GLOBAL)
            .unwrap();
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.wind().is_some()));
    }

    #[test]
    fn test_samples_outside_region_are_dropped() {
        let dir = std::env::temp_dir().join(format!(
            "windfield_region_test_{}.json",
            std::process::id()
        ));
        std::fs::write(
            &dir,
            r#"[{"lat": 5.0, "lng": 5.0, "u": 1.0, "v": 0.0},
                {"lat": 50.0, "lng": 5.0, "u": 1.0, "v": 0.0}]"#,
        )
        .unwrap();
        let samples = JsonFileSource::new(&dir)
            .fetch_samples(&GeoBounds::new(0.0, 10.0, 0.0, 10.0))
            .unwrap();
        let _ = std::fs::remove_file(&dir);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].lat, 5.0);
    }
}
