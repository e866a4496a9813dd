//! Records of the pre-v3 save files, `map.yml` and `poster.yml`.
//!
//! Both files are flat YAML mappings. `IdCount` holds a record counter and is
//! not a record.
//!
//! ```yaml
//! # map.yml: <key>: [<id>, <name>, <player name>]
//! IdCount: 1
//! sunset: ['12', sunset, Notch]
//!
//! # poster.yml: <key>: [<player name>, <id>, <id>, ...]
//! IdCount: 1
//! poster: [Notch, '13', '14', '15']
//! ```

use std::ops::RangeInclusive;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::types::{ImageMap, MapId, OwnerId, PosterGrid};

/// Counter key present in both legacy files.
pub const ID_COUNT_KEY: &str = "IdCount";

/// A legacy record that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid record '{key}': {reason}")]
pub struct InvalidRecord {
    pub key: String,
    pub reason: String,
}

impl InvalidRecord {
    fn new(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// A single map from `map.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldSavedMap {
    /// Record key in the file. Kept so deferred records are written back
    /// under the same key.
    pub key: String,
    pub id: MapId,
    pub name: String,
    pub user_name: String,
}

impl OldSavedMap {
    pub fn from_value(key: &str, value: &Value) -> Result<Self, InvalidRecord> {
        let fields = value
            .as_sequence()
            .ok_or_else(|| InvalidRecord::new(key, "map data is not a list"))?;
        if fields.len() < 3 {
            return Err(InvalidRecord::new(
                key,
                format!("map data too short (given: {}, expected 3)", fields.len()),
            ));
        }
        Ok(Self {
            key: key.to_string(),
            id: parse_id(key, &fields[0])?,
            name: scalar(&fields[1]).ok_or_else(|| InvalidRecord::new(key, "map name is not text"))?,
            user_name: scalar(&fields[2])
                .ok_or_else(|| InvalidRecord::new(key, "player name is not text"))?,
        })
    }

    fn to_value(&self) -> Value {
        Value::Sequence(vec![
            Value::String(self.id.to_string()),
            Value::String(self.name.clone()),
            Value::String(self.user_name.clone()),
        ])
    }

    pub fn to_image_map(&self, owner: OwnerId, key: impl Into<String>) -> ImageMap {
        ImageMap::single(owner, key, self.name.clone(), self.id)
    }
}

/// A poster from `poster.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldSavedPoster {
    pub key: String,
    pub user_name: String,
    pub ids: Vec<MapId>,
}

impl OldSavedPoster {
    pub fn from_value(key: &str, value: &Value) -> Result<Self, InvalidRecord> {
        let fields = value
            .as_sequence()
            .ok_or_else(|| InvalidRecord::new(key, "poster data is not a list"))?;
        if fields.len() < 2 {
            return Err(InvalidRecord::new(
                key,
                format!("poster data too short (given: {}, expected at least 2)", fields.len()),
            ));
        }
        let user_name =
            scalar(&fields[0]).ok_or_else(|| InvalidRecord::new(key, "player name is not text"))?;
        let ids = fields[1..]
            .iter()
            .map(|v| parse_id(key, v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            key: key.to_string(),
            user_name,
            ids,
        })
    }

    fn to_value(&self) -> Value {
        let mut fields = vec![Value::String(self.user_name.clone())];
        fields.extend(self.ids.iter().map(|id| Value::String(id.to_string())));
        Value::Sequence(fields)
    }

    pub fn contains(&self, map: &OldSavedMap) -> bool {
        self.ids.contains(&map.id)
    }

    /// Ranges of IDs missing between the poster's lowest and highest ID.
    ///
    /// Legacy posters were allocated as one block, so a hole suggests lost
    /// data. This is a hint only.
    pub fn id_gaps(&self) -> Vec<RangeInclusive<MapId>> {
        let mut ids = self.ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids.windows(2)
            .filter(|pair| pair[1] - pair[0] > 1)
            .map(|pair| (pair[0] + 1)..=(pair[1] - 1))
            .collect()
    }

    /// Legacy posters did not record their geometry; they become one row.
    pub fn to_image_map(
        &self,
        owner: OwnerId,
        key: impl Into<String>,
    ) -> crate::error::Result<ImageMap> {
        let grid = PosterGrid::single_row(self.ids.clone())?;
        Ok(ImageMap::poster(owner, key, self.key.clone(), grid))
    }
}

/// Records read from one legacy file.
#[derive(Debug)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub invalid: Vec<InvalidRecord>,
}

/// Read a legacy file into a YAML mapping. An empty file is an empty mapping.
pub fn read_document(path: &Path) -> std::io::Result<Mapping> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(&content) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "top level is not a mapping",
        )),
        Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
    }
}

pub fn parse_maps(doc: &Mapping) -> Parsed<OldSavedMap> {
    parse_records(doc, OldSavedMap::from_value)
}

pub fn parse_posters(doc: &Mapping) -> Parsed<OldSavedPoster> {
    parse_records(doc, OldSavedPoster::from_value)
}

fn parse_records<T>(
    doc: &Mapping,
    parse: impl Fn(&str, &Value) -> Result<T, InvalidRecord>,
) -> Parsed<T> {
    let mut records = Vec::new();
    let mut invalid = Vec::new();
    for (key, value) in doc {
        let Some(key) = scalar(key) else {
            invalid.push(InvalidRecord::new("?", "record key is not text"));
            continue;
        };
        if key == ID_COUNT_KEY {
            continue;
        }
        match parse(&key, value) {
            Ok(record) => records.push(record),
            Err(e) => invalid.push(e),
        }
    }
    Parsed { records, invalid }
}

/// Serialize maps in the legacy layout, keyed by record key.
pub fn maps_document(maps: &[OldSavedMap]) -> Mapping {
    let mut doc = Mapping::new();
    doc.insert(Value::from(ID_COUNT_KEY), Value::from(maps.len() as u64));
    for map in maps {
        doc.insert(Value::String(map.key.clone()), map.to_value());
    }
    doc
}

/// Serialize posters in the legacy layout, keyed by record key.
pub fn posters_document(posters: &[OldSavedPoster]) -> Mapping {
    let mut doc = Mapping::new();
    doc.insert(Value::from(ID_COUNT_KEY), Value::from(posters.len() as u64));
    for poster in posters {
        doc.insert(Value::String(poster.key.clone()), poster.to_value());
    }
    doc
}

pub fn write_document(path: &Path, doc: &Mapping) -> std::io::Result<()> {
    let content = serde_yaml::to_string(doc)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, content)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_id(key: &str, value: &Value) -> Result<MapId, InvalidRecord> {
    let text = scalar(value).ok_or_else(|| InvalidRecord::new(key, "map ID is not a number"))?;
    text.trim()
        .parse::<MapId>()
        .map_err(|_| InvalidRecord::new(key, format!("invalid map ID '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_maps_skips_counter() {
        let parsed = parse_maps(&doc(
            "IdCount: 2\nsunset: ['12', sunset, Notch]\nlake: [13, Lake, 42]\n",
        ));
        assert!(parsed.invalid.is_empty());
        assert_eq!(
            parsed.records,
            vec![
                OldSavedMap {
                    key: "sunset".to_string(),
                    id: 12,
                    name: "sunset".to_string(),
                    user_name: "Notch".to_string(),
                },
                OldSavedMap {
                    key: "lake".to_string(),
                    id: 13,
                    name: "Lake".to_string(),
                    user_name: "42".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_unreadable_records_are_collected() {
        let parsed = parse_maps(&doc(
            "short: ['1', x]\nbad-id: [abc, x, Notch]\nnot-list: 5\nok: ['2', ok, Notch]\n",
        ));
        assert_eq!(parsed.records.len(), 1);
        let keys: Vec<_> = parsed.invalid.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["short", "bad-id", "not-list"]);
    }

    #[test]
    fn test_parse_poster() {
        let parsed = parse_posters(&doc("IdCount: 1\nwall: [Notch, '3', '4', 5]\n"));
        assert_eq!(
            parsed.records,
            vec![OldSavedPoster {
                key: "wall".to_string(),
                user_name: "Notch".to_string(),
                ids: vec![3, 4, 5],
            }]
        );
    }

    #[test]
    fn test_poster_without_ids_is_invalid() {
        let parsed = parse_posters(&doc("wall: [Notch]\n"));
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.invalid.len(), 1);
    }

    #[test]
    fn test_poster_contains_and_gaps() {
        let poster = OldSavedPoster {
            key: "wall".to_string(),
            user_name: "Notch".to_string(),
            ids: vec![10, 11, 13, 15],
        };
        let map = OldSavedMap {
            key: "x".to_string(),
            id: 13,
            name: "x".to_string(),
            user_name: "Notch".to_string(),
        };
        assert!(poster.contains(&map));
        assert_eq!(poster.id_gaps(), vec![12..=12, 14..=14]);
    }

    #[test]
    fn test_gaps_of_huge_span_are_one_range() {
        let poster = OldSavedPoster {
            key: "corrupt".to_string(),
            user_name: "Notch".to_string(),
            ids: vec![MapId::MAX, 0, 3, 3, 1],
        };
        assert_eq!(poster.id_gaps(), vec![2..=2, 4..=(MapId::MAX - 1)]);
    }

    #[test]
    fn test_rewrite_keeps_remaining_records() {
        let maps = vec![OldSavedMap {
            key: "k7".to_string(),
            id: 7,
            name: "left".to_string(),
            user_name: "Ghost".to_string(),
        }];
        let doc = maps_document(&maps);
        assert_eq!(doc.get(ID_COUNT_KEY), Some(&Value::from(1u64)));
        assert_eq!(parse_maps(&doc).records, maps);
    }

    #[test]
    fn test_rewrite_keeps_records_sharing_a_name() {
        let parsed = parse_maps(&doc(
            "k2: ['2', photo, Ghost]\nk3: ['3', photo, Phantom]\n",
        ));
        let doc = maps_document(&parsed.records);
        assert_eq!(doc.get(ID_COUNT_KEY), Some(&Value::from(2u64)));
        assert_eq!(parse_maps(&doc).records, parsed.records);
    }

    #[test]
    fn test_read_document_rejects_scalar_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.yml");
        std::fs::write(&path, "just text").unwrap();
        assert!(read_document(&path).is_err());

        std::fs::write(&path, "").unwrap();
        assert!(read_document(&path).unwrap().is_empty());
    }
}
