use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Logical grouping of files on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Folder {
    Images,
    Videos,
    #[default]
    Root,
    /// Every folder at once (listing only).
    All,
    /// A directory created through `create_directory`.
    Named(String),
}

impl Folder {
    pub fn as_str(&self) -> &str {
        match self {
            Folder::Images => "IMAGES",
            Folder::Videos => "VIDEOS",
            Folder::Root => "root",
            Folder::All => "all",
            Folder::Named(name) => name,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Folder {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "IMAGES" | "images" => Folder::Images,
            "VIDEOS" | "videos" => Folder::Videos,
            "" | "root" => Folder::Root,
            "all" => Folder::All,
            other => Folder::Named(other.to_string()),
        })
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(folder) => folder,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Folder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Folder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Folder::from(s.as_str()))
    }
}

/// Metadata snapshot of one backend file.
///
/// Parsing is lenient: a known field whose value cannot be interpreted is
/// left as `None` and its raw value kept in `extra`, so one odd entry never
/// fails a whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Map<String, Value>")]
pub struct FileInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<Folder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
    /// Backend fields this bridge does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn parse_size(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 text or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// Move the first interpretable value among `keys` out of `map`.
fn take_field<T>(
    map: &mut Map<String, Value>,
    keys: &[&str],
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let mut found = None;
    for key in keys {
        let Some(raw) = map.remove(*key) else {
            continue;
        };
        match (found.is_none(), parse(&raw)) {
            (true, Some(parsed)) => found = Some(parsed),
            _ => {
                map.insert((*key).to_string(), raw);
            }
        }
    }
    found
}

impl TryFrom<Map<String, Value>> for FileInfo {
    type Error = String;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let name = match map.remove("name") {
            Some(Value::String(name)) => name,
            Some(other) => return Err(format!("file name must be a string, got {}", other)),
            None => return Err("file entry without a name".to_string()),
        };

        Ok(FileInfo {
            name,
            folder: take_field(&mut map, &["folder"], |v| v.as_str().map(Folder::from)),
            mime_type: take_field(&mut map, &["mimeType", "mime_type"], |v| {
                v.as_str().map(str::to_string)
            }),
            size: take_field(&mut map, &["size"], parse_size),
            created: take_field(&mut map, &["created", "createdAt"], parse_timestamp),
            modified: take_field(&mut map, &["modified", "modifiedAt"], parse_timestamp),
            is_directory: take_field(&mut map, &["isDirectory"], Value::as_bool),
            extra: map,
        })
    }
}

/// Files of one logical folder, fetched fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderListing {
    pub folder: Folder,
    pub files: Vec<FileInfo>,
}

/// Listing payloads seen from the backend: a bare array or `{files: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawListing {
    Bare(Vec<FileInfo>),
    Wrapped {
        #[serde(default)]
        folder: Option<Folder>,
        files: Vec<FileInfo>,
    },
}

impl FolderListing {
    /// Normalise a backend listing payload.
    pub(crate) fn from_value(requested: Folder, value: Value) -> serde_json::Result<Self> {
        if value.is_null() {
            return Ok(FolderListing {
                folder: requested,
                files: Vec::new(),
            });
        }
        Ok(match serde_json::from_value(value)? {
            RawListing::Bare(files) => FolderListing {
                folder: requested,
                files,
            },
            RawListing::Wrapped { folder, files } => FolderListing {
                folder: folder.unwrap_or(requested),
                files,
            },
        })
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f.name == filename)
    }
}

/// A backend capability, as reported by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl From<rmcp::model::Tool> for ToolInfo {
    fn from(tool: rmcp::model::Tool) -> Self {
        ToolInfo {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: Some(Value::Object((*tool.input_schema).clone())),
        }
    }
}
