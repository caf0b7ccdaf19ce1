//! Index definitions and the default schema used for every brand/language index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::document::KEY_FIELD;

pub const SEMANTIC_CONFIG: &str = "semantic-config";
pub const SUGGESTER_NAME: &str = "TitleContentSG";
pub const VECTOR_PROFILE: &str = "HnswProfile";
pub const VECTOR_FIELDS: &str = "TitleVector,ContentVector";

/// A field in an index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facetable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrievable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(
        rename = "vectorSearchProfile",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vector_search_profile: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDefinition {
    pub(crate) fn simple(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            key: None,
            searchable: None,
            filterable: None,
            sortable: None,
            facetable: None,
            retrievable: Some(true),
            dimensions: None,
            vector_search_profile: None,
            extra: Map::new(),
        }
    }

    fn searchable_string(name: &str) -> Self {
        Self {
            searchable: Some(true),
            ..Self::simple(name, "Edm.String")
        }
    }

    fn vector(name: &str, dimensions: u32) -> Self {
        Self {
            searchable: Some(true),
            dimensions: Some(dimensions),
            vector_search_profile: Some(VECTOR_PROFILE.to_string()),
            ..Self::simple(name, "Collection(Edm.Single)")
        }
    }

    pub fn is_key(&self) -> bool {
        self.key.unwrap_or(false)
    }

    /// Fields default to retrievable when the flag is absent.
    pub fn is_retrievable(&self) -> bool {
        self.retrievable.unwrap_or(true)
    }
}

/// A complete index definition. Settings this crate does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexDefinition {
    pub fn key_field(&self) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.is_key())
    }

    pub fn non_retrievable_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.is_retrievable())
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Same definition under a new name, stripped of service metadata.
    pub fn renamed(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.name = name.to_string();
        copy.extra.retain(|k, _| !k.starts_with("@odata"));
        copy
    }
}

/// Schema shared by every brand/language index.
pub fn default_schema(name: &str, dimensions: u32) -> IndexDefinition {
    let key = FieldDefinition {
        key: Some(true),
        filterable: Some(true),
        sortable: Some(true),
        ..FieldDefinition::simple(KEY_FIELD, "Edm.String")
    };

    let fields = vec![
        key,
        FieldDefinition::searchable_string("Title"),
        FieldDefinition::searchable_string("Content"),
        FieldDefinition {
            filterable: Some(true),
            ..FieldDefinition::searchable_string("Source")
        },
        FieldDefinition {
            filterable: Some(true),
            ..FieldDefinition::simple("YoutubeLinks", "Collection(Edm.String)")
        },
        FieldDefinition {
            searchable: Some(true),
            filterable: Some(true),
            facetable: Some(true),
            ..FieldDefinition::simple("Labels", "Collection(Edm.String)")
        },
        FieldDefinition::vector("TitleVector", dimensions),
        FieldDefinition::vector("ContentVector", dimensions),
    ];

    let extra = json!({
        "vectorSearch": {
            "algorithms": [
                {
                    "name": "Hnsw",
                    "kind": "hnsw",
                    "hnswParameters": {
                        "m": 4,
                        "efConstruction": 400,
                        "efSearch": 500,
                        "metric": "cosine"
                    }
                },
                {
                    "name": "ExhaustiveKnn",
                    "kind": "exhaustiveKnn",
                    "exhaustiveKnnParameters": { "metric": "cosine" }
                }
            ],
            "profiles": [
                { "name": VECTOR_PROFILE, "algorithm": "Hnsw" },
                { "name": "ExhaustiveKnnProfile", "algorithm": "ExhaustiveKnn" }
            ]
        },
        "semantic": {
            "configurations": [
                {
                    "name": SEMANTIC_CONFIG,
                    "prioritizedFields": {
                        "titleField": { "fieldName": "Title" },
                        "prioritizedContentFields": [ { "fieldName": "Content" } ]
                    }
                }
            ]
        },
        "suggesters": [
            {
                "name": SUGGESTER_NAME,
                "searchMode": "analyzingInfixMatching",
                "sourceFields": ["Title", "Content"]
            }
        ]
    });

    let extra = match extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    IndexDefinition {
        name: name.to_string(),
        fields,
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_key_and_vectors() {
        let schema = default_schema("clo3d-index-english", 1536);
        let key = schema.key_field().unwrap();
        assert_eq!(key.name, "ArticleId");
        assert_eq!(key.sortable, Some(true));

        let vector = schema.fields.iter().find(|f| f.name == "ContentVector").unwrap();
        assert_eq!(vector.dimensions, Some(1536));
        assert_eq!(vector.vector_search_profile.as_deref(), Some(VECTOR_PROFILE));
    }

    #[test]
    fn test_default_schema_serialized_settings() {
        let value = serde_json::to_value(default_schema("idx", 1536)).unwrap();
        assert_eq!(value["name"], "idx");
        assert_eq!(value["vectorSearch"]["algorithms"][0]["hnswParameters"]["m"], 4);
        assert_eq!(value["semantic"]["configurations"][0]["name"], SEMANTIC_CONFIG);
        assert_eq!(value["suggesters"][0]["name"], SUGGESTER_NAME);
        assert_eq!(value["fields"][4]["type"], "Collection(Edm.String)");
    }

    #[test]
    fn test_definition_round_trips_unknown_settings() {
        let raw = serde_json::json!({
            "@odata.etag": "\"0x1\"",
            "name": "src",
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true, "retrievable": true, "analyzer": null},
                {"name": "secret", "type": "Edm.String", "retrievable": false}
            ],
            "scoringProfiles": []
        });
        let def: IndexDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.key_field().unwrap().name, "id");
        assert_eq!(def.non_retrievable_fields(), vec!["secret"]);

        let renamed = def.renamed("dst");
        assert_eq!(renamed.name, "dst");
        assert!(!renamed.extra.contains_key("@odata.etag"));
        assert!(renamed.extra.contains_key("scoringProfiles"));
    }
}
