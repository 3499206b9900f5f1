//! Cloud Firestore documents over the v1 REST API

use crate::firebase::transport::{Authorization, RestClient, RestResponse};
use crate::profile::config::FirebaseConfig;
use crate::profile::error::PersistError;
use crate::profile::profile_store::DocumentStore;
use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;

pub struct FirestoreDocuments {
    rest: RestClient,
    documents_root: String,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    #[serde(default)]
    string_value: Option<String>,
}

impl FirestoreDocuments {
    pub fn new(rest: RestClient, config: &FirebaseConfig) -> Self {
        Self {
            rest,
            documents_root: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_endpoint.trim_end_matches('/'),
                config.project_id
            ),
        }
    }

    fn document_uri(&self, collection: &str, document_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_root,
            urlencoding::encode(collection),
            urlencoding::encode(document_id)
        )
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocuments {
    async fn update_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        value: &str,
        auth_token: &str,
    ) -> Result<(), PersistError> {
        // PATCH with an update mask touches only `field` and creates the
        // document when it does not exist yet.
        let uri = masked_uri(
            &self.document_uri(collection, document_id),
            "updateMask",
            field,
        );
        let body = string_field_body(field, value);

        let response = self
            .rest
            .send_json(
                Method::PATCH,
                &uri,
                Some(&Authorization::Bearer(auth_token)),
                &body,
            )
            .await?;
        fail_unless_success(response)?;

        debug!("Updated {}/{}.{}", collection, document_id, field);
        Ok(())
    }

    async fn get_field(
        &self,
        collection: &str,
        document_id: &str,
        field: &str,
        auth_token: &str,
    ) -> Result<Option<String>, PersistError> {
        let uri = masked_uri(&self.document_uri(collection, document_id), "mask", field);
        let response = self
            .rest
            .send(
                Method::GET,
                &uri,
                Some(&Authorization::Bearer(auth_token)),
                None,
                Vec::new(),
            )
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = fail_unless_success(response)?;

        let document: Document = response.json()?;
        Ok(string_field(document, field))
    }
}

fn masked_uri(document_uri: &str, mask: &str, field: &str) -> String {
    format!(
        "{}?{}.fieldPaths={}",
        document_uri,
        mask,
        urlencoding::encode(field)
    )
}

fn string_field_body(field: &str, value: &str) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    fields.insert(field.to_string(), json!({ "stringValue": value }));
    json!({ "fields": fields })
}

fn string_field(mut document: Document, field: &str) -> Option<String> {
    document
        .fields
        .remove(field)
        .and_then(|value| value.string_value)
}

fn fail_unless_success(response: RestResponse) -> Result<RestResponse, PersistError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(PersistError::Transport(response.error_message()))
    }
}
