//! Notion workspace connector.
//!
//! Implements [`Workspace`] over the Notion REST API (`2022-06-28`).
//! Responses are decoded by the `parse_*` functions, which are kept free
//! of I/O so they can be tested against fixture JSON.
//!
//! # Configuration
//!
//! ```toml
//! [workspace]
//! token_env = "NOTION_KEY"
//! page_size = 100
//! max_retries = 3
//! ```
//!
//! # Retry Strategy
//!
//! Reads (`GET` and database queries) are retried with exponential backoff
//! on HTTP 429, 5xx and network errors: 1s, 2s, 4s, ... capped at 32s.
//! Writes are sent exactly once; a blind retry of a page creation could
//! leave two entries with the same title.
//!
//! # Limits
//!
//! A single request may carry at most 100 child blocks. Longer bodies are
//! created with the first 100 and the remainder appended in batches.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::blocks::{to_wire_list, Block};
use crate::config::Config;
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::{
    normalize_id, ContextDocument, DocumentNode, Filter, NodeKind, Paged, PropertyValue, Record,
    TextRun,
};
use crate::traits::Workspace;

/// Maximum number of blocks per create/append request.
const MAX_BLOCKS_PER_REQUEST: usize = 100;

pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    token: String,
    page_size: u32,
    max_retries: u32,
    last_extracted_property: String,
}

impl NotionClient {
    /// Create a client; the integration token is read from `workspace.token_env`.
    pub fn new(config: &Config) -> Result<Self> {
        let ws = &config.workspace;
        let token = std::env::var(&ws.token_env)
            .with_context(|| format!("{} environment variable not set", ws.token_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ws.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: ws.base_url.trim_end_matches('/').to_string(),
            api_version: ws.api_version.clone(),
            token,
            page_size: ws.page_size,
            max_retries: ws.max_retries,
            last_extracted_property: config.properties.last_extracted.clone(),
        })
    }

    /// Idempotent request, retried on transient failures.
    async fn read(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> WorkspaceResult<Value> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.send(method.clone(), path, query, body).await {
                Ok(json) => return Ok(json),
                Err(e) if e.is_retryable() => {
                    warn!(path, attempt, "retryable workspace error: {}", e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| WorkspaceError::Transport("retries exhausted".into())))
    }

    async fn write(&self, method: Method, path: &str, body: &Value) -> WorkspaceResult<Value> {
        self.send(method, path, &[], Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> WorkspaceResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "workspace request");

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version)
            .query(query);
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| WorkspaceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WorkspaceError::from_status(
                status.as_u16(),
                body.chars().take(500).collect(),
            ));
        }

        resp.json()
            .await
            .map_err(|e| WorkspaceError::Decode(e.to_string()))
    }

    async fn append_batches(&self, id: &str, blocks: &[Block]) -> WorkspaceResult<()> {
        let path = format!("/blocks/{}/children", normalize_id(id));
        for batch in blocks.chunks(MAX_BLOCKS_PER_REQUEST) {
            let body = json!({ "children": to_wire_list(batch) });
            self.write(Method::PATCH, &path, &body).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Workspace for NotionClient {
    async fn get_node(&self, id: &str) -> WorkspaceResult<DocumentNode> {
        let json = self
            .read(Method::GET, &format!("/blocks/{}", normalize_id(id)), &[], None)
            .await?;
        parse_block(&json)
    }

    async fn get_children(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<DocumentNode>> {
        let mut query = vec![("page_size", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("start_cursor", cursor.to_string()));
        }
        let json = self
            .read(
                Method::GET,
                &format!("/blocks/{}/children", normalize_id(id)),
                &query,
                None,
            )
            .await?;
        parse_paged(&json, parse_block)
    }

    async fn get_context(&self, id: &str) -> WorkspaceResult<ContextDocument> {
        let json = self
            .read(Method::GET, &format!("/pages/{}", normalize_id(id)), &[], None)
            .await?;
        parse_context(&json, &self.last_extracted_property)
    }

    async fn query(
        &self,
        collection_id: &str,
        filter: &Filter,
        cursor: Option<&str>,
    ) -> WorkspaceResult<Paged<Record>> {
        let mut body = json!({
            "filter": filter_wire(filter),
            "page_size": self.page_size,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        let json = self
            .read(
                Method::POST,
                &format!("/databases/{}/query", normalize_id(collection_id)),
                &[],
                Some(&body),
            )
            .await?;
        parse_paged(&json, parse_record)
    }

    async fn create_record(
        &self,
        collection_id: &str,
        fields: &[(String, PropertyValue)],
        content: &[Block],
    ) -> WorkspaceResult<Record> {
        let split = content.len().min(MAX_BLOCKS_PER_REQUEST);
        let (first, rest) = content.split_at(split);
        let body = json!({
            "parent": { "database_id": normalize_id(collection_id) },
            "properties": properties_wire(fields),
            "children": to_wire_list(first),
        });
        let json = self.write(Method::POST, "/pages", &body).await?;
        let record = parse_record(&json)?;
        if !rest.is_empty() {
            self.append_batches(&record.id, rest).await?;
        }
        Ok(record)
    }

    async fn update_record(
        &self,
        id: &str,
        fields: &[(String, PropertyValue)],
    ) -> WorkspaceResult<Record> {
        let body = json!({ "properties": properties_wire(fields) });
        let json = self
            .write(Method::PATCH, &format!("/pages/{}", normalize_id(id)), &body)
            .await?;
        parse_record(&json)
    }

    async fn append_content(&self, id: &str, content: &[Block]) -> WorkspaceResult<()> {
        self.append_batches(id, content).await
    }
}

// ============ Wire decoding ============

fn str_field<'a>(json: &'a Value, key: &str) -> WorkspaceResult<&'a str> {
    json.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| WorkspaceError::Decode(format!("missing string field '{}'", key)))
}

fn parse_timestamp(raw: &str) -> WorkspaceResult<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Date properties without a time component.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| WorkspaceError::Decode(format!("invalid timestamp '{}'", raw)))
}

fn parse_rich_text(value: Option<&Value>) -> Vec<TextRun> {
    value
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .map(|run| TextRun {
                    plain_text: run
                        .get("plain_text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    bold: run["annotations"]["bold"].as_bool().unwrap_or(false),
                    italic: run["annotations"]["italic"].as_bool().unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a block object.
pub fn parse_block(json: &Value) -> WorkspaceResult<DocumentNode> {
    let block_type = str_field(json, "type")?;
    let kind = NodeKind::from_block_type(block_type);
    let rich_text = match kind {
        NodeKind::ListItem => parse_rich_text(json[block_type].get("rich_text")),
        _ => Vec::new(),
    };
    Ok(DocumentNode {
        id: normalize_id(str_field(json, "id")?),
        kind,
        has_children: json["has_children"].as_bool().unwrap_or(false),
        owning_document_id: None,
        last_edited_at: parse_timestamp(str_field(json, "last_edited_time")?)?,
        rich_text,
    })
}

/// Decode a list response (`results`, `has_more`, `next_cursor`).
pub fn parse_paged<T>(
    json: &Value,
    parse: impl Fn(&Value) -> WorkspaceResult<T>,
) -> WorkspaceResult<Paged<T>> {
    let results = json
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| WorkspaceError::Decode("missing results array".into()))?
        .iter()
        .map(parse)
        .collect::<WorkspaceResult<Vec<T>>>()?;
    let has_more = json["has_more"].as_bool().unwrap_or(false);
    let next_cursor = if has_more {
        json["next_cursor"].as_str().map(str::to_string)
    } else {
        None
    };
    Ok(Paged {
        results,
        next_cursor,
    })
}

/// Decode a page object into its sync marker state.
///
/// The marker is a date property that is `null` until first set.
pub fn parse_context(json: &Value, property: &str) -> WorkspaceResult<ContextDocument> {
    let id = normalize_id(str_field(json, "id")?);
    let last_edited_at = parse_timestamp(str_field(json, "last_edited_time")?)?;
    let prop = json["properties"]
        .get(property)
        .ok_or_else(|| WorkspaceError::MissingProperty {
            id: id.clone(),
            property: property.to_string(),
        })?;
    let last_extracted_at = match prop["date"]["start"].as_str() {
        Some(start) if !start.is_empty() => Some(parse_timestamp(start)?),
        _ => None,
    };
    Ok(ContextDocument {
        id,
        last_edited_at,
        last_extracted_at,
    })
}

/// Decode a database row; the title is read from whichever property has type `title`.
pub fn parse_record(json: &Value) -> WorkspaceResult<Record> {
    let title = json["properties"].as_object().and_then(|props| {
        props
            .values()
            .find(|p| p["type"] == "title")
            .map(|p| {
                parse_rich_text(p.get("title"))
                    .into_iter()
                    .map(|run| run.plain_text)
                    .collect::<String>()
            })
    });
    Ok(Record {
        id: normalize_id(str_field(json, "id")?),
        object: str_field(json, "object")?.to_string(),
        title,
        last_edited_at: json["last_edited_time"]
            .as_str()
            .and_then(|raw| parse_timestamp(raw).ok()),
    })
}

// ============ Wire encoding ============

pub fn filter_wire(filter: &Filter) -> Value {
    match filter {
        Filter::TitleEquals { property, value } => json!({
            "property": property,
            "title": { "equals": value },
        }),
        Filter::MultiSelectContains { property, value } => json!({
            "property": property,
            "multi_select": { "contains": value },
        }),
    }
}

/// Minute-resolution marker format stored in date properties.
pub fn format_marker(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:00.000+00:00").to_string()
}

pub fn properties_wire(fields: &[(String, PropertyValue)]) -> Value {
    let mut props = serde_json::Map::new();
    for (name, value) in fields {
        let wire = match value {
            PropertyValue::Title(text) => json!({
                "title": [{ "text": { "content": text } }],
            }),
            PropertyValue::Date(at) => json!({
                "date": { "start": format_marker(*at), "end": null, "time_zone": null },
            }),
            PropertyValue::NoDate => json!({ "date": null }),
        };
        props.insert(name.clone(), wire);
    }
    Value::Object(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn list_item_fixture() -> Value {
        json!({
            "object": "block",
            "id": "0ec528b8-540a-44e9-b01d-4e596000fc84",
            "type": "bulleted_list_item",
            "has_children": false,
            "last_edited_time": "2024-03-09T10:05:00.000Z",
            "bulleted_list_item": {
                "rich_text": [
                    { "plain_text": "I was ", "annotations": { "bold": false, "italic": false } },
                    { "plain_text": "Enamor", "annotations": { "bold": true, "italic": true } }
                ]
            }
        })
    }

    #[test]
    fn test_parse_list_item_block() {
        let node = parse_block(&list_item_fixture()).unwrap();
        assert_eq!(node.id, "0ec528b8540a44e9b01d4e596000fc84");
        assert_eq!(node.kind, NodeKind::ListItem);
        assert_eq!(node.rich_text.len(), 2);
        assert!(node.rich_text[1].bold && node.rich_text[1].italic);
        assert_eq!(
            node.last_edited_at,
            Utc.with_ymd_and_hms(2024, 3, 9, 10, 5, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_child_page_block() {
        let json = json!({
            "object": "block",
            "id": "7650f744-6586-4a78-8ed4-dc7ba92131c6",
            "type": "child_page",
            "has_children": true,
            "last_edited_time": "2024-03-09T10:05:00.000Z",
            "child_page": { "title": "Chapter 1" }
        });
        let node = parse_block(&json).unwrap();
        assert_eq!(node.kind, NodeKind::Document);
        assert!(node.has_children);
        assert!(node.rich_text.is_empty());
    }

    #[test]
    fn test_parse_paged_cursor() {
        let json = json!({
            "object": "list",
            "results": [list_item_fixture()],
            "has_more": true,
            "next_cursor": "abc"
        });
        let page = parse_paged(&json, parse_block).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));

        let last = json!({ "results": [], "has_more": false, "next_cursor": null });
        assert!(parse_paged(&last, parse_block).unwrap().next_cursor.is_none());
    }

    #[test]
    fn test_parse_context_marker() {
        let json = json!({
            "object": "page",
            "id": "aaa18f4d-fc56-495e-835e-0289cbe25f3b",
            "last_edited_time": "2024-03-09T10:07:00.000Z",
            "properties": {
                "Last extracted time": {
                    "type": "date",
                    "date": { "start": "2024-03-09T10:05:00.000+00:00", "end": null, "time_zone": null }
                }
            }
        });
        let doc = parse_context(&json, "Last extracted time").unwrap();
        assert_eq!(doc.id, "aaa18f4dfc56495e835e0289cbe25f3b");
        assert_eq!(
            doc.last_extracted_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 10, 5, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_context_unset_and_missing_marker() {
        let unset = json!({
            "object": "page",
            "id": "p",
            "last_edited_time": "2024-03-09T10:07:00.000Z",
            "properties": { "Last extracted time": { "type": "date", "date": null } }
        });
        assert!(parse_context(&unset, "Last extracted time")
            .unwrap()
            .last_extracted_at
            .is_none());

        let missing = json!({
            "object": "page",
            "id": "p",
            "last_edited_time": "2024-03-09T10:07:00.000Z",
            "properties": {}
        });
        assert!(matches!(
            parse_context(&missing, "Last extracted time"),
            Err(WorkspaceError::MissingProperty { .. })
        ));
    }

    #[test]
    fn test_parse_record_title() {
        let json = json!({
            "object": "page",
            "id": "a9d64a44-ea88-4408-8612-055786f85954",
            "properties": {
                "Name": { "type": "title", "title": [
                    { "plain_text": "break ", "annotations": {} },
                    { "plain_text": "a leg", "annotations": {} }
                ] }
            }
        });
        let record = parse_record(&json).unwrap();
        assert_eq!(record.title.as_deref(), Some("break a leg"));
        assert_eq!(record.object, "page");
    }

    #[test]
    fn test_date_only_timestamp() {
        assert_eq!(
            parse_timestamp("2024-03-09").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_filter_wire() {
        let wire = filter_wire(&Filter::TitleEquals {
            property: "Name".into(),
            value: "Enamor".into(),
        });
        assert_eq!(wire, json!({ "property": "Name", "title": { "equals": "Enamor" } }));

        let wire = filter_wire(&Filter::MultiSelectContains {
            property: "type".into(),
            value: "Contexts".into(),
        });
        assert_eq!(wire["multi_select"]["contains"], "Contexts");
    }

    #[test]
    fn test_properties_wire_marker_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 10, 5, 42).unwrap();
        let wire = properties_wire(&[
            ("Last extracted time".into(), PropertyValue::Date(at)),
            ("Name".into(), PropertyValue::Title("Enamor".into())),
        ]);
        assert_eq!(
            wire["Last extracted time"]["date"]["start"],
            "2024-03-09T10:05:00.000+00:00"
        );
        assert_eq!(wire["Name"]["title"][0]["text"]["content"], "Enamor");

        let cleared = properties_wire(&[("Last extracted time".into(), PropertyValue::NoDate)]);
        assert!(cleared["Last extracted time"]["date"].is_null());
    }
}
