use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::activity::{
    ActivityEntry, ActivityFilter, ActivityKind, ActivityQuery, FeedCursor, NewActivity,
};
use crate::domain::call::CallResult;
use crate::domain::status::TicketStatus;
use crate::domain::ticket::Ticket;
use crate::domain::workgroup::Workgroup;
use crate::error::{AppError, AppResult};
use crate::services::{ActivitySubscription, TicketChange, TicketStore};

const TICKETS: &str = "tickets";
const STATUSES: &str = "ticketStatuses";
const WORKGROUPS: &str = "workgroups";
const ACTIVITY: &str = "activity";
const CALL_RESULTS: &str = "callResults";
const CREATED_AT: &str = "created_at";
const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Cloud Firestore over the v1 REST API.
#[derive(Clone)]
pub struct FirestoreStore {
    http: Client,
    endpoint: String,
    project: Option<String>,
    database: String,
    token: Option<String>,
    poll_interval: StdDuration,
}

impl FirestoreStore {
    pub fn new(
        project: Option<String>,
        database: Option<String>,
        token: Option<String>,
        poll_interval: StdDuration,
    ) -> Self {
        Self {
            http: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project,
            database: database.unwrap_or_else(|| "(default)".to_string()),
            token,
            poll_interval,
        }
    }

    /// Points the client at another API root, such as a local emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    fn api_details(&self) -> AppResult<(&str, &str)> {
        let project = self.project.as_deref().ok_or_else(|| {
            AppError::Configuration("Firestore project not configured".to_string())
        })?;
        let token = self.token.as_deref().ok_or_else(|| {
            AppError::Configuration("Firestore access token not configured".to_string())
        })?;
        Ok((project, token))
    }

    /// `projects/{p}/databases/{d}/documents`
    fn documents_root(&self) -> AppResult<String> {
        let (project, _) = self.api_details()?;
        Ok(format!(
            "projects/{project}/databases/{}/documents",
            self.database
        ))
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.endpoint)
    }

    fn document_name(&self, path: &str) -> AppResult<String> {
        Ok(format!("{}/{path}", self.documents_root()?))
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> AppResult<Response> {
        let (_, token) = self.api_details()?;
        let response = request
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| AppError::Store(format!("failed to call Firestore ({what}): {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response>".to_string());
        Err(match status {
            StatusCode::NOT_FOUND => AppError::NotFound(what.to_string()),
            StatusCode::CONFLICT => AppError::Conflict(format!("{what}: {body}")),
            _ => AppError::Store(format!("Firestore responded with {status} ({what}): {body}")),
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> AppResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| AppError::Store(format!("failed to parse Firestore {what}: {err}")))
    }

    async fn get_document<T: DeserializeOwned>(
        &self,
        path: &str,
        transaction: Option<&str>,
    ) -> AppResult<T> {
        let mut request = self.http.get(self.url(&self.document_name(path)?));
        if let Some(transaction) = transaction {
            request = request.query(&[("transaction", transaction)]);
        }
        let response = self.send(request, path).await?;
        let document: Value = Self::read_json(response, path).await?;
        decode_document(&document)
    }

    async fn list_documents<T: DeserializeOwned>(&self, collection: &str) -> AppResult<Vec<T>> {
        let url = self.url(&self.document_name(collection)?);
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(&url).query(&[("pageSize", "300")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = self.send(request, collection).await?;
            let page: Value = Self::read_json(response, collection).await?;
            if let Some(documents) = page.get("documents").and_then(Value::as_array) {
                for document in documents {
                    items.push(decode_document(document)?);
                }
            }
            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(items)
    }

    /// Subcollection writes require an existing parent ticket.
    async fn ensure_ticket(&self, ticket_id: &str) -> AppResult<()> {
        let request = self
            .http
            .get(self.url(&self.document_name(&format!("{TICKETS}/{ticket_id}"))?))
            .query(&[("mask.fieldPaths", "version")]);
        match self.send(request, "ticket").await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => Err(AppError::NotFound(format!("ticket '{ticket_id}'"))),
            Err(err) => Err(err),
        }
    }

    async fn begin_transaction(&self) -> AppResult<String> {
        let url = format!("{}:beginTransaction", self.url(&self.documents_root()?));
        let body = json!({ "options": { "readWrite": {} } });
        let response = self
            .send(self.http.post(url).json(&body), "beginTransaction")
            .await?;
        let payload: Value = Self::read_json(response, "transaction").await?;
        payload
            .get("transaction")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Store("Firestore returned no transaction id".to_string()))
    }

    async fn rollback(&self, transaction: &str) {
        let url = match self.documents_root() {
            Ok(root) => format!("{}:rollback", self.url(&root)),
            Err(_) => return,
        };
        let body = json!({ "transaction": transaction });
        if let Err(err) = self.send(self.http.post(url).json(&body), "rollback").await {
            warn!(error = %err, "failed to roll back Firestore transaction");
        }
    }

    async fn commit_writes(&self, writes: Vec<Value>, transaction: Option<&str>) -> AppResult<()> {
        let url = format!("{}:commit", self.url(&self.documents_root()?));
        let mut body = json!({ "writes": writes });
        if let Some(transaction) = transaction {
            body["transaction"] = Value::String(transaction.to_string());
        }
        self.send(self.http.post(url).json(&body), "commit").await?;
        Ok(())
    }

    async fn run_query(&self, parent: &str, structured_query: Value) -> AppResult<Vec<Value>> {
        let url = format!("{}:runQuery", self.url(&self.document_name(parent)?));
        let body = json!({ "structuredQuery": structured_query });
        let response = self.send(self.http.post(url).json(&body), "runQuery").await?;
        let rows: Vec<Value> = Self::read_json(response, "query results").await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| row.get_mut("document").map(Value::take))
            .collect())
    }

    fn activity_query(&self, ticket_id: &str, query: &ActivityQuery) -> AppResult<Value> {
        let mut structured = json!({
            "from": [{ "collectionId": ACTIVITY }],
            "orderBy": [
                { "field": { "fieldPath": CREATED_AT }, "direction": "DESCENDING" },
                { "field": { "fieldPath": "__name__" }, "direction": "DESCENDING" }
            ],
            "limit": query.limit,
        });
        if let Some(filter) = kind_filter(query.filter) {
            structured["where"] = filter;
        }
        if let Some(cursor) = &query.start_after {
            let entry_name = self.document_name(&format!(
                "{TICKETS}/{ticket_id}/{ACTIVITY}/{}",
                cursor.id
            ))?;
            structured["startAt"] = cursor_position(cursor, &entry_name);
        }
        Ok(structured)
    }

    async fn all_activity(&self, ticket_id: &str) -> AppResult<Vec<ActivityEntry>> {
        let mut structured = self.activity_query(
            ticket_id,
            &ActivityQuery {
                filter: ActivityFilter::All,
                start_after: None,
                limit: 0,
            },
        )?;
        if let Some(object) = structured.as_object_mut() {
            object.remove("limit");
        }
        let parent = format!("{TICKETS}/{ticket_id}");
        self.run_query(&parent, structured)
            .await?
            .iter()
            .map(decode_document)
            .collect()
    }

    fn write_document<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        must_not_exist: bool,
    ) -> AppResult<Value> {
        let mut write = json!({
            "update": {
                "name": self.document_name(path)?,
                "fields": encode_fields(value)?,
            }
        });
        if must_not_exist {
            write["currentDocument"] = json!({ "exists": false });
        }
        Ok(write)
    }

    fn activity_write(&self, ticket_id: &str, entry: &ActivityEntry) -> AppResult<Value> {
        let mut write = self.write_document(
            &format!("{TICKETS}/{ticket_id}/{ACTIVITY}/{}", entry.id),
            entry,
            true,
        )?;
        write["update"]["fields"][CREATED_AT] = timestamp_value(entry.created_at);
        Ok(write)
    }
}

#[async_trait]
impl TicketStore for FirestoreStore {
    async fn fetch_ticket(&self, ticket_id: &str) -> AppResult<Ticket> {
        self.get_document(&format!("{TICKETS}/{ticket_id}"), None)
            .await
    }

    async fn list_statuses(&self) -> AppResult<Vec<TicketStatus>> {
        self.list_documents(STATUSES).await
    }

    async fn fetch_status(&self, status_id: &str) -> AppResult<TicketStatus> {
        self.get_document(&format!("{STATUSES}/{status_id}"), None)
            .await
    }

    async fn list_workgroups(&self) -> AppResult<Vec<Workgroup>> {
        self.list_documents(WORKGROUPS).await
    }

    async fn fetch_workgroup(&self, group_id: &str) -> AppResult<Workgroup> {
        self.get_document(&format!("{WORKGROUPS}/{group_id}"), None)
            .await
    }

    async fn create_workgroup_if_absent(&self, group: &Workgroup) -> AppResult<bool> {
        let url = self.url(&self.document_name(WORKGROUPS)?);
        let body = json!({ "fields": encode_fields(group)? });
        let request = self
            .http
            .post(url)
            .query(&[("documentId", group.id.as_str())])
            .json(&body);
        match self.send(request, "create workgroup").await {
            Ok(_) => Ok(true),
            Err(AppError::Conflict(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn commit(&self, change: TicketChange) -> AppResult<(Ticket, ActivityEntry)> {
        let transaction = self.begin_transaction().await?;
        let ticket_path = format!("{TICKETS}/{}", change.ticket_id);

        let mut ticket: Ticket = match self.get_document(&ticket_path, Some(transaction.as_str())).await {
            Ok(ticket) => ticket,
            Err(err) => {
                self.rollback(&transaction).await;
                return Err(err);
            }
        };
        if ticket.version != change.expected_version {
            self.rollback(&transaction).await;
            return Err(AppError::Conflict(format!(
                "ticket '{}' changed since it was read (expected version {}, found {})",
                change.ticket_id, change.expected_version, ticket.version
            )));
        }

        let now = stamp();
        change.patch.apply(&mut ticket, now);
        let entry = change
            .activity
            .into_entry(Uuid::new_v4().to_string(), now);

        let mut writes = Vec::with_capacity(3);
        if let Some(group) = &change.ensure_group {
            writes.push(self.write_document(&format!("{WORKGROUPS}/{}", group.id), group, false)?);
        }
        writes.push(self.write_document(&ticket_path, &ticket, false)?);
        writes.push(self.activity_write(&change.ticket_id, &entry)?);

        match self.commit_writes(writes, Some(transaction.as_str())).await {
            Ok(()) => Ok((ticket, entry)),
            Err(AppError::Conflict(detail)) => Err(AppError::Conflict(format!(
                "ticket '{}' was modified concurrently: {detail}",
                change.ticket_id
            ))),
            Err(err) => Err(err),
        }
    }

    async fn append_activity(
        &self,
        ticket_id: &str,
        activity: NewActivity,
    ) -> AppResult<ActivityEntry> {
        self.ensure_ticket(ticket_id).await?;
        let entry = activity.into_entry(Uuid::new_v4().to_string(), stamp());
        self.commit_writes(vec![self.activity_write(ticket_id, &entry)?], None)
            .await?;
        Ok(entry)
    }

    async fn fetch_activity(&self, ticket_id: &str, entry_id: &str) -> AppResult<ActivityEntry> {
        self.get_document(&format!("{TICKETS}/{ticket_id}/{ACTIVITY}/{entry_id}"), None)
            .await
    }

    async fn query_activity(
        &self,
        ticket_id: &str,
        query: &ActivityQuery,
    ) -> AppResult<Vec<ActivityEntry>> {
        let structured = self.activity_query(ticket_id, query)?;
        self.run_query(&format!("{TICKETS}/{ticket_id}"), structured)
            .await?
            .iter()
            .map(decode_document)
            .collect()
    }

    async fn count_activity(&self, ticket_id: &str, kind: ActivityKind) -> AppResult<usize> {
        let url = format!(
            "{}:runAggregationQuery",
            self.url(&self.document_name(&format!("{TICKETS}/{ticket_id}"))?)
        );
        let body = json!({
            "structuredAggregationQuery": {
                "structuredQuery": {
                    "from": [{ "collectionId": ACTIVITY }],
                    "where": equals("kind", kind.as_str()),
                },
                "aggregations": [{ "alias": "total", "count": {} }],
            }
        });
        let response = self
            .send(self.http.post(url).json(&body), "count activity")
            .await?;
        let rows: Vec<Value> = Self::read_json(response, "aggregation").await?;
        aggregation_total(&rows)
    }

    async fn subscribe_activity(&self, ticket_id: &str) -> AppResult<ActivitySubscription> {
        let initial = self.all_activity(ticket_id).await?;
        let (sender, receiver) = watch::channel(initial.clone());
        let store = self.clone();
        let ticket_id = ticket_id.to_string();

        let feeder = tokio::spawn(async move {
            let mut last = initial;
            loop {
                tokio::time::sleep(store.poll_interval).await;
                if sender.is_closed() {
                    break;
                }
                match store.all_activity(&ticket_id).await {
                    Ok(entries) if entries != last => {
                        if sender.send(entries.clone()).is_err() {
                            break;
                        }
                        last = entries;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(ticket_id = %ticket_id, error = %err, "activity poll failed"),
                }
            }
            debug!(ticket_id = %ticket_id, "activity subscription closed");
        });

        Ok(ActivitySubscription::with_feeder(receiver, feeder))
    }

    async fn append_call_result(&self, ticket_id: &str, record: CallResult) -> AppResult<()> {
        self.ensure_ticket(ticket_id).await?;
        let mut write = self.write_document(
            &format!("{TICKETS}/{ticket_id}/{CALL_RESULTS}/{}", record.id),
            &record,
            true,
        )?;
        write["update"]["fields"][CREATED_AT] = timestamp_value(record.created_at);
        self.commit_writes(vec![write], None).await
    }

    async fn list_call_results(&self, ticket_id: &str) -> AppResult<Vec<CallResult>> {
        let structured = json!({
            "from": [{ "collectionId": CALL_RESULTS }],
            "orderBy": [{ "field": { "fieldPath": CREATED_AT }, "direction": "DESCENDING" }],
        });
        self.run_query(&format!("{TICKETS}/{ticket_id}"), structured)
            .await?
            .iter()
            .map(decode_document)
            .collect()
    }
}

/// Firestore keeps microseconds; stamping at that precision keeps cursors exact.
fn stamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn aggregation_total(rows: &[Value]) -> AppResult<usize> {
    rows.iter()
        .find_map(|row| row.pointer("/result/aggregateFields/total/integerValue"))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<usize>().ok())
        .ok_or_else(|| {
            AppError::Store(format!(
                "unexpected aggregation response: {}",
                Value::Array(rows.to_vec())
            ))
        })
}

fn equals(field: &str, value: &str) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "EQUAL",
            "value": { "stringValue": value },
        }
    })
}

fn kind_filter(filter: ActivityFilter) -> Option<Value> {
    match filter {
        ActivityFilter::All => None,
        ActivityFilter::SystemOnly => Some(equals("kind", ActivityKind::System.as_str())),
        ActivityFilter::NonSystem => Some(json!({
            "fieldFilter": {
                "field": { "fieldPath": "kind" },
                "op": "IN",
                "value": { "arrayValue": { "values": [
                    { "stringValue": ActivityKind::Log.as_str() },
                    { "stringValue": ActivityKind::Comment.as_str() },
                ] } },
            }
        })),
    }
}

/// Resumes strictly after `cursor` under the descending (created_at, name) ordering.
fn cursor_position(cursor: &FeedCursor, entry_name: &str) -> Value {
    json!({
        "values": [
            timestamp_value(cursor.created_at),
            { "referenceValue": entry_name },
        ],
        "before": false,
    })
}

fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({ "timestampValue": at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true) })
}

fn encode_fields<T: Serialize>(value: &T) -> AppResult<Value> {
    let plain = serde_json::to_value(value)
        .map_err(|err| AppError::Store(format!("failed to encode document: {err}")))?;
    match plain {
        Value::Object(map) => Ok(Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, to_firestore(value)))
                .collect(),
        )),
        _ => Err(AppError::Store(
            "documents must encode to an object".to_string(),
        )),
    }
}

fn decode_document<T: DeserializeOwned>(document: &Value) -> AppResult<T> {
    let fields = document
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let plain: Map<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key, from_firestore(value)))
        .collect();
    serde_json::from_value(Value::Object(plain))
        .map_err(|err| AppError::Store(format!("unexpected document shape: {err}")))
}

fn to_firestore(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) => match number.as_i64() {
            Some(int) => json!({ "integerValue": int.to_string() }),
            None => json!({ "doubleValue": number.as_f64().unwrap_or_default() }),
        },
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.into_iter().map(to_firestore).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({
            "mapValue": {
                "fields": map
                    .into_iter()
                    .map(|(key, value)| (key, to_firestore(value)))
                    .collect::<Map<_, _>>()
            }
        }),
    }
}

fn from_firestore(value: Value) -> Value {
    let Value::Object(mut typed) = value else {
        return Value::Null;
    };
    if let Some(text) = typed.remove("stringValue") {
        return text;
    }
    if let Some(flag) = typed.remove("booleanValue") {
        return flag;
    }
    if let Some(Value::String(raw)) = typed.remove("integerValue") {
        return raw.parse::<i64>().map(Value::from).unwrap_or(Value::Null);
    }
    if let Some(double) = typed.remove("doubleValue") {
        return double;
    }
    if let Some(timestamp) = typed.remove("timestampValue") {
        return timestamp;
    }
    if let Some(reference) = typed.remove("referenceValue") {
        return reference;
    }
    if let Some(mut array) = typed.remove("arrayValue") {
        let items = match array.get_mut("values").map(Value::take) {
            Some(Value::Array(items)) => items.into_iter().map(from_firestore).collect(),
            _ => Vec::new(),
        };
        return Value::Array(items);
    }
    if let Some(mut map) = typed.remove("mapValue") {
        let fields = match map.get_mut("fields").map(Value::take) {
            Some(Value::Object(fields)) => fields
                .into_iter()
                .map(|(key, value)| (key, from_firestore(value)))
                .collect(),
            _ => Map::new(),
        };
        return Value::Object(fields);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::domain::actor::Actor;
    use crate::domain::call::CallAttempt;
    use crate::domain::ticket::sample_ticket;
    use crate::error::ErrorKind;

    fn demo_store() -> FirestoreStore {
        FirestoreStore::new(
            Some("demo".to_string()),
            None,
            Some("token".to_string()),
            StdDuration::from_secs(5),
        )
    }

    /// Local endpoint that answers every request with 404 and reports each request line.
    async fn missing_documents_endpoint() -> (String, mpsc::UnboundedReceiver<String>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        let server = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let (read, mut write) = socket.into_split();
                let mut lines = BufReader::new(read).lines();
                let mut request_line = None;
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.is_empty() {
                        break;
                    }
                    request_line.get_or_insert(line);
                }
                if let Some(line) = request_line {
                    let _ = sender.send(line);
                }
                let _ = write
                    .write_all(
                        b"HTTP/1.1 404 Not Found\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
                    )
                    .await;
            }
        });
        (format!("http://{address}/v1"), receiver, server)
    }

    #[test]
    fn ticket_survives_field_encoding() {
        let mut ticket = sample_ticket("T1");
        ticket.version = 7;
        let document = json!({ "fields": encode_fields(&ticket).unwrap() });
        let decoded: Ticket = decode_document(&document).unwrap();
        assert_eq!(decoded, ticket);
    }

    #[test]
    fn encodes_integers_as_strings() {
        let encoded = to_firestore(json!({ "version": 3, "assignee": null }));
        assert_eq!(
            encoded,
            json!({ "mapValue": { "fields": {
                "version": { "integerValue": "3" },
                "assignee": { "nullValue": null },
            } } })
        );
    }

    #[test]
    fn activity_writes_use_timestamp_values() {
        let store = demo_store();
        let entry = NewActivity::system("hello").into_entry("E1".to_string(), Utc::now());
        let write = store.activity_write("T1", &entry).unwrap();
        assert!(write["update"]["fields"][CREATED_AT]["timestampValue"].is_string());
        assert_eq!(write["currentDocument"]["exists"], json!(false));
        assert_eq!(
            write["update"]["name"],
            json!("projects/demo/databases/(default)/documents/tickets/T1/activity/E1")
        );
    }

    #[test]
    fn aggregation_total_reads_the_count_row() {
        let rows = vec![json!({
            "result": { "aggregateFields": { "total": { "integerValue": "8" } } },
            "readTime": "2024-05-01T10:00:00Z",
        })];
        assert_eq!(aggregation_total(&rows).unwrap(), 8);
    }

    #[test]
    fn malformed_aggregation_is_a_store_error() {
        let rows = vec![json!({ "readTime": "2024-05-01T10:00:00Z" })];
        assert_eq!(aggregation_total(&rows).unwrap_err().kind(), ErrorKind::Store);

        let rows = vec![json!({
            "result": { "aggregateFields": { "total": { "integerValue": "many" } } },
        })];
        assert_eq!(aggregation_total(&rows).unwrap_err().kind(), ErrorKind::Store);
        assert!(aggregation_total(&[]).is_err());
    }

    #[tokio::test]
    async fn appends_to_missing_ticket_are_refused_before_writing() {
        let (endpoint, mut requests, server) = missing_documents_endpoint().await;
        let store = demo_store().with_endpoint(endpoint);

        let err = store
            .append_activity("T404", NewActivity::system("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let record = CallAttempt::new("+905551234567", true, None)
            .unwrap()
            .into_record("C1".to_string(), &Actor::new("u-carol", "Carol"), stamp());
        let err = store.append_call_result("T404", record).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        server.abort();
        let mut seen = Vec::new();
        while let Ok(line) = requests.try_recv() {
            seen.push(line);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen
            .iter()
            .all(|line| line.starts_with("GET /v1/projects/demo/databases/(default)/documents/tickets/T404")));
    }

    #[test]
    fn missing_project_is_a_configuration_error() {
        let store = FirestoreStore::new(None, None, None, StdDuration::from_secs(5));
        assert!(matches!(
            store.documents_root(),
            Err(AppError::Configuration(_))
        ));
    }
}
