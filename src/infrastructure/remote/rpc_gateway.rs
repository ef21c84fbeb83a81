use super::wire::{WsGetEntryResponse, ws_fields};
use crate::application::ports::entry_gateway::{
    AddEntryResponse, EditEntryResponse, EntryGateway, GatewayError,
};
use crate::application::ports::rpc::RpcClient;
use crate::domain::entities::{DatabaseInfo, Entry, EntryFieldData};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct DatabasesResponse {
    #[serde(default)]
    databases: Vec<DatabaseInfo>,
}

/// RPC クライアント経由のエントリー操作
pub struct RpcEntryGateway {
    client: Arc<dyn RpcClient>,
}

impl RpcEntryGateway {
    pub fn new(client: Arc<dyn RpcClient>) -> Self {
        Self { client }
    }

    async fn write(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        debug!(method, "Calling remote write");
        Ok(self.client.write(method, params).await?)
    }

    async fn read(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        debug!(method, "Calling remote read");
        Ok(self.client.read(method, params).await?)
    }
}

/// 応答を解釈できないのはサーバーが応答した上での異常なので Service 扱い
fn parse_response<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| GatewayError::Service {
        message: format!("Invalid response from {method}: {e}"),
        error_code: Some("invalidresponse".to_string()),
    })
}

#[async_trait]
impl EntryGateway for RpcEntryGateway {
    async fn add_entry(
        &self,
        database_id: i64,
        fields: &[EntryFieldData],
        group_id: Option<i64>,
    ) -> Result<AddEntryResponse, GatewayError> {
        let mut params = json!({
            "databaseid": database_id,
            "data": ws_fields(fields),
        });
        if let Some(group_id) = group_id {
            params["groupid"] = json!(group_id);
        }

        let response = self.write("mod_data_add_entry", params).await?;
        parse_response("mod_data_add_entry", response)
    }

    async fn edit_entry(
        &self,
        entry_id: i64,
        fields: &[EntryFieldData],
    ) -> Result<EditEntryResponse, GatewayError> {
        let params = json!({
            "entryid": entry_id,
            "data": ws_fields(fields),
        });

        let response = self.write("mod_data_update_entry", params).await?;
        parse_response("mod_data_update_entry", response)
    }

    async fn delete_entry(&self, entry_id: i64) -> Result<(), GatewayError> {
        self.write("mod_data_delete_entry", json!({ "entryid": entry_id }))
            .await?;
        Ok(())
    }

    async fn approve_entry(&self, entry_id: i64, approve: bool) -> Result<(), GatewayError> {
        self.write(
            "mod_data_approve_entry",
            json!({ "entryid": entry_id, "approve": approve }),
        )
        .await?;
        Ok(())
    }

    async fn fetch_entry(&self, database_id: i64, entry_id: i64) -> Result<Entry, GatewayError> {
        let response = self
            .read(
                "mod_data_get_entry",
                json!({ "entryid": entry_id, "returncontents": true }),
            )
            .await?;
        let response: WsGetEntryResponse = parse_response("mod_data_get_entry", response)?;

        let mut entry = Entry::from(response.entry);
        if entry.database_id == 0 {
            entry.database_id = database_id;
        }
        Ok(entry)
    }

    async fn fetch_database(
        &self,
        course_id: i64,
        database_id: i64,
    ) -> Result<DatabaseInfo, GatewayError> {
        let response = self
            .read(
                "mod_data_get_databases_by_courses",
                json!({ "courseids": [course_id] }),
            )
            .await?;
        let response: DatabasesResponse =
            parse_response("mod_data_get_databases_by_courses", response)?;

        response
            .databases
            .into_iter()
            .find(|database| database.id == database_id)
            .ok_or_else(|| GatewayError::Service {
                message: format!("Database {database_id} not found"),
                error_code: Some("invaliddata".to_string()),
            })
    }
}
