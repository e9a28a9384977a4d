//! Store callbacks consumed by the state machine.
//!
//! The engine never talks to a storage backend directly; the hook runtime
//! hands it these three callbacks. `fetch_by_id` bypasses the engine
//! entirely (no recursive authorization), `run_query` executes a query the
//! engine has already restricted, and `mutate` performs the write. These
//! calls are the only suspension points in a request.

use async_trait::async_trait;
use serde_json::Value;

use palisade_core::StoreError;

use crate::context::OperationKind;

/// The record-oriented data service behind the engine.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches one record by identifier, bypassing authorization. The
    /// query carries backend concerns (such as `$select`) only; the engine
    /// strips `$select` itself when it needs the whole record.
    async fn fetch_by_id(
        &self,
        resource_type: &str,
        id: &str,
        query: &Value,
    ) -> Result<Option<Value>, StoreError>;

    /// Executes a restricted query and returns the matching records.
    async fn run_query(&self, resource_type: &str, query: &Value)
    -> Result<Vec<Value>, StoreError>;

    /// Performs a mutation and returns the affected records.
    ///
    /// `Create` receives the payload (an array for a batch); `Update` and
    /// `Patch` receive the payload plus either an identifier or a
    /// restricted query; `Remove` has no payload.
    async fn mutate(
        &self,
        kind: OperationKind,
        resource_type: &str,
        id: Option<&str>,
        query: &Value,
        payload: Option<&Value>,
    ) -> Result<Vec<Value>, StoreError>;
}
