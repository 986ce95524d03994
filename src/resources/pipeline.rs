//! `monad_pipeline`: a graph of connectors and transforms.
//!
//! Nodes reference components by id and are addressed by slug; edges join two
//! node slugs and may carry routing conditions. Every node and edge is sent
//! enabled.

use super::{
    put_attr, required_str, resource_type_name, response_id, string_attr, with_attrs, Resource,
};
use crate::client::{ApiClient, Component};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::value::Value;
use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use tracing::debug;

/// Pipelines keep their graph in state; reads only refresh the name and
/// description.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineResource;

fn node_block() -> Block {
    Block::new()
        .with_attribute(
            "component_type",
            Attribute::required_string().with_description("Type of the component"),
        )
        .with_attribute(
            "component_id",
            Attribute::required_string().with_description("ID of the component"),
        )
        .with_attribute(
            "slug",
            Attribute::optional_string().with_description("Slug of the node instance"),
        )
}

fn edge_block() -> Block {
    let condition = Block::new()
        .with_attribute(
            "type_id",
            Attribute::optional_string().with_description("Type ID for the condition"),
        )
        .with_attribute(
            "config",
            Attribute::new(
                AttributeType::map(AttributeType::Dynamic),
                AttributeFlags::optional(),
            )
            .with_description("Configuration for the condition"),
        );
    let conditions = Block::new()
        .with_description("Conditions for the edge")
        .with_attribute(
            "operator",
            Attribute::required_string().with_description("Operator for the condition"),
        )
        .with_block(
            "conditions",
            NestedBlock::list(condition.with_description("Nested conditions for the edge")),
        );

    Block::new()
        .with_attribute(
            "name",
            Attribute::optional_string().with_description("Name of the edge"),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_description("Description of the edge"),
        )
        .with_attribute(
            "from_node_instance_slug",
            Attribute::required_string().with_description("Slug of the source node instance"),
        )
        .with_attribute(
            "to_node_instance_slug",
            Attribute::required_string().with_description("Slug of the target node instance"),
        )
        .with_block("conditions", NestedBlock::single(conditions))
}

fn items<'a>(value: &'a Value, name: &str) -> &'a [Value] {
    value.get(name).and_then(Value::elements).unwrap_or_default()
}

/// Re-root conversion errors under the element being encoded.
fn within(prefix: String) -> impl FnOnce(ProviderError) -> ProviderError {
    move |err| match err {
        ProviderError::Conversion(err) => ProviderError::Conversion(err.within(&prefix)),
        other => other,
    }
}

fn node_json(node: &Value) -> Result<Json, ProviderError> {
    let mut body = Map::new();
    body.insert(
        "component_type".to_string(),
        Json::from(required_str(node, "component_type")?),
    );
    body.insert(
        "component_id".to_string(),
        Json::from(required_str(node, "component_id")?),
    );
    put_attr(&mut body, node, "slug")?;
    body.insert("enabled".to_string(), Json::Bool(true));
    Ok(Json::Object(body))
}

fn conditions_json(conditions: &Value, path: &str) -> Result<Json, ProviderError> {
    let mut body = Map::new();
    put_attr(&mut body, conditions, "operator")?;

    let nested = items(conditions, "conditions")
        .iter()
        .enumerate()
        .map(|(i, condition)| -> Result<Json, ProviderError> {
            let mut entry = Map::new();
            put_attr(&mut entry, condition, "type_id")?;
            put_attr(&mut entry, condition, "config")
                .map_err(within(format!("{}.conditions.{}", path, i)))?;
            Ok(Json::Object(entry))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if !nested.is_empty() {
        body.insert("conditions".to_string(), Json::Array(nested));
    }
    Ok(Json::Object(body))
}

fn edge_json(index: usize, edge: &Value) -> Result<Json, ProviderError> {
    let mut body = Map::new();
    put_attr(&mut body, edge, "name")?;
    put_attr(&mut body, edge, "description")?;
    body.insert(
        "from_node_instance_id".to_string(),
        Json::from(required_str(edge, "from_node_instance_slug")?),
    );
    body.insert(
        "to_node_instance_id".to_string(),
        Json::from(required_str(edge, "to_node_instance_slug")?),
    );
    if let Some(conditions) = edge.get("conditions").filter(|c| !c.is_null()) {
        let path = format!("edges.{}.conditions", index);
        body.insert("conditions".to_string(), conditions_json(conditions, &path)?);
    }
    Ok(Json::Object(body))
}

/// The create and update request body.
pub(crate) fn pipeline_body(state: &Value) -> Result<Json, ProviderError> {
    let nodes = items(state, "nodes")
        .iter()
        .map(node_json)
        .collect::<Result<Vec<_>, _>>()?;
    let edges = items(state, "edges")
        .iter()
        .enumerate()
        .map(|(i, edge)| edge_json(i, edge))
        .collect::<Result<Vec<_>, _>>()?;

    let mut body = Map::new();
    put_attr(&mut body, state, "name")?;
    put_attr(&mut body, state, "description")?;
    body.insert("enabled".to_string(), Json::Bool(true));
    body.insert("nodes".to_string(), Json::Array(nodes));
    body.insert("edges".to_string(), Json::Array(edges));
    Ok(Json::Object(body))
}

#[async_trait]
impl Resource for PipelineResource {
    fn type_name(&self) -> String {
        resource_type_name("pipeline", None)
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a pipeline.")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Pipeline identifier"),
            )
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the pipeline"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description of the pipeline"),
            )
            .with_block(
                "nodes",
                NestedBlock::list(node_block().with_description("Nodes of the pipeline")),
            )
            .with_block(
                "edges",
                NestedBlock::list(edge_block().with_description("Edges between nodes")),
            )
    }

    async fn create(&self, client: &ApiClient, planned: Value) -> Result<Value, ProviderError> {
        let body = pipeline_body(&planned)?;
        let response = client.create(Component::Pipeline, &body).await?;
        let id = response_id(&response)?;
        debug!(
            %id,
            nodes = items(&planned, "nodes").len(),
            edges = items(&planned, "edges").len(),
            "created pipeline"
        );
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn read(&self, client: &ApiClient, current: Value) -> Result<Value, ProviderError> {
        let id = required_str(&current, "id")?.to_string();
        let response = client.get(Component::Pipeline, &id).await?;
        with_attrs(
            current,
            [
                ("name", string_attr(&response, "name")),
                ("description", string_attr(&response, "description")),
            ],
        )
    }

    async fn update(
        &self,
        client: &ApiClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = required_str(&prior, "id")?.to_string();
        client
            .update(Component::Pipeline, &id, &pipeline_body(&planned)?)
            .await?;
        with_attrs(planned, [("id", Value::string(id))])
    }

    async fn delete(&self, client: &ApiClient, current: Value) -> Result<(), ProviderError> {
        let id = required_str(&current, "id")?;
        client.delete(Component::Pipeline, id).await
    }
}
