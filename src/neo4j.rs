//! Neo4j implementation of [`GraphStore`] over Bolt.
//!
//! Statements are assembled from the closed [`Label`]/[`RelType`] sets and
//! static property names; every data value travels as a query parameter.

use crate::error::{DblpGraphError, Result};
use crate::graph::{
    sample_pairs, GraphCounts, GraphStore, Label, NodeRef, Properties, PropertyValue, RelType,
};
use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

/// Pairs per UNWIND batch when materializing random edges
const EDGE_BATCH_SIZE: usize = 5_000;

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

/// A Cypher statement under construction
#[derive(Debug, Default)]
struct Statement {
    text: String,
    params: Vec<(String, PropertyValue)>,
}

impl Statement {
    fn push(&mut self, clause: &str) -> &mut Self {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(clause);
        self
    }

    fn bind(&mut self, name: String, value: &PropertyValue) -> String {
        let placeholder = format!("${}", name);
        self.params.push((name, value.clone()));
        placeholder
    }

    /// `(var:Label {field: $var_0, ...})`
    fn node(&mut self, var: &str, node: &NodeRef) -> String {
        let fields: Vec<String> = node
            .key
            .iter()
            .enumerate()
            .map(|(i, (field, value))| {
                let placeholder = self.bind(format!("{}_{}", var, i), value);
                format!("{}: {}", field, placeholder)
            })
            .collect();

        if fields.is_empty() {
            format!("({}:{})", var, node.label)
        } else {
            format!("({}:{} {{{}}})", var, node.label, fields.join(", "))
        }
    }

    /// `SET var.field = $var_set_0, ...`, or `None` for no properties
    fn set(&mut self, var: &str, props: &Properties) -> Option<String> {
        if props.is_empty() {
            return None;
        }
        let assignments: Vec<String> = props
            .iter()
            .enumerate()
            .map(|(i, (field, value))| {
                let placeholder = self.bind(format!("{}_set_{}", var, i), value);
                format!("{}.{} = {}", var, field, placeholder)
            })
            .collect();
        Some(format!("SET {}", assignments.join(", ")))
    }

    fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(Query::new(self.text), |query, (name, value)| match value {
                PropertyValue::String(s) => query.param(&name, s),
                PropertyValue::Int(i) => query.param(&name, i),
                PropertyValue::Bool(b) => query.param(&name, b),
            })
    }
}

fn upsert_node_statement(node: &NodeRef, props: &Properties) -> Statement {
    let mut stmt = Statement::default();
    let pattern = stmt.node("n", node);
    stmt.push(&format!("MERGE {}", pattern));
    if let Some(set) = stmt.set("n", props) {
        stmt.push(&set);
    }
    stmt
}

fn set_properties_statement(node: &NodeRef, props: &Properties) -> Statement {
    let mut stmt = Statement::default();
    let pattern = stmt.node("n", node);
    stmt.push(&format!("MATCH {}", pattern));
    if let Some(set) = stmt.set("n", props) {
        stmt.push(&set);
    }
    stmt.push("RETURN count(n) AS count");
    stmt
}

fn upsert_relationship_statement(
    rel: RelType,
    from: &NodeRef,
    to: &NodeRef,
    props: &Properties,
) -> Statement {
    let mut stmt = Statement::default();
    let a = stmt.node("a", from);
    let b = stmt.node("b", to);
    stmt.push(&format!("MATCH {}", a))
        .push(&format!("MATCH {}", b))
        .push(&format!("MERGE (a)-[r:{}]->(b)", rel));
    if let Some(set) = stmt.set("r", props) {
        stmt.push(&set);
    }
    stmt.push("RETURN count(r) AS count");
    stmt
}

fn create_index_statement(label: Label, field: &str) -> String {
    format!(
        "CREATE INDEX {}_{} IF NOT EXISTS FOR (n:{}) ON (n.{})",
        label.as_str().to_lowercase(),
        field,
        label,
        field
    )
}

/// Neo4j-backed graph store
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect and verify the server answers queries.
    ///
    /// neo4rs builds its pool lazily; the `RETURN 1` ping forces a Bolt
    /// handshake so an unreachable server fails here.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(4)
            .fetch_size(500)
            .build()?;

        let graph = Graph::connect(neo4j_config).await?;
        graph.run(Query::new("RETURN 1".to_string())).await?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn execute(&self, query: Query) -> Result<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn query_scalar<T: DeserializeOwned>(&self, query: Query, field: &str) -> Result<Option<T>> {
        let rows = self.query(query).await?;
        match rows.into_iter().next() {
            Some(row) => {
                let value: T = row.get(field).map_err(|e| {
                    DblpGraphError::GraphResult(format!("field '{}': {:?}", field, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn count(&self, query: Query) -> Result<usize> {
        let count: i64 = self.query_scalar(query, "count").await?.unwrap_or(0);
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_node(&self, node: &NodeRef, props: &Properties) -> Result<()> {
        self.execute(upsert_node_statement(node, props).into_query()).await
    }

    async fn set_properties(&self, node: &NodeRef, props: &Properties) -> Result<usize> {
        self.count(set_properties_statement(node, props).into_query()).await
    }

    async fn upsert_relationship(
        &self,
        rel: RelType,
        from: &NodeRef,
        to: &NodeRef,
        props: &Properties,
    ) -> Result<usize> {
        self.count(upsert_relationship_statement(rel, from, to, props).into_query())
            .await
    }

    async fn delete_all(&self, label: Label) -> Result<usize> {
        let query = Query::new(format!(
            "MATCH (n:{}) DETACH DELETE n RETURN count(*) AS count",
            label
        ));
        self.count(query).await
    }

    async fn create_index(&self, label: Label, field: &'static str) -> Result<()> {
        debug!(label = %label, field, "Creating index");
        self.execute(Query::new(create_index_statement(label, field))).await
    }

    async fn generate_random_edges(
        &self,
        label: Label,
        rel: RelType,
        key_field: &'static str,
        probability: f64,
        seed: u64,
    ) -> Result<usize> {
        let rows = self
            .query(Query::new(format!(
                "MATCH (n:{}) WHERE n.{} IS NOT NULL RETURN n.{} AS key ORDER BY key",
                label, key_field, key_field
            )))
            .await?;
        let keys = rows
            .into_iter()
            .map(|row| {
                row.get::<String>("key")
                    .map_err(|e| DblpGraphError::GraphResult(format!("field 'key': {:?}", e)))
            })
            .collect::<Result<Vec<String>>>()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let pairs = sample_pairs(keys.len(), probability, &mut rng)?;
        debug!(nodes = keys.len(), pairs = pairs.len(), "Sampled random edges");

        let statement = format!(
            "UNWIND range(0, size($from) - 1) AS i \
             MATCH (a:{label} {{{field}: $from[i]}}) \
             MATCH (b:{label} {{{field}: $to[i]}}) \
             MERGE (a)-[r:{rel}]->(b) \
             RETURN count(r) AS count",
            label = label,
            field = key_field,
            rel = rel
        );

        let mut merged = 0;
        for batch in pairs.chunks(EDGE_BATCH_SIZE) {
            let from: Vec<String> = batch.iter().map(|(i, _)| keys[*i].clone()).collect();
            let to: Vec<String> = batch.iter().map(|(_, j)| keys[*j].clone()).collect();
            let query = Query::new(statement.clone())
                .param("from", from)
                .param("to", to);
            merged += self.count(query).await?;
        }
        Ok(merged)
    }

    async fn counts(&self) -> Result<GraphCounts> {
        let nodes = self
            .count(Query::new("MATCH (n) RETURN count(n) AS count".to_string()))
            .await?;
        let relationships = self
            .count(Query::new(
                "MATCH ()-[r]->() RETURN count(r) AS count".to_string(),
            ))
            .await?;
        Ok(GraphCounts {
            nodes,
            relationships,
        })
    }
}
