// In-memory executor shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx_facets::{
    AttributeType, EntityMeta, Error, RawRow, Result, SqlExecutor, Statement, StaticCatalog,
};

type Responder = dyn Fn(&Statement) -> Result<Option<Vec<RawRow>>> + Send + Sync;

/// Answers every statement through `respond` and records what it saw.
pub struct MockExecutor {
    respond: Box<Responder>,
    pub seen: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&Statement) -> Result<Option<Vec<RawRow>>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn fetch_all(&self, statement: &Statement) -> Result<Option<Vec<RawRow>>> {
        self.seen.lock().unwrap().push(statement.clone());
        (self.respond)(statement)
    }
}

pub const PRODUCT: &str = "api::product.product";

pub fn product() -> EntityMeta {
    EntityMeta::new(PRODUCT, "products")
        .attribute_with("id", "id", AttributeType::Integer)
        .attribute_with("name", "name", AttributeType::String)
        .attribute_with("price", "price", AttributeType::Decimal)
        .attribute_with("publishedAt", "published_at", AttributeType::DateTime)
}

pub fn catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new().with(product()))
}

pub fn is_ranges(statement: &Statement) -> bool {
    statement.sql.contains("total")
}

pub fn backend_down() -> Error {
    Error::Database(sqlx::Error::PoolTimedOut)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
