//! Built-in schema upgrade plan.
//!
//! Each release that changes the schema adds steps here under its own
//! version. Steps already recorded in the ledger are never run again, so an
//! existing step must not be edited once released.

use oxide_migrate::prelude::*;

use crate::content::content_table;
use crate::content_type::{content_type_table, description_column, CONTENT_TYPE_TABLE};
use crate::node::{node_table, NODE_TABLE, ROOT_ID, ROOT_KEY, ROOT_OBJECT_TYPE, ROOT_PATH};

/// Product name recorded in the ledger.
pub const PRODUCT: &str = "oxide-cms";

/// Display text of the root node.
pub const ROOT_TEXT: &str = "SYSTEM DATA: content root";

/// Creates the `node` table.
pub struct CreateNodeTable;

impl Migration for CreateNodeTable {
    const PRODUCT: &'static str = PRODUCT;
    const VERSION: &'static str = "8.0.0";
    const NAME: &'static str = "create_node_table";

    fn up(m: &mut MigrationBuilder) {
        m.create().table(node_table());
    }
}

/// Inserts the root sentinel node.
pub struct InsertRootNode;

impl Migration for InsertRootNode {
    const PRODUCT: &'static str = PRODUCT;
    const VERSION: &'static str = "8.0.0";
    const NAME: &'static str = "insert_root_node";

    fn up(m: &mut MigrationBuilder) {
        m.execute().code(root_node_sql);
    }
}

/// Creates the `contentType` table.
pub struct CreateContentTypeTable;

impl Migration for CreateContentTypeTable {
    const PRODUCT: &'static str = PRODUCT;
    const VERSION: &'static str = "8.0.0";
    const NAME: &'static str = "create_content_type_table";

    fn up(m: &mut MigrationBuilder) {
        m.create().table(content_type_table());
    }
}

/// Adds `contentType.description`.
pub struct AddContentTypeDescription;

impl Migration for AddContentTypeDescription {
    const PRODUCT: &'static str = PRODUCT;
    const VERSION: &'static str = "8.1.0";
    const NAME: &'static str = "add_content_type_description";

    fn up(m: &mut MigrationBuilder) {
        m.alter()
            .table(CONTENT_TYPE_TABLE)
            .add_column(description_column());
    }
}

/// Creates the `content` table.
pub struct CreateContentTable;

impl Migration for CreateContentTable {
    const PRODUCT: &'static str = PRODUCT;
    const VERSION: &'static str = "8.1.0";
    const NAME: &'static str = "create_content_table";

    fn up(m: &mut MigrationBuilder) {
        m.create().table(content_table());
    }
}

/// The full upgrade plan, oldest step first.
pub fn plan() -> Result<MigrationPlan> {
    let mut plan = MigrationPlan::new(PRODUCT);
    plan.register::<CreateNodeTable>()?
        .register::<InsertRootNode>()?
        .register::<CreateContentTypeTable>()?
        .register::<AddContentTypeDescription>()?
        .register::<CreateContentTable>()?;
    Ok(plan)
}

// The root row carries an explicit id, which SQL Server only accepts with
// IDENTITY_INSERT switched on.
fn root_node_sql(ctx: &MigrationContext<'_>) -> Result<String> {
    let d = ctx.dialect;
    let literal = |value: DefaultValue| {
        d.render_default(&value)
            .ok_or_else(|| MigrateError::CodeExpression {
                step: ctx.step.to_string(),
                message: format!("{} has no literal for {:?}", d.name(), value),
            })
    };

    let columns = [
        "id",
        "uniqueId",
        "parentId",
        "level",
        "path",
        "sortOrder",
        "trashed",
        "text",
        "nodeObjectType",
        "createDate",
    ]
    .iter()
    .map(|c| d.quote_identifier(c))
    .collect::<Vec<_>>()
    .join(", ");

    let values = [
        literal(DefaultValue::Integer(ROOT_ID.into())),
        literal(DefaultValue::String(ROOT_KEY.to_string())),
        literal(DefaultValue::Integer(ROOT_ID.into())),
        literal(DefaultValue::Integer(0)),
        literal(DefaultValue::String(ROOT_PATH.to_string())),
        literal(DefaultValue::Integer(0)),
        literal(DefaultValue::Bool(false)),
        literal(DefaultValue::String(ROOT_TEXT.to_string())),
        literal(DefaultValue::String(ROOT_OBJECT_TYPE.to_string())),
        literal(DefaultValue::CurrentDateTime),
    ]
    .into_iter()
    .collect::<Result<Vec<_>>>()?
    .join(", ");

    let table = d.quote_identifier(NODE_TABLE);
    let insert = format!("INSERT INTO {} ({}) VALUES ({})", table, columns, values);

    if d.name() == "sqlserver" {
        Ok(format!(
            "SET IDENTITY_INSERT {table} ON;\n{insert};\nSET IDENTITY_INSERT {table} OFF",
            table = table,
            insert = insert
        ))
    } else {
        Ok(insert)
    }
}
