//! The SQL a store issues, built once with sea-query and rendered per backend.

use crate::{ClaimStatus, Claims, NewClaim, NewResource, Resources, StoreErr, WaitDiscipline};
use sea_query::{
    ColumnDef, Expr, ExprTrait, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement,
    InsertStatement, Order, Query, SelectStatement, Table, TableCreateStatement, UpdateStatement,
};

const RESOURCE_COLUMNS: [Resources; 4] = [
    Resources::Id,
    Resources::Name,
    Resources::Capacity,
    Resources::Version,
];

const CLAIM_COLUMNS: [Claims; 5] = [
    Claims::Id,
    Claims::ResourceId,
    Claims::RequesterId,
    Claims::Status,
    Claims::CreatedAt,
];

/// `SELECT` a resource by key, with an exclusive row lock when a discipline is given
pub fn select_resource(resource_id: i64, lock: Option<WaitDiscipline>) -> SelectStatement {
    let mut stmt = Query::select();
    stmt.columns(RESOURCE_COLUMNS)
        .from(Resources::Table)
        .and_where(Expr::col(Resources::Id).eq(resource_id));
    if let Some(discipline) = lock {
        discipline.apply(&mut stmt);
    }
    stmt
}

pub fn select_resources(resource_ids: &[i64]) -> SelectStatement {
    Query::select()
        .columns(RESOURCE_COLUMNS)
        .from(Resources::Table)
        .and_where(Expr::col(Resources::Id).is_in(resource_ids.iter().copied()))
        .order_by(Resources::Id, Order::Asc)
        .to_owned()
}

pub fn insert_resource(resource: &NewResource) -> Result<InsertStatement, StoreErr> {
    let capacity = resource
        .capacity
        .map(i32::try_from)
        .transpose()
        .map_err(|e| StoreErr::Type(format!("capacity out of range: {e}")))?;
    let mut stmt = Query::insert();
    stmt.into_table(Resources::Table)
        .columns([Resources::Name, Resources::Capacity])
        .values([resource.name.clone().into(), capacity.into()])
        .map_err(|e| StoreErr::Query(e.to_string()))?;
    stmt.returning_all();
    Ok(stmt)
}

/// `SELECT COUNT(*)` of the claims referencing a resource
pub fn count_claims(resource_id: i64) -> SelectStatement {
    Query::select()
        .expr(Expr::cust("COUNT(*)"))
        .from(Claims::Table)
        .and_where(Expr::col(Claims::ResourceId).eq(resource_id))
        .to_owned()
}

pub fn count_claims_by_requester(resource_id: i64, requester_id: &str) -> SelectStatement {
    count_claims(resource_id)
        .and_where(Expr::col(Claims::RequesterId).eq(requester_id))
        .to_owned()
}

pub fn insert_claim(claim: &NewClaim) -> Result<InsertStatement, StoreErr> {
    let mut stmt = Query::insert();
    stmt.into_table(Claims::Table)
        .columns([
            Claims::ResourceId,
            Claims::RequesterId,
            Claims::Status,
            Claims::CreatedAt,
        ])
        .values([
            claim.resource_id.into(),
            claim.requester_id.clone().into(),
            ClaimStatus::Confirmed.to_string().into(),
            claim.created_at.into(),
        ])
        .map_err(|e| StoreErr::Query(e.to_string()))?;
    stmt.returning_all();
    Ok(stmt)
}

/// Compare-and-increment of the resource version
pub fn bump_version(resource_id: i64, expected: i64) -> UpdateStatement {
    Query::update()
        .table(Resources::Table)
        .value(Resources::Version, Expr::col(Resources::Version).add(1))
        .and_where(Expr::col(Resources::Id).eq(resource_id))
        .and_where(Expr::col(Resources::Version).eq(expected))
        .to_owned()
}

/// Children of many parents in one round trip: `WHERE resource_id IN (..)`
pub fn select_claims_by_resources(resource_ids: &[i64]) -> SelectStatement {
    Query::select()
        .columns(CLAIM_COLUMNS)
        .from(Claims::Table)
        .and_where(Expr::col(Claims::ResourceId).is_in(resource_ids.iter().copied()))
        .order_by(Claims::Id, Order::Asc)
        .to_owned()
}

pub fn create_resources_table() -> TableCreateStatement {
    Table::create()
        .table(Resources::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Resources::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Resources::Name).string().not_null())
        .col(ColumnDef::new(Resources::Capacity).integer().null())
        .col(
            ColumnDef::new(Resources::Version)
                .big_integer()
                .not_null()
                .default(0),
        )
        .to_owned()
}

pub fn create_claims_table() -> TableCreateStatement {
    Table::create()
        .table(Claims::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Claims::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Claims::ResourceId).big_integer().not_null())
        .col(ColumnDef::new(Claims::RequesterId).string().not_null())
        .col(ColumnDef::new(Claims::Status).string_len(20).not_null())
        .col(
            ColumnDef::new(Claims::CreatedAt)
                .timestamp_with_time_zone()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .name("fk-claims-resource_id")
                .from(Claims::Table, Claims::ResourceId)
                .to(Resources::Table, Resources::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

/// Index serving the per-resource count; unique when each requester may
/// hold a single claim per resource
pub fn create_claims_index(unique: bool) -> IndexCreateStatement {
    let mut index = Index::create();
    index
        .if_not_exists()
        .name("idx-claims-resource-requester")
        .table(Claims::Table)
        .col(Claims::ResourceId)
        .col(Claims::RequesterId);
    if unique {
        index.unique();
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sea_query::*;

    #[test]
    fn lock_clauses() {
        assert_eq!(
            select_resource(7, None).to_string(PostgresQueryBuilder),
            r#"SELECT "id", "name", "capacity", "version" FROM "resources" WHERE "id" = 7"#
        );
        assert_eq!(
            select_resource(7, Some(WaitDiscipline::Blocking)).to_string(PostgresQueryBuilder),
            r#"SELECT "id", "name", "capacity", "version" FROM "resources" WHERE "id" = 7 FOR UPDATE"#
        );
        assert_eq!(
            select_resource(7, Some(WaitDiscipline::NoWait)).to_string(PostgresQueryBuilder),
            r#"SELECT "id", "name", "capacity", "version" FROM "resources" WHERE "id" = 7 FOR UPDATE NOWAIT"#
        );
        assert_eq!(
            select_resource(7, Some(WaitDiscipline::Skip)).to_string(PostgresQueryBuilder),
            r#"SELECT "id", "name", "capacity", "version" FROM "resources" WHERE "id" = 7 FOR UPDATE SKIP LOCKED"#
        );
        assert_eq!(
            select_resource(7, Some(WaitDiscipline::Skip)).to_string(MysqlQueryBuilder),
            "SELECT `id`, `name`, `capacity`, `version` FROM `resources` WHERE `id` = 7 FOR UPDATE SKIP LOCKED"
        );
    }

    #[test]
    fn counting() {
        assert_eq!(
            count_claims(3).to_string(PostgresQueryBuilder),
            r#"SELECT COUNT(*) FROM "claims" WHERE "resource_id" = 3"#
        );
        assert_eq!(
            count_claims_by_requester(3, "user1").to_string(PostgresQueryBuilder),
            r#"SELECT COUNT(*) FROM "claims" WHERE "resource_id" = 3 AND "requester_id" = 'user1'"#
        );
    }

    #[test]
    fn version_compare_and_bump() {
        assert_eq!(
            bump_version(3, 8).to_string(PostgresQueryBuilder),
            r#"UPDATE "resources" SET "version" = "version" + 1 WHERE "id" = 3 AND "version" = 8"#
        );
    }

    #[test]
    fn batched_children() {
        assert_eq!(
            select_claims_by_resources(&[1, 2, 3]).to_string(PostgresQueryBuilder),
            r#"SELECT "id", "resource_id", "requester_id", "status", "created_at" FROM "claims" WHERE "resource_id" IN (1, 2, 3) ORDER BY "id" ASC"#
        );
    }

    #[test]
    fn claims_reference_their_resource() {
        let sql = create_claims_table().to_string(PostgresQueryBuilder);
        assert!(sql.contains(
            r#"CONSTRAINT "fk-claims-resource_id" FOREIGN KEY ("resource_id") REFERENCES "resources" ("id") ON DELETE CASCADE"#
        ));
    }

    #[test]
    fn capacity_must_fit_the_column() {
        assert!(insert_resource(&NewResource::bounded("Campaign", 10)).is_ok());
        assert!(matches!(
            insert_resource(&NewResource::bounded("Campaign", u32::MAX)),
            Err(StoreErr::Type(_))
        ));
    }
}
