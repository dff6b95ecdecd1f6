use anyhow::Result;
use kba_codec::ParserRegistry;
use kba_config::AppConfig;
use kba_db::{PgSchema, TableDef};
use kba_reconcile::TableRoute;

use super::connect;
use crate::RouteArg;

fn table_defs(route: RouteArg) -> Vec<TableDef> {
    let registry = ParserRegistry::new();
    let routes = match route {
        RouteArg::All => vec![TableRoute::historical(), TableRoute::realtime()],
        RouteArg::Nl => vec![TableRoute::historical()],
        RouteArg::Rt => vec![TableRoute::realtime()],
    };
    routes
        .iter()
        .flat_map(|r| r.table_defs(&registry))
        .collect()
}

pub async fn status(settings: &AppConfig) -> Result<()> {
    let pool = connect(settings).await?;
    let schema = PgSchema::new(pool.clone(), table_defs(RouteArg::All));
    let s = kba_db::status(&pool, &schema).await?;
    println!("db_ok={} missing_tables={}", s.ok, s.missing_tables.len());
    Ok(())
}

pub async fn migrate(settings: &AppConfig, route: RouteArg) -> Result<()> {
    let pool = connect(settings).await?;
    let schema = PgSchema::new(pool, table_defs(route));
    let created = kba_db::ensure_tables(&schema).await?;
    for table in &created {
        println!("created={table}");
    }
    println!("tables_created={}", created.len());
    Ok(())
}
