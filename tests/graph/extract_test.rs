use tributary::graph::{extract_table_references, SourceDialect, TableReference};

fn refs(sql: &str, dialect: SourceDialect) -> Vec<TableReference> {
    extract_table_references(sql, dialect).unwrap()
}

#[test]
fn test_insert_select_writes_target_reads_source() {
    assert_eq!(
        refs("INSERT INTO od_sales SELECT * FROM stg_sales", SourceDialect::Mssql),
        vec![
            TableReference::writes("od_sales"),
            TableReference::reads("stg_sales"),
        ]
    );
}

#[test]
fn test_join_sources_are_reads() {
    let sql = "INSERT INTO od_summary \
               SELECT c.id, SUM(s.amount) FROM od_sales s \
               JOIN od_clients c ON c.id = s.client_id GROUP BY c.id";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_summary"),
            TableReference::reads("od_sales"),
            TableReference::reads("od_clients"),
        ]
    );
}

#[test]
fn test_update_target_and_subquery() {
    let sql = "UPDATE od_sales SET flag = 1 WHERE client_id IN (SELECT id FROM od_blocked)";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_sales"),
            TableReference::reads("od_blocked"),
        ]
    );
}

#[test]
fn test_cte_names_are_not_tables() {
    let sql = "WITH recent AS (SELECT * FROM od_sales) SELECT * FROM recent";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![TableReference::reads("od_sales")]
    );
}

#[test]
fn test_create_table_as_select() {
    assert_eq!(
        refs("CREATE TABLE od_copy AS SELECT * FROM od_sales", SourceDialect::Generic),
        vec![
            TableReference::writes("od_copy"),
            TableReference::reads("od_sales"),
        ]
    );
}

#[test]
fn test_create_view() {
    assert_eq!(
        refs("CREATE VIEW v_sales AS SELECT * FROM od_sales", SourceDialect::Generic),
        vec![
            TableReference::writes("v_sales"),
            TableReference::reads("od_sales"),
        ]
    );
}

#[test]
fn test_select_into_writes_target() {
    let result = refs("SELECT * INTO XTMP_work FROM od_sales", SourceDialect::Mssql);
    assert_eq!(
        result,
        vec![
            TableReference::writes("XTMP_work"),
            TableReference::reads("od_sales"),
        ]
    );
}

#[test]
fn test_repeated_references_are_reported_once() {
    let sql = "INSERT INTO t SELECT * FROM s; INSERT INTO t SELECT * FROM s";
    assert_eq!(refs(sql, SourceDialect::Mssql).len(), 2);
}

#[test]
fn test_same_table_read_and_written() {
    let result = refs("INSERT INTO t SELECT * FROM t", SourceDialect::Mssql);
    assert_eq!(
        result,
        vec![TableReference::writes("t"), TableReference::reads("t")]
    );
}

#[test]
fn test_parse_error() {
    assert!(extract_table_references("SELEC * FORM t", SourceDialect::Mssql).is_err());
}

#[test]
fn test_procedure_definition_with_begin_end() {
    let sql = "CREATE PROCEDURE sp_cargar_clientes AS BEGIN \
               INSERT INTO od_clientes (cliente_id, nombre, email) \
               SELECT id, name, email FROM stage_crm_clientes; END";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_clientes"),
            TableReference::reads("stage_crm_clientes"),
        ]
    );
}

#[test]
fn test_procedure_definition_with_comment_and_update() {
    let sql = "CREATE PROCEDURE sp_cargar_ventas AS BEGIN\n\
               -- Carga ventas del dia\n\
               INSERT INTO od_ventas (venta_id, cliente_id, monto) \
               SELECT id, cli_id, amount FROM stage_pos_sales;\n\
               UPDATE od_clientes SET ult_compra = GETDATE() \
               WHERE cliente_id IN (SELECT cli_id FROM stage_pos_sales);\n\
               END";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_ventas"),
            TableReference::reads("stage_pos_sales"),
            TableReference::writes("od_clientes"),
        ]
    );
}

#[test]
fn test_parameters_and_set_options_are_skipped() {
    let sql = "CREATE PROCEDURE dbo.usp_load_sales @d DATE, @region INT = 1 AS\n\
               BEGIN\n\
               SET NOCOUNT ON;\n\
               INSERT INTO od_sales SELECT * FROM stg_sales WHERE sale_date = @d;\n\
               END";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_sales"),
            TableReference::reads("stg_sales"),
        ]
    );
}

#[test]
fn test_body_without_semicolons() {
    let sql = "CREATE PROCEDURE usp_refresh AS\n\
               SET NOCOUNT ON\n\
               TRUNCATE TABLE od_summary\n\
               INSERT INTO od_summary SELECT client_id, SUM(amount) \
               FROM od_sales GROUP BY client_id\n\
               UPDATE s SET s.flag = 1 \
               FROM od_summary s JOIN od_blocked b ON b.client_id = s.client_id";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_summary"),
            TableReference::reads("od_sales"),
            TableReference::reads("od_blocked"),
        ]
    );
}

#[test]
fn test_no_parsable_statement_is_an_error() {
    let sql = "CREATE PROCEDURE usp_broken AS BEGIN THIS IS NOT SQL; END";
    assert!(extract_table_references(sql, SourceDialect::Mssql).is_err());
}

#[test]
fn test_update_through_alias_writes_aliased_table() {
    let sql = "UPDATE t SET t.x = s.x FROM od_sales t JOIN od_src s ON t.id = s.id";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![
            TableReference::writes("od_sales"),
            TableReference::reads("od_src"),
        ]
    );
}

#[test]
fn test_delete_join_sources_are_reads() {
    let sql = "DELETE t FROM od_sales t JOIN od_src s ON t.id = s.id";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![TableReference::reads("od_src")]
    );

    let sql = "DELETE FROM od_sales WHERE client_id IN (SELECT id FROM od_blocked)";
    assert_eq!(
        refs(sql, SourceDialect::Mssql),
        vec![TableReference::reads("od_blocked")]
    );
}

#[test]
fn test_merge_writes_target_reads_source() {
    let sql = "MERGE INTO od_clients AS t USING stage_clients AS s ON t.id = s.id \
               WHEN MATCHED THEN UPDATE SET t.name = s.name \
               WHEN NOT MATCHED THEN INSERT (id, name) VALUES (s.id, s.name)";
    assert_eq!(
        refs(sql, SourceDialect::Generic),
        vec![
            TableReference::writes("od_clients"),
            TableReference::reads("stage_clients"),
        ]
    );
}
