//! Metadata engine tests against a real PostgreSQL
//!
//! Ignored by default. Point `TEST_DATABASE_URL` (or `DATABASE_URL`) at a
//! disposable database and run `cargo test -p api -- --ignored`. Every test
//! uses its own uniquely named rows, so they can share one database.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use api::{
    metadata::{DataType, MetadataError, PermissionFlags, naming},
    models::{
        column::{NewColumn, UpdateColumn},
        module::NewModule,
        record::NewRecord,
        role::NewRole,
        table::{NewTable, Table},
        user::{NewUser, User},
    },
    repositories::{
        ColumnRepository, ModuleRepository, PermissionRepository, RecordRepository,
        RoleRepository, TableRepository, UserRepository,
    },
};
use common::database::{DatabaseConfig, init_pool, run_migrations};
use serde_json::{Map, Value, json};
use sqlx::PgPool;

async fn pool() -> anyhow::Result<PgPool> {
    let mut config = DatabaseConfig::from_env()?;
    if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
        config.database_url = url;
    }
    let pool = init_pool(&config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{} {}", prefix, nanos)
}

async fn user(pool: &PgPool) -> anyhow::Result<User> {
    let users = UserRepository::new(pool.clone());
    let tag = unique("tester").replace(' ', "");
    users
        .create(&NewUser {
            name: "Tester".to_string(),
            email: format!("{}@example.com", tag),
            password: "clave2024".to_string(),
            avatar_url: None,
            role_ids: Vec::new(),
        })
        .await
}

async fn table(pool: &PgPool, module_id: i32, name: &str) -> anyhow::Result<Table> {
    TableRepository::new(pool.clone())
        .create(&NewTable {
            module_id: Some(module_id),
            name: unique(name),
            description: None,
            original_table_id: None,
            foreign_table_id: None,
            position: None,
        })
        .await
}

fn string_column(table_id: i32, name: &str) -> NewColumn {
    NewColumn {
        table_id,
        name: name.to_string(),
        data_type: DataType::String,
        is_required: false,
        is_foreign_key: false,
        foreign_table_id: None,
        foreign_column_name: None,
        relation_type: None,
        validations: None,
        column_position: None,
        is_unique: false,
        custom_options: None,
    }
}

async fn module(pool: &PgPool, owner: &User, name: &str) -> anyhow::Result<i32> {
    let module = ModuleRepository::new(pool.clone())
        .create(
            &NewModule {
                name: unique(name),
                description: None,
                icon: None,
                position: None,
            },
            owner.id,
        )
        .await?;
    Ok(module.id)
}

fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_join_resolver_is_idempotent_and_retargets() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module = ModuleRepository::new(pool.clone())
        .create(
            &NewModule {
                name: unique("Ventas"),
                description: None,
                icon: None,
                position: None,
            },
            owner.id,
        )
        .await?;

    let clientes = table(&pool, module.id, "Clientes").await?;
    let pedidos = table(&pool, module.id, "Pedidos").await?;
    let columns = ColumnRepository::new(pool.clone());
    columns.create(&string_column(pedidos.id, "nombre")).await?;
    columns.create(&string_column(pedidos.id, "codigo")).await?;

    let tables = TableRepository::new(pool.clone());
    let first = tables
        .get_or_create_join_table(clientes.id, pedidos.id, Some("nombre"))
        .await?;
    assert!(first.created);
    assert_eq!(
        first.table.name,
        naming::join_table_name(&clientes.name, &pedidos.name)
    );
    assert_eq!(first.table.module_id, Some(module.id));

    let join_columns = columns.list_by_table(first.table.id).await?;
    let original = join_columns
        .iter()
        .find(|c| c.name == "original_record_id")
        .ok_or_else(|| anyhow::anyhow!("original_record_id missing"))?;
    assert_eq!(original.foreign_table_id, Some(clientes.id));
    assert_eq!(original.foreign_column_name.as_deref(), Some("id"));
    let foreign = join_columns
        .iter()
        .find(|c| c.name == "foreign_record_id")
        .ok_or_else(|| anyhow::anyhow!("foreign_record_id missing"))?;
    assert_eq!(foreign.foreign_table_id, Some(pedidos.id));
    assert_eq!(foreign.foreign_column_name.as_deref(), Some("nombre"));

    // reversed argument order resolves to the same table
    let again = tables
        .get_or_create_join_table(pedidos.id, clientes.id, Some("nombre"))
        .await?;
    assert!(!again.created);
    assert_eq!(again.table.id, first.table.id);

    let retargeted = tables
        .get_or_create_join_table(clientes.id, pedidos.id, Some("codigo"))
        .await?;
    assert!(!retargeted.created);
    assert_eq!(retargeted.table.id, first.table.id);
    let foreign = columns
        .list_by_table(first.table.id)
        .await?
        .into_iter()
        .find(|c| c.name == "foreign_record_id")
        .ok_or_else(|| anyhow::anyhow!("foreign_record_id missing"))?;
    assert_eq!(foreign.foreign_column_name.as_deref(), Some("codigo"));

    let (pairs,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tables
         WHERE (original_table_id = $1 AND foreign_table_id = $2)
            OR (original_table_id = $2 AND foreign_table_id = $1)",
    )
    .bind(clientes.id)
    .bind(pedidos.id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(pairs, 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_column_create_backfills_and_rename_propagates() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module = ModuleRepository::new(pool.clone())
        .create(
            &NewModule {
                name: unique("Inventario"),
                description: None,
                icon: None,
                position: None,
            },
            owner.id,
        )
        .await?;
    let productos = table(&pool, module.id, "Productos").await?;

    let columns = ColumnRepository::new(pool.clone());
    let records = RecordRepository::new(pool.clone());
    let foo = columns.create(&string_column(productos.id, "foo")).await?;

    let before = records
        .create(
            &NewRecord {
                table_id: productos.id,
                record_data: payload(json!({ "foo": "x" })),
                original_record_id: None,
            },
            owner.id,
        )
        .await?;

    columns.create(&string_column(productos.id, "color")).await?;
    let after = records
        .create(
            &NewRecord {
                table_id: productos.id,
                record_data: payload(json!({ "foo": "y", "color": "rojo" })),
                original_record_id: None,
            },
            owner.id,
        )
        .await?;

    let before = records
        .find_by_id(before.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record vanished"))?;
    assert_eq!(before.record_data.0.get("color"), Some(&json!("")));
    assert_eq!(after.record_data.0.get("color"), Some(&json!("rojo")));

    columns
        .update(
            foo.id,
            &UpdateColumn {
                name: Some("bar".to_string()),
                ..Default::default()
            },
        )
        .await?;

    for record in records.list_by_table(productos.id).await? {
        assert!(record.record_data.0.get("foo").is_none());
        assert!(record.record_data.0.contains_key("bar"));
    }
    let renamed = records
        .find_by_id(before.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("record vanished"))?;
    assert_eq!(renamed.record_data.0.get("bar"), Some(&json!("x")));

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_bulk_role_update_replaces_rows() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module = ModuleRepository::new(pool.clone())
        .create(
            &NewModule {
                name: unique("Finanzas"),
                description: None,
                icon: None,
                position: None,
            },
            owner.id,
        )
        .await?;
    let t1 = table(&pool, module.id, "Facturas").await?;
    let t2 = table(&pool, module.id, "Pagos").await?;

    let role = RoleRepository::new(pool.clone())
        .create(&NewRole {
            name: unique("Contador"),
            description: None,
            is_admin: false,
        })
        .await?;

    let permissions = PermissionRepository::new(pool.clone());
    permissions.upsert(role.id, t2.id, PermissionFlags::ALL).await?;

    let requested = HashMap::from([
        (t1.id, PermissionFlags::READ_ONLY),
        (t2.id, PermissionFlags::NONE),
    ]);
    let written = permissions.bulk_update_role(role.id, &requested).await?;

    assert_eq!(written.len(), 1);
    assert_eq!(written[0].table_id, t1.id);
    assert_eq!(written[0].flags, PermissionFlags::READ_ONLY);
    assert!(permissions.find(role.id, t2.id).await?.is_none());

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_editor_and_viewer_roles_combine() -> anyhow::Result<()> {
    let pool = pool().await?;
    let member = user(&pool).await?;
    let module = ModuleRepository::new(pool.clone())
        .create(
            &NewModule {
                name: unique("Operaciones"),
                description: None,
                icon: None,
                position: None,
            },
            member.id,
        )
        .await?;
    let target = table(&pool, module.id, "Tareas").await?;

    let roles = RoleRepository::new(pool.clone());
    let editor = roles
        .create(&NewRole {
            name: unique("Editor"),
            description: None,
            is_admin: false,
        })
        .await?;
    let viewer = roles
        .create(&NewRole {
            name: unique("Viewer"),
            description: None,
            is_admin: false,
        })
        .await?;

    let permissions = PermissionRepository::new(pool.clone());
    permissions
        .upsert(
            editor.id,
            target.id,
            PermissionFlags {
                can_update: true,
                ..PermissionFlags::NONE
            },
        )
        .await?;
    permissions
        .upsert(viewer.id, target.id, PermissionFlags::READ_ONLY)
        .await?;

    roles.assign_users(editor.id, &[member.id]).await?;
    roles.assign_users(viewer.id, &[member.id]).await?;

    let effective = permissions.user_permissions(member.id, target.id).await?;
    assert_eq!(
        effective,
        PermissionFlags {
            can_create: false,
            can_read: true,
            can_update: true,
            can_delete: false,
        }
    );

    roles.remove_users(editor.id, &[member.id]).await?;
    roles.remove_users(viewer.id, &[member.id]).await?;
    assert_eq!(
        permissions.user_permissions(member.id, target.id).await?,
        PermissionFlags::NONE
    );

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_new_join_table_grants_read_to_existing_roles() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module_id = module(&pool, &owner, "Compras").await?;
    let proveedores = table(&pool, module_id, "Proveedores").await?;
    let ordenes = table(&pool, module_id, "Ordenes").await?;

    let role = RoleRepository::new(pool.clone())
        .create(&NewRole {
            name: unique("Auditor"),
            description: None,
            is_admin: false,
        })
        .await?;

    let join = TableRepository::new(pool.clone())
        .get_or_create_join_table(proveedores.id, ordenes.id, None)
        .await?;
    assert!(join.created);

    let permissions = PermissionRepository::new(pool.clone());
    let grant = permissions
        .find(role.id, join.table.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no grant on the join table"))?;
    assert_eq!(grant.flags, PermissionFlags::READ_ONLY);

    // the base tables are untouched
    assert!(permissions.find(role.id, proveedores.id).await?.is_none());
    assert!(permissions.find(role.id, ordenes.id).await?.is_none());

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_join_display_column_inferred_from_existing_relation() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module_id = module(&pool, &owner, "Cartera").await?;
    let facturas = table(&pool, module_id, "Facturas").await?;
    let empresas = table(&pool, module_id, "Empresas").await?;

    let columns = ColumnRepository::new(pool.clone());
    columns.create(&string_column(empresas.id, "razon_social")).await?;
    columns
        .create(&NewColumn {
            data_type: DataType::Foreign,
            foreign_table_id: Some(empresas.id),
            foreign_column_name: Some("razon_social".to_string()),
            ..string_column(facturas.id, "empresa")
        })
        .await?;

    let join = TableRepository::new(pool.clone())
        .get_or_create_join_table(facturas.id, empresas.id, None)
        .await?;

    let foreign = join
        .columns
        .iter()
        .find(|c| c.name == "foreign_record_id")
        .ok_or_else(|| anyhow::anyhow!("foreign_record_id missing"))?;
    assert_eq!(foreign.foreign_table_id, Some(empresas.id));
    assert_eq!(foreign.foreign_column_name.as_deref(), Some("razon_social"));

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_join_rejects_display_column_missing_on_stored_foreign_table() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module_id = module(&pool, &owner, "Ventas").await?;
    let clientes = table(&pool, module_id, "Clientes").await?;
    let pedidos = table(&pool, module_id, "Pedidos").await?;

    let columns = ColumnRepository::new(pool.clone());
    columns.create(&string_column(clientes.id, "codigo")).await?;
    columns.create(&string_column(pedidos.id, "nombre")).await?;

    let tables = TableRepository::new(pool.clone());
    let first = tables
        .get_or_create_join_table(clientes.id, pedidos.id, Some("nombre"))
        .await?;

    // stored orientation keeps Pedidos as the foreign side, which has no "codigo"
    let err = tables
        .get_or_create_join_table(pedidos.id, clientes.id, Some("codigo"))
        .await
        .err()
        .ok_or_else(|| anyhow::anyhow!("unknown display column was accepted"))?;
    assert!(matches!(
        err.downcast_ref::<MetadataError>(),
        Some(MetadataError::Invalid(_))
    ));

    let foreign = columns
        .list_by_table(first.table.id)
        .await?
        .into_iter()
        .find(|c| c.name == "foreign_record_id")
        .ok_or_else(|| anyhow::anyhow!("foreign_record_id missing"))?;
    assert_eq!(foreign.foreign_table_id, Some(pedidos.id));
    assert_eq!(foreign.foreign_column_name.as_deref(), Some("nombre"));

    // a brand-new pair checks the display column too
    let envios = table(&pool, module_id, "Envios").await?;
    let err = tables
        .get_or_create_join_table(clientes.id, envios.id, Some("guia"))
        .await
        .err()
        .ok_or_else(|| anyhow::anyhow!("unknown display column was accepted"))?;
    assert!(matches!(
        err.downcast_ref::<MetadataError>(),
        Some(MetadataError::Invalid(_))
    ));

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_rename_repoints_columns_that_display_it() -> anyhow::Result<()> {
    let pool = pool().await?;
    let owner = user(&pool).await?;
    let module_id = module(&pool, &owner, "Proyectos").await?;
    let personas = table(&pool, module_id, "Personas").await?;
    let tareas = table(&pool, module_id, "Tareas").await?;

    let columns = ColumnRepository::new(pool.clone());
    let nombre = columns.create(&string_column(tareas.id, "nombre")).await?;
    let join = TableRepository::new(pool.clone())
        .get_or_create_join_table(personas.id, tareas.id, Some("nombre"))
        .await?;

    columns
        .update(
            nombre.id,
            &UpdateColumn {
                name: Some("titulo".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let foreign = columns
        .list_by_table(join.table.id)
        .await?
        .into_iter()
        .find(|c| c.name == "foreign_record_id")
        .ok_or_else(|| anyhow::anyhow!("foreign_record_id missing"))?;
    assert_eq!(foreign.foreign_table_id, Some(tareas.id));
    assert_eq!(foreign.foreign_column_name.as_deref(), Some("titulo"));

    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_admin_role_without_rows_resolves_to_no_flags() -> anyhow::Result<()> {
    let pool = pool().await?;
    let admin = user(&pool).await?;
    let module_id = module(&pool, &admin, "Sistemas").await?;
    let target = table(&pool, module_id, "Equipos").await?;

    let roles = RoleRepository::new(pool.clone());
    let role = roles
        .create(&NewRole {
            name: unique("Administrador"),
            description: None,
            is_admin: true,
        })
        .await?;
    roles.assign_users(role.id, &[admin.id]).await?;

    let permissions = PermissionRepository::new(pool.clone());
    assert!(permissions.is_admin(admin.id).await?);
    assert_eq!(
        permissions.user_permissions(admin.id, target.id).await?,
        PermissionFlags::NONE
    );
    assert!(
        !permissions
            .user_permissions_all_tables(admin.id)
            .await?
            .contains_key(&target.id)
    );

    Ok(())
}
