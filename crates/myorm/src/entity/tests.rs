use super::*;
use crate::context::SingleConnection;
use crate::row::Row;
use crate::testing::MockClient;

const fn col(
    name: &'static str,
    sql_type: &'static str,
    nullable: bool,
    key: KeyKind,
    default: Option<&'static str>,
    extra: &'static str,
) -> ColumnDescriptor {
    ColumnDescriptor {
        name,
        sql_type,
        nullable,
        key,
        default,
        extra,
        references: None,
    }
}

static CUSTOMERS: TableDescriptor = TableDescriptor {
    connection: "main",
    table: "customers",
    columns: &[
        col("id", "int(11)", false, KeyKind::Primary, None, "auto_increment"),
        col("name", "varchar(64)", false, KeyKind::None, None, ""),
    ],
};

static ORDERS: TableDescriptor = TableDescriptor {
    connection: "main",
    table: "orders",
    columns: &[
        col("id", "int(11)", false, KeyKind::Primary, None, "auto_increment"),
        col("customer_id", "int(11)", false, KeyKind::Foreign, None, ""),
        col("status", "varchar(16)", false, KeyKind::None, Some("new"), ""),
        col("note", "text", true, KeyKind::None, None, ""),
    ],
};

static TOKENS: TableDescriptor = TableDescriptor {
    connection: "main",
    table: "tokens",
    columns: &[
        col("code", "char(8)", false, KeyKind::Primary, None, ""),
        col("label", "varchar(32)", true, KeyKind::None, None, ""),
    ],
};

macro_rules! model {
    ($name:ident, $descriptor:ident) => {
        #[derive(Debug, Clone)]
        struct $name {
            record: Record,
        }

        #[allow(dead_code)]
        impl $name {
            fn new() -> Self {
                Self {
                    record: Record::new(&$descriptor),
                }
            }
        }

        impl Entity for $name {
            fn descriptor() -> &'static TableDescriptor {
                &$descriptor
            }
            fn from_record(record: Record) -> Self {
                Self { record }
            }
            fn record(&self) -> &Record {
                &self.record
            }
            fn record_mut(&mut self) -> &mut Record {
                &mut self.record
            }
            fn into_record(self) -> Record {
                self.record
            }
        }
    };
}

model!(Customer, CUSTOMERS);
model!(Order, ORDERS);
model!(Token, TOKENS);

fn context() -> Context<SingleConnection<MockClient>> {
    Context::new(
        SingleConnection::new(MockClient::new()),
        Registry::from_descriptors([&CUSTOMERS, &ORDERS, &TOKENS]),
    )
}

fn mock(ctx: &Context<SingleConnection<MockClient>>) -> &MockClient {
    ctx.provider().client()
}

fn order_row(id: i64, customer_id: i64, status: &str) -> Row {
    Row::from_pairs([
        ("id", Value::Int(id)),
        ("customer_id", Value::Int(customer_id)),
        ("status", Value::from(status)),
        ("note", Value::Null),
    ])
}

#[tokio::test]
async fn saving_an_unmodified_loaded_entity_issues_nothing() {
    let ctx = context();
    mock(&ctx).push_rows(vec![order_row(1, 3, "open")]);

    let mut order = Order::find_by_id(&ctx, 1).await.unwrap().unwrap();
    assert_eq!(
        mock(&ctx).sql_log(),
        vec!["SELECT * FROM `orders` WHERE `id`=? LIMIT 1"]
    );

    let outcome = order.save(&ctx).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Unchanged);
    assert_eq!(mock(&ctx).statements().len(), 1);
}

#[tokio::test]
async fn remove_without_key_issues_nothing() {
    let ctx = context();
    let mut order = Order::new();
    order.record_mut().set("status", "open");

    let err = order.remove(&ctx).await.unwrap_err();
    assert!(err.is_missing_primary_key());
    assert!(mock(&ctx).statements().is_empty());
}

#[tokio::test]
async fn remove_targets_primary_key() {
    let ctx = context();
    mock(&ctx).push_rows(vec![order_row(8, 3, "open")]);
    let mut order = Order::find_by_id(&ctx, 8).await.unwrap().unwrap();

    let affected = order.remove(&ctx).await.unwrap();
    assert_eq!(affected, 1);
    let last = mock(&ctx).statements().pop().unwrap();
    assert_eq!(last.sql, "DELETE FROM `orders` WHERE `id`=?");
    assert_eq!(last.params, vec![Value::Int(8)]);
    assert_eq!(order.record().state(), RecordState::Deleted);
    assert!(order.save(&ctx).await.is_err());
}

#[tokio::test]
async fn insert_then_update_writes_only_changes() {
    let ctx = context();
    let mut order = Order::new();
    order
        .record_mut()
        .set("customer_id", 3)
        .set("status", "paid");

    let outcome = order.save(&ctx).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted(Some(1)));
    assert_eq!(order.record().get::<i64>("id"), Some(1));
    assert_eq!(order.record().state(), RecordState::Persisted);

    let log = mock(&ctx).statements();
    let insert = &log[0];
    assert_eq!(
        insert.sql,
        "INSERT INTO `orders` (`customer_id`,`status`) VALUES (?,?)"
    );
    assert_eq!(insert.params, vec![Value::Int(3), Value::from("paid")]);

    assert_eq!(order.save(&ctx).await.unwrap(), SaveOutcome::Unchanged);
    assert_eq!(mock(&ctx).statements().len(), 1);

    order.record_mut().set("status", "shipped");
    mock(&ctx).push_count(1);
    assert_eq!(order.save(&ctx).await.unwrap(), SaveOutcome::Updated);

    let log = mock(&ctx).statements();
    assert_eq!(log[1].sql, "SELECT COUNT(*) FROM `orders` WHERE `id`=?");
    assert_eq!(log[2].sql, "UPDATE `orders` SET `status`=? WHERE `id`=?");
    assert_eq!(log[2].params, vec![Value::from("shipped"), Value::UInt(1)]);
}

#[tokio::test]
async fn explicit_numeric_key_inserts_when_row_is_missing() {
    let ctx = context();
    let mut order = Order::new();
    order.record_mut().set("id", 50).set("customer_id", 3);

    mock(&ctx).push_count(0);
    let outcome = order.save(&ctx).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted(None));

    let log = mock(&ctx).sql_log();
    assert_eq!(log[0], "SELECT COUNT(*) FROM `orders` WHERE `id`=?");
    assert_eq!(log[1], "INSERT INTO `orders` (`id`,`customer_id`) VALUES (?,?)");
    assert_eq!(order.record().get::<i64>("id"), Some(50));
}

#[tokio::test]
async fn explicit_numeric_key_updates_existing_row() {
    let ctx = context();
    let mut order = Order::new();
    order.record_mut().set("id", 50).set("note", Value::Null);

    mock(&ctx).push_count(1);
    assert_eq!(order.save(&ctx).await.unwrap(), SaveOutcome::Updated);
    assert_eq!(
        mock(&ctx).sql_log()[1],
        "UPDATE `orders` SET `id`=?,`note`=? WHERE `id`=?"
    );
}

#[tokio::test]
async fn non_numeric_key_decides_by_origin() {
    let ctx = context();

    let mut fresh = Token::new();
    fresh.record_mut().set("code", "ab12cd34").set("label", "x");
    assert!(matches!(
        fresh.save(&ctx).await.unwrap(),
        SaveOutcome::Inserted(_)
    ));
    assert!(mock(&ctx).sql_log()[0].starts_with("INSERT INTO `tokens`"));

    mock(&ctx).push_rows(vec![Row::from_pairs([
        ("code", Value::from("zz99zz99")),
        ("label", Value::Null),
    ])]);
    let mut loaded = Token::find_by_id(&ctx, "zz99zz99").await.unwrap().unwrap();
    loaded.record_mut().set("label", "renamed");
    assert_eq!(loaded.save(&ctx).await.unwrap(), SaveOutcome::Updated);

    let log = mock(&ctx).sql_log();
    assert_eq!(log.len(), 3);
    assert_eq!(log[2], "UPDATE `tokens` SET `label`=? WHERE `code`=?");
}

#[tokio::test]
async fn null_on_not_null_column_writes_default() {
    let ctx = context();
    mock(&ctx).push_rows(vec![order_row(2, 3, "open")]);
    let mut order = Order::find_by_id(&ctx, 2).await.unwrap().unwrap();
    order.record_mut().set("status", Value::Null);

    mock(&ctx).push_count(1);
    order.save(&ctx).await.unwrap();
    let update = mock(&ctx).statements().pop().unwrap();
    assert_eq!(update.sql, "UPDATE `orders` SET `status`=? WHERE `id`=?");
    assert_eq!(update.params, vec![Value::from("new"), Value::Int(2)]);
}

#[tokio::test]
async fn unsaved_related_record_is_saved_first() {
    let ctx = context();
    let mut customer = Record::new(&CUSTOMERS);
    customer.set("name", "Ada");

    let mut order = Order::new();
    order
        .record_mut()
        .attach("customer_id", customer)
        .set("status", "open");
    mock(&ctx).push_id(77);
    mock(&ctx).push_id(5);

    assert_eq!(
        order.save(&ctx).await.unwrap(),
        SaveOutcome::Inserted(Some(5))
    );

    let log = mock(&ctx).statements();
    assert_eq!(log[0].sql, "INSERT INTO `customers` (`name`) VALUES (?)");
    assert_eq!(
        log[1].sql,
        "INSERT INTO `orders` (`customer_id`,`status`) VALUES (?,?)"
    );
    assert_eq!(log[1].params[0], Value::UInt(77));
    let related = order.record().related("customer_id").unwrap();
    assert_eq!(related.state(), RecordState::Persisted);
}

#[tokio::test]
async fn find_by_applies_options() {
    let ctx = context();
    let options = FindOptions::new().order_by("id DESC").limit(10).offset(5);
    let found = Order::find_by(&ctx, "status=?", vec!["open".into()], &options)
        .await
        .unwrap();
    assert!(found.is_empty());

    let log = mock(&ctx).statements();
    let stmt = &log[0];
    assert_eq!(
        stmt.sql,
        "SELECT * FROM `orders` WHERE status=? ORDER BY id DESC LIMIT 10 OFFSET 5"
    );
    assert_eq!(stmt.params, vec![Value::from("open")]);
}

#[tokio::test]
async fn eager_loading_follows_foreign_keys_to_depth() {
    let ctx = context();
    mock(&ctx).push_rows(vec![
        order_row(1, 3, "open"),
        order_row(2, 4, "open"),
        order_row(3, 3, "paid"),
    ]);
    mock(&ctx).push_rows(vec![
        Row::from_pairs([("id", Value::Int(3)), ("name", Value::from("Ada"))]),
        Row::from_pairs([("id", Value::Int(4)), ("name", Value::from("Bob"))]),
    ]);

    let orders = Order::find_by(&ctx, "", Vec::new(), &FindOptions::new().depth(2))
        .await
        .unwrap();

    let log = mock(&ctx).statements();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].sql, "SELECT * FROM `customers` WHERE `id` IN (?,?)");
    assert_eq!(log[1].params, vec![Value::Int(3), Value::Int(4)]);

    let names: Vec<Option<String>> = orders
        .iter()
        .map(|o| o.record().related("customer_id").and_then(|c| c.get("name")))
        .collect();
    assert_eq!(
        names,
        vec![Some("Ada".into()), Some("Bob".into()), Some("Ada".into())]
    );
}

#[tokio::test]
async fn depth_zero_loads_nothing() {
    let ctx = context();
    mock(&ctx).push_rows(vec![order_row(1, 3, "open")]);
    let orders = Order::find_by(&ctx, "", Vec::new(), &FindOptions::new())
        .await
        .unwrap();
    assert_eq!(mock(&ctx).statements().len(), 1);
    assert!(orders[0].record().related("customer_id").is_none());
}

#[tokio::test]
async fn exists_uses_count_query() {
    let ctx = context();
    mock(&ctx).push_count(2);
    assert!(Customer::exists(&ctx, "Ada", "name").await.unwrap());
    mock(&ctx).push_count(0);
    assert!(!Customer::exists(&ctx, 9, "id").await.unwrap());

    let log = mock(&ctx).sql_log();
    assert_eq!(log[0], "SELECT COUNT(*) FROM `customers` WHERE `name`=?");
}

#[tokio::test]
async fn fetch_entities_rejects_foreign_columns() {
    let ctx = context();
    mock(&ctx).push_rows(vec![Row::from_pairs([
        ("id", Value::Int(1)),
        ("total", Value::Int(10)),
    ])]);
    let err = Order::select()
        .fields(["id", "SUM(x) AS total"])
        .fetch_entities::<Order>(mock(&ctx))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidFetchTarget { .. }));
}

#[tokio::test]
async fn fetch_entities_shaped_unwraps_single_row() {
    use crate::qb::Fetched;

    let ctx = context();
    mock(&ctx).push_rows(vec![order_row(1, 3, "open")]);
    mock(&ctx).push_rows(vec![order_row(1, 3, "open")]);

    let one = Order::select()
        .fetch_entities_shaped::<Order>(mock(&ctx), false)
        .await
        .unwrap();
    match one {
        Fetched::One(order) => {
            assert_eq!(order.record().get::<i64>("id"), Some(1));
            assert_eq!(order.record().state(), RecordState::Persisted);
        }
        Fetched::Many(_) => panic!("expected a single entity"),
    }

    let forced = Order::select()
        .fetch_entities_shaped::<Order>(mock(&ctx), true)
        .await
        .unwrap();
    match forced {
        Fetched::Many(orders) => assert_eq!(orders.len(), 1),
        Fetched::One(_) => panic!("expected a list"),
    }
}

#[test]
fn entity_from_wrong_table_is_a_type_mismatch() {
    let err = Order::try_from_record(Record::new(&CUSTOMERS)).unwrap_err();
    assert!(matches!(err, OrmError::TypeMismatch { .. }));
    assert!(Order::try_from_record(Record::new(&ORDERS)).is_ok());

    let mut order = Order::new();
    assert!(order.replace(&Record::new(&TOKENS)).is_err());
}
