use super::*;
use crate::row::Row;
use crate::testing::MockClient;
use crate::value::Value;

#[test]
fn where_and_chain() {
    let q = select("users")
        .where_equal("status", "active")
        .where_and()
        .where_equal("type", "admin");
    assert_eq!(q.to_sql(), "SELECT * FROM `users` WHERE status=? AND type=?");
    assert_eq!(q.params(), vec![Value::from("active"), Value::from("admin")]);
}

#[test]
fn no_where_means_no_where_keyword() {
    let q = select("users").fields(["id", "u.name", "COUNT(*) AS n"]);
    assert_eq!(q.to_sql(), "SELECT `id`,`u`.`name`,COUNT(*) AS n FROM `users`");
    assert!(q.params().is_empty());
}

#[test]
fn every_operator() {
    let q = select("t")
        .where_like("a", "x%")
        .where_not_like("b", "y%")
        .where_between("c", 1, 5)
        .where_in("d", [1, 2])
        .where_is_null("e")
        .where_is_not_null("f")
        .where_superior("g", 1)
        .where_superior_equal("h", 2)
        .where_inferior("i", 3)
        .where_inferior_equal("j", 4)
        .where_different("k", 5);
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM `t` WHERE a LIKE ? AND b NOT LIKE ? AND c BETWEEN ? AND ? \
AND d IN (?,?) AND e IS NULL AND f IS NOT NULL AND g>? AND h>=? AND i<? AND j<=? AND k<>?"
    );
    assert_eq!(q.params().len(), 11);
}

#[test]
fn full_select_clause_order() {
    let q = select("orders")
        .alias("o")
        .fields(["o.customer_id", "SUM(o.total) AS spent"])
        .join_inner("customers c", "c.id = o.customer_id")
        .join_outer(JoinDirection::Right, "regions", "regions.id = c.region_id")
        .join_using("notes", ["order_id"])
        .join_natural("audit")
        .where_superior("o.total", 0)
        .group_by(["o.customer_id"])
        .having_superior("SUM(o.total)", 100)
        .order_by("spent DESC")
        .limit(10)
        .offset(20);
    assert_eq!(
        q.to_sql(),
        "SELECT `o`.`customer_id`,SUM(o.total) AS spent FROM `orders` AS `o` \
INNER JOIN customers c ON (c.id = o.customer_id) \
RIGHT OUTER JOIN `regions` ON (regions.id = c.region_id) \
JOIN `notes` USING (`order_id`) \
NATURAL JOIN `audit` \
WHERE o.total>? GROUP BY `o`.`customer_id` HAVING SUM(o.total)>? \
ORDER BY spent DESC LIMIT 10 OFFSET 20"
    );
    assert_eq!(q.params(), vec![Value::Int(0), Value::Int(100)]);
}

#[test]
fn database_qualifies_tables() {
    let q = select("users").database("shop").table_as("roles", "r");
    assert_eq!(q.to_sql(), "SELECT * FROM `shop`.`users`,`shop`.`roles` AS `r`");
}

#[test]
fn grouped_where_and_raw() {
    let q = select("users")
        .where_equal("status", "active")
        .where_and()
        .where_begin_group()
        .where_raw("age > ? AND age < ?", [18, 65])
        .where_or()
        .where_is_null("age")
        .where_end_group();
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM `users` WHERE status=? AND (age > ? AND age < ? OR age IS NULL)"
    );
    assert_eq!(
        q.params(),
        vec![Value::from("active"), Value::Int(18), Value::Int(65)]
    );
}

#[test]
fn unbalanced_group_yields_empty_sql() {
    let q = select("users").where_begin_group().where_equal("a", 1);
    assert_eq!(q.to_sql(), "");
    assert!(q.build().is_err());
}

#[test]
fn count_drops_paging_and_ordering() {
    let q = select("users")
        .fields(["id", "name"])
        .where_equal("status", "active")
        .order_by("name")
        .limit(5)
        .offset(10);
    let count = q.to_count();
    assert_eq!(count.to_sql(), "SELECT COUNT(*) FROM `users` WHERE status=?");
    assert_eq!(count.params(), vec![Value::from("active")]);
    // The original builder is untouched.
    assert!(q.to_sql().ends_with("LIMIT 5 OFFSET 10"));
}

#[test]
fn grouped_count_wraps_subquery() {
    let q = select("orders")
        .where_equal("paid", true)
        .group_by(["customer_id"])
        .having_superior("COUNT(*)", 2)
        .order_by("customer_id")
        .limit(3);
    assert_eq!(
        q.to_count().to_sql(),
        "SELECT COUNT(*) FROM (SELECT 1 FROM `orders` WHERE paid=? \
GROUP BY `customer_id` HAVING COUNT(*)>?) AS `t`"
    );
    assert_eq!(q.to_count().params(), vec![Value::Bool(true), Value::Int(2)]);
}

#[test]
fn grouped_count_never_projects_group_columns() {
    let q = select("orders")
        .alias("o")
        .fields(["o.id", "c.id"])
        .join_inner("customers c", "c.id = o.customer_id")
        .group_by(["o.id", "c.id"]);
    assert_eq!(
        q.to_count().to_sql(),
        "SELECT COUNT(*) FROM (SELECT 1 FROM `orders` AS `o` \
INNER JOIN customers c ON (c.id = o.customer_id) GROUP BY `o`.`id`,`c`.`id`) AS `t`"
    );
}

#[test]
fn grouped_count_keeps_fields_for_having_aliases() {
    let q = select("orders")
        .fields(["customer_id", "SUM(total) AS spent"])
        .group_by(["customer_id"])
        .having_superior("spent", 100);
    assert_eq!(
        q.to_count().to_sql(),
        "SELECT COUNT(*) FROM (SELECT `customer_id`,SUM(total) AS spent FROM `orders` \
GROUP BY `customer_id` HAVING spent>?) AS `t`"
    );
}

#[test]
fn non_plain_table_names_are_quoted() {
    assert_eq!(select("order-items").to_sql(), "SELECT * FROM `order-items`");
    assert_eq!(
        describe("order-items").database("shop").to_sql(),
        "DESCRIBE `shop`.`order-items`"
    );
    assert_eq!(
        delete("order-items").where_equal("id", 1).to_sql(),
        "DELETE FROM `order-items` WHERE id=?"
    );
}

#[tokio::test]
async fn execute_refuses_unguarded_writes() {
    let client = MockClient::new();
    let err = delete("users").execute(&client).await.unwrap_err();
    assert!(matches!(err, crate::OrmError::Validation(_)));
    let err = update("users").set("a", 1).execute(&client).await.unwrap_err();
    assert!(matches!(err, crate::OrmError::Validation(_)));
    assert!(client.statements().is_empty());

    let n = delete("users").allow_all().execute(&client).await.unwrap();
    assert_eq!(n, 1);
    assert_eq!(client.sql_log(), vec!["DELETE FROM `users`"]);
}

#[tokio::test]
async fn insert_get_id_returns_generated_key() {
    let client = MockClient::new();
    client.push_id(42);
    let id = insert("users")
        .set("name", "ann")
        .insert_get_id(&client)
        .await
        .unwrap();
    assert_eq!(id, 42);
    assert_eq!(
        client.statements()[0].params,
        vec![Value::from("ann")]
    );
    assert!(select("users").insert_get_id(&client).await.is_err());
}

#[tokio::test]
async fn count_reads_first_column() {
    let client = MockClient::new();
    client.push_count(7);
    let n = select("users").limit(1).count(&client).await.unwrap();
    assert_eq!(n, 7);
    assert_eq!(client.sql_log(), vec!["SELECT COUNT(*) FROM `users`"]);
}

#[tokio::test]
async fn shaped_fetch_unwraps_single_row() {
    let client = MockClient::new();
    let row = Row::from_pairs([("id", Value::Int(1))]);
    client.push_rows(vec![row.clone()]);
    client.push_rows(vec![row.clone()]);
    client.push_rows(vec![row.clone(), row.clone()]);

    let one = select("t").fetch_shaped::<Row>(&client, false).await.unwrap();
    assert_eq!(one, Fetched::One(row.clone()));

    let forced = select("t").fetch_shaped::<Row>(&client, true).await.unwrap();
    assert_eq!(forced, Fetched::Many(vec![row.clone()]));

    let many = select("t").fetch_shaped::<Row>(&client, false).await.unwrap();
    assert_eq!(many.into_vec().len(), 2);
}

#[tokio::test]
async fn assoc_and_positional_shapes() {
    let client = MockClient::new();
    let row = Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("ann"))]);
    client.push_rows(vec![row.clone()]);
    client.push_rows(vec![row]);

    let assoc = select("t").fetch_assoc(&client).await.unwrap();
    assert_eq!(assoc[0]["name"], Value::from("ann"));

    let positional = select("t").fetch_positional(&client).await.unwrap();
    assert_eq!(positional[0], vec![Value::Int(1), Value::from("ann")]);
}

#[tokio::test]
async fn driver_failure_carries_sql_and_values() {
    let client = MockClient::new();
    client.push_error("table does not exist");
    let err = select("nope")
        .where_equal("id", 3)
        .fetch_rows(&client)
        .await
        .unwrap_err();
    match err {
        crate::OrmError::QueryExecution { sql, params, message } => {
            assert_eq!(sql, "SELECT * FROM `nope` WHERE id=?");
            assert_eq!(params, vec![Value::Int(3)]);
            assert_eq!(message, "table does not exist");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
