//! List path: refresh statuses from upstream, persist them, and return the page.

mod helpers;

use std::collections::HashMap;

use helpers::{FakeUpstream, build_service, insert_case, stored_column};
use refund_sync::cases::ListRequest;
use sqlx::PgPool;

fn query(pairs: &[(&str, &str)]) -> ListRequest {
    let params: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ListRequest::from_query(&params)
}

#[sqlx::test]
async fn test_list_refreshes_and_persists_fetchable_rows(pool: PgPool) {
    insert_case(&pool, "A1", Some("https://up.test/a1"), None, 1).await;
    insert_case(&pool, "A2", Some("https://up.test/a2"), None, 2).await;
    insert_case(&pool, "A3", None, Some("shipped"), 3).await;

    let upstream = FakeUpstream::new()
        .with_codes("https://up.test/a1", Some("success"), None)
        .with_codes("https://up.test/a2", Some("waitsellersend"), Some("REFUND_SUCCESS"));
    let service = build_service(&pool, upstream);

    let response = service
        .list(&query(&[]), None)
        .await
        .expect("list should succeed");

    assert_eq!(response.total, 3);
    assert!(!response.can_edit);
    assert!(!response.refresh_failed);

    let ids: Vec<&str> = response.data.iter().map(|c| c.order_id.as_str()).collect();
    assert_eq!(ids, ["A1", "A2", "A3"], "newest first");

    assert_eq!(response.data[0].requested_order_status.as_deref(), Some("completed"));
    assert_eq!(response.data[1].requested_refund_status.as_deref(), Some("refund succeeded"));
    assert_eq!(response.data[2].requested_order_status.as_deref(), Some("shipped"));

    assert_eq!(
        stored_column(&pool, "A1", "requested_order_status").await.as_deref(),
        Some("completed")
    );
    assert_eq!(
        stored_column(&pool, "A1", "requested_refund_status").await.as_deref(),
        Some("no refund")
    );
    assert_eq!(
        stored_column(&pool, "A2", "requested_refund_status").await.as_deref(),
        Some("refund succeeded")
    );
    assert_eq!(
        stored_column(&pool, "A3", "requested_order_status").await.as_deref(),
        Some("shipped"),
        "row without a query url is never touched"
    );
}

#[sqlx::test]
async fn test_list_keeps_stale_value_when_fetch_times_out(pool: PgPool) {
    insert_case(&pool, "B1", Some("https://up.test/b1"), None, 1).await;
    insert_case(&pool, "B2", Some("https://up.test/b2"), Some("awaiting payment"), 2).await;
    insert_case(&pool, "B3", Some("https://up.test/b3"), None, 3).await;

    let upstream = FakeUpstream::new()
        .with_codes("https://up.test/b1", Some("success"), None)
        .timing_out("https://up.test/b2")
        .with_codes("https://up.test/b3", Some("success"), None);
    let service = build_service(&pool, upstream);

    let response = service
        .list(&query(&[]), None)
        .await
        .expect("an upstream timeout must not fail the read");

    assert_eq!(response.data.len(), 3);
    assert!(!response.refresh_failed);
    assert_eq!(response.data[1].requested_order_status.as_deref(), Some("awaiting payment"));
    assert_eq!(
        stored_column(&pool, "B2", "requested_order_status").await.as_deref(),
        Some("awaiting payment")
    );
    assert_eq!(
        stored_column(&pool, "B3", "requested_order_status").await.as_deref(),
        Some("completed")
    );
}

#[sqlx::test]
async fn test_list_returns_stored_rows_when_persist_fails(pool: PgPool) {
    insert_case(&pool, "F1", Some("https://up.test/f1"), Some("old"), 1).await;
    insert_case(&pool, "F2", Some("https://up.test/f2"), Some("old"), 2).await;

    sqlx::raw_sql(
        r#"
        CREATE FUNCTION reject_f2_update() RETURNS trigger AS $$
        BEGIN
            IF NEW.order_id = 'F2' THEN
                RAISE EXCEPTION 'write rejected';
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;

        CREATE TRIGGER reject_f2_update BEFORE UPDATE ON tracked_cases
            FOR EACH ROW EXECUTE FUNCTION reject_f2_update();
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let upstream = FakeUpstream::new()
        .with_codes("https://up.test/f1", Some("success"), None)
        .with_codes("https://up.test/f2", Some("success"), None);
    let service = build_service(&pool, upstream);

    let response = service
        .list(&query(&[]), None)
        .await
        .expect("a failed persist must not fail the read");

    assert!(response.refresh_failed);
    assert_eq!(response.data.len(), 2);
    for case in &response.data {
        assert_eq!(case.requested_order_status.as_deref(), Some("old"));
    }
    for id in ["F1", "F2"] {
        assert_eq!(
            stored_column(&pool, id, "requested_order_status").await.as_deref(),
            Some("old"),
            "the whole page rolls back"
        );
    }
}

#[sqlx::test]
async fn test_list_normalizes_progress_without_writing_it(pool: PgPool) {
    insert_case(&pool, "C1", None, None, 1).await;
    let service = build_service(&pool, FakeUpstream::new());

    let response = service.list(&query(&[]), None).await.unwrap();

    assert_eq!(
        response.data[0].progress_tracking.as_deref(),
        Some("awaiting merchant acceptance")
    );
    assert_eq!(response.data[0].requested_order_status.as_deref(), Some("no data"));
    assert_eq!(stored_column(&pool, "C1", "progress_tracking").await, None);
    assert_eq!(stored_column(&pool, "C1", "requested_order_status").await, None);
}

#[sqlx::test]
async fn test_list_filters_and_paginates(pool: PgPool) {
    for i in 0..5 {
        insert_case(&pool, &format!("D{i}"), None, None, i).await;
    }
    insert_case(&pool, "E9", None, None, 10).await;
    let service = build_service(&pool, FakeUpstream::new());

    let response = service
        .list(&query(&[("orderId", "d"), ("page", "2"), ("pageSize", "2")]), None)
        .await
        .unwrap();

    assert_eq!(response.total, 5);
    let ids: Vec<&str> = response.data.iter().map(|c| c.order_id.as_str()).collect();
    assert_eq!(ids, ["D2", "D3"]);
}

#[sqlx::test]
async fn test_state_filter_matches_refund_status_column(pool: PgPool) {
    insert_case(&pool, "F1", None, None, 1).await;
    insert_case(&pool, "F2", None, None, 2).await;
    sqlx::query("UPDATE tracked_cases SET requested_refund_status = 'refund succeeded' WHERE order_id = 'F2'")
        .execute(&pool)
        .await
        .unwrap();
    let service = build_service(&pool, FakeUpstream::new());

    let response = service
        .list(&query(&[("state", "refund succeeded")]), None)
        .await
        .unwrap();

    assert_eq!(response.total, 1);
    assert_eq!(response.data[0].order_id, "F2");
}
